//! # gen-server - Server Processes for tokio
//!
//! A server process owns private state and serializes every access to it
//! through a bounded mailbox. Exactly one dispatch loop drains the mailbox
//! and invokes the [`Handler`], so the state needs no locks and responses
//! come back in the order requests were accepted.
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────┐  cast/call   ┌───────────┐          ┌───────────────┐
//! │ Producer │ ───────────▶ │  Mailbox  │ ───────▶ │ Dispatch Loop │
//! │  (any    │              │ requests  │          │  Handler::    │
//! │  task)   │              └───────────┘          │  handle()     │
//! │          │  CallHandle  ┌───────────┐          │               │
//! │          │ ◀─────────── │  Router   │ ◀─────── │               │
//! └──────────┘  completes   │ responses │          └───────────────┘
//!                           └───────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Handler state is only touched from the dispatch loop's task.
//! - Every accepted call completes exactly once.
//! - A handler error or panic fails only the call that caused it.
//! - After [`GenServer::close`] no call hangs: it either completed normally
//!   or fails with a shutdown error.
//!
//! ## Usage Example
//!
//! ```
//! use gen_server::handler::{self, HandleResult};
//! use gen_server::{GenServer, Payload, ReplySlot, ReplyTo, ServerConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), gen_server::GenServerError> {
//! let mut total = 0_i64;
//! let server = GenServer::start(
//!     ServerConfig::default(),
//!     move |operation: &str, _: u64, payload: Payload| -> HandleResult {
//!         match operation {
//!             "add" => {
//!                 total += handler::downcast_payload::<i64>(operation, payload)?;
//!                 handler::respond(total)
//!             }
//!             other => Err(handler::unsupported(other)),
//!         }
//!     },
//! )?;
//!
//! let reply = ReplySlot::new(0_i64);
//! server.call("add", 5_i64, ReplyTo::from(&reply)).await?;
//! assert_eq!(reply.get(), 5);
//!
//! server.close()?;
//! server.closed().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Reply Coercion
//!
//! Reply values are type-erased. A reply is written only into a
//! [`ReplySlot`] of exactly the reply's type; a missing destination, a
//! by-value destination or a type mismatch silently drops the value and the
//! call still succeeds. Wrap a server in a typed façade to get static
//! checking back.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod call;
pub mod config;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod pending;
pub mod reply;
pub mod server;

mod dispatch;
mod mailbox;
mod message;

// Re-export main types
pub use call::CallHandle;
pub use config::ServerConfig;
pub use error::{ConfigError, GenServerError, HandlerError, HandlerFailure};
pub use handler::{HandleResult, Handler};
pub use lifecycle::ServerState;
pub use message::Payload;
pub use pending::CallStats;
pub use reply::{ReplySink, ReplySlot, ReplyTo};
pub use server::GenServer;

/// Default request mailbox capacity.
pub const DEFAULT_REQUEST_CAPACITY: usize = 4096;

/// Default response queue capacity.
pub const DEFAULT_RESPONSE_CAPACITY: usize = 4096;

/// Largest capacity a bounded tokio channel accepts.
pub const MAX_CAPACITY: usize = usize::MAX >> 3;
