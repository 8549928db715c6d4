//! # Handler Contract
//!
//! The single extension point a state owner implements. The dispatch loop
//! owns the handler exclusively and invokes it once per request, so the
//! handler's state needs no locking.
//!
//! ```
//! use gen_server::handler::{self, HandleResult, Handler};
//! use gen_server::Payload;
//!
//! struct Counter {
//!     value: i64,
//! }
//!
//! impl Handler for Counter {
//!     fn handle(&mut self, operation: &str, _sequence: u64, payload: Payload) -> HandleResult {
//!         match operation {
//!             "add" => {
//!                 self.value += handler::downcast_payload::<i64>(operation, payload)?;
//!                 handler::no_reply()
//!             }
//!             "value" => handler::respond(self.value),
//!             other => Err(handler::unsupported(other)),
//!         }
//!     }
//! }
//! ```

use crate::error::HandlerError;
use crate::message::Payload;
use std::any::{type_name, Any};

/// What a handler returns: an optional reply value, or an error for the caller.
pub type HandleResult = anyhow::Result<Option<Payload>>;

/// State owner driven by a server's dispatch loop.
///
/// `handle` runs on the dispatch loop's task. A slow `handle` stalls every
/// queued caller, so keep it short. A panic is contained and reported as
/// the error of that single call; the handler keeps serving afterwards with
/// whatever state the panic left behind.
pub trait Handler: Send + 'static {
    fn handle(&mut self, operation: &str, sequence: u64, payload: Payload) -> HandleResult;
}

impl<F> Handler for F
where
    F: FnMut(&str, u64, Payload) -> HandleResult + Send + 'static,
{
    fn handle(&mut self, operation: &str, sequence: u64, payload: Payload) -> HandleResult {
        self(operation, sequence, payload)
    }
}

/// Reply with `value`.
pub fn respond<T: Any + Send>(value: T) -> HandleResult {
    Ok(Some(Box::new(value)))
}

/// Complete the call without a reply value.
pub fn no_reply() -> HandleResult {
    Ok(None)
}

/// The default for operations a handler does not know.
pub fn unsupported(operation: &str) -> anyhow::Error {
    HandlerError::UnsupportedOperation(operation.to_string()).into()
}

/// Take the payload as a `T`, or fail the call with [`HandlerError::InvalidPayload`].
pub fn downcast_payload<T: Any>(operation: &str, payload: Payload) -> Result<T, HandlerError> {
    payload
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| HandlerError::InvalidPayload {
            operation: operation.to_string(),
            expected: type_name::<T>(),
        })
}
