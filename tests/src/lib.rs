//! # gen-server Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── servers/          # Example servers with typed façades
//! │   ├── kv_store.rs
//! │   ├── math.rs
//! │   ├── echo.rs
//! │   └── faulty.rs
//! │
//! └── integration/      # Scenario tests against running servers
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p gen-server-tests
//! RUST_LOG=gen_server=debug cargo test -p gen-server-tests integration::shutdown
//! ```

#![allow(dead_code)]

pub mod integration;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test-friendly log subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
