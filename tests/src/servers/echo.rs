//! Echo server that holds the dispatch loop for a fixed delay per request.

use gen_server::handler::{HandleResult, Handler};
use gen_server::{GenServer, GenServerError, Payload, ServerConfig};
use std::thread;
use std::time::Duration;

pub struct Echo {
    delay: Duration,
}

impl Handler for Echo {
    fn handle(&mut self, _operation: &str, _sequence: u64, payload: Payload) -> HandleResult {
        // Blocks the dispatch loop's worker thread on purpose
        thread::sleep(self.delay);
        Ok(Some(payload))
    }
}

/// Start an echo server with single-slot queues.
pub fn echo_server(delay: Duration) -> Result<GenServer, GenServerError> {
    let config = ServerConfig::default()
        .with_name("echo")
        .with_request_capacity(1)
        .with_response_capacity(1);
    GenServer::start(config, Echo { delay })
}
