//! # Pending Call Store
//!
//! Maps sequence numbers to callers waiting for a response.
//!
//! Flow:
//! 1. `cast` allocates a sequence number and calls `register()`
//! 2. `cast` enqueues the request and calls `mark_enqueued()`
//! 3. The response router receives the response and calls `complete()`
//! 4. On shutdown the router calls `terminate()`, failing everything left
//!
//! A call between steps 1 and 2 is "in transit": its submitter owns its
//! completion, so `terminate()` leaves it alone and the submitter reports
//! the enqueue failure itself.

use crate::call::CallHandle;
use crate::error::GenServerError;
use crate::lifecycle::{shutdown_signalled, ServerState};
use crate::message::Response;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// A call waiting for its response.
struct PendingCall {
    handle: CallHandle,
    registered_at: Instant,
    /// The mailbox has accepted the request
    enqueued: bool,
}

#[derive(Default)]
struct PendingCalls {
    calls: HashMap<u64, PendingCall>,
    /// Set by `terminate`; no further registrations
    terminated: bool,
}

/// Counters for one server's calls.
#[derive(Debug, Default)]
struct PendingStats {
    registered: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time call statistics for a server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallStats {
    /// Calls accepted for submission
    pub registered: u64,
    /// Calls answered successfully by the handler
    pub completed: u64,
    /// Calls that ended with an error of any kind
    pub failed: u64,
    /// Calls still waiting
    pub pending: usize,
}

pub(crate) struct PendingCallStore {
    inner: Mutex<PendingCalls>,
    stats: PendingStats,
}

impl PendingCallStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(PendingCalls::default()),
            stats: PendingStats::default(),
        }
    }

    /// Register a call before its request is enqueued.
    pub(crate) fn register(&self, handle: &CallHandle) -> Result<(), GenServerError> {
        let mut inner = self.inner.lock();
        if inner.terminated {
            return Err(GenServerError::Shutdown);
        }
        inner.calls.insert(
            handle.sequence(),
            PendingCall {
                handle: handle.clone(),
                registered_at: Instant::now(),
                enqueued: false,
            },
        );
        self.stats.registered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// The mailbox accepted the request.
    ///
    /// Fails if the store terminated while the request was in transit; the
    /// call is removed and the caller must complete it.
    pub(crate) fn mark_enqueued(&self, sequence: u64) -> Result<(), GenServerError> {
        let mut inner = self.inner.lock();
        if inner.terminated {
            inner.calls.remove(&sequence);
            return Err(GenServerError::Shutdown);
        }
        // Absent if the response already arrived.
        if let Some(call) = inner.calls.get_mut(&sequence) {
            call.enqueued = true;
        }
        Ok(())
    }

    /// Remove a call whose request never reached the mailbox.
    pub(crate) fn abandon(&self, sequence: u64) -> Option<CallHandle> {
        self.inner
            .lock()
            .calls
            .remove(&sequence)
            .map(|call| call.handle)
    }

    /// Complete the waiting call a response belongs to.
    ///
    /// Returns false if no call with that sequence number is pending.
    pub(crate) fn complete(&self, response: Response) -> bool {
        let Some(call) = self.inner.lock().calls.remove(&response.sequence) else {
            warn!(
                sequence = response.sequence,
                operation = %response.operation,
                "Response for unknown sequence number"
            );
            return false;
        };

        // Counted before the caller is woken, so a caller sees its own call
        let succeeded = response.result.is_ok();
        if succeeded {
            self.stats.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
        }
        call.handle.complete(response.result);

        debug!(
            sequence = response.sequence,
            operation = %response.operation,
            succeeded = succeeded,
            elapsed_us = call.registered_at.elapsed().as_micros() as u64,
            "Completed pending call"
        );
        true
    }

    /// Record a call that failed without reaching the handler.
    pub(crate) fn record_failure(&self) {
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Refuse further registrations and fail every enqueued call.
    ///
    /// Returns the number of calls failed.
    pub(crate) fn terminate(&self, error: GenServerError) -> usize {
        let failed: Vec<PendingCall> = {
            let mut inner = self.inner.lock();
            inner.terminated = true;
            let sequences: Vec<u64> = inner
                .calls
                .iter()
                .filter(|(_, call)| call.enqueued)
                .map(|(sequence, _)| *sequence)
                .collect();
            sequences
                .into_iter()
                .filter_map(|sequence| inner.calls.remove(&sequence))
                .collect()
        };

        for call in &failed {
            if call.handle.complete(Err(error.clone())) {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        failed.len()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub(crate) fn stats(&self) -> CallStats {
        CallStats {
            registered: self.stats.registered.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            pending: self.pending_count(),
        }
    }
}

/// Background task routing responses back to their callers.
///
/// When the server starts closing, stops accepting responses, delivers the
/// ones already buffered, then fails every call still waiting.
pub(crate) async fn route_responses(
    mut responses: mpsc::Receiver<Response>,
    store: Arc<PendingCallStore>,
    mut state: watch::Receiver<ServerState>,
    name: Arc<str>,
) {
    let mut closing = false;

    loop {
        let response = tokio::select! {
            biased;
            _ = shutdown_signalled(&mut state), if !closing => {
                responses.close();
                closing = true;
                continue;
            }
            response = responses.recv() => response,
        };

        match response {
            Some(response) => {
                store.complete(response);
            }
            None => break,
        }
    }

    let failed = store.terminate(GenServerError::Shutdown);
    debug!(server = %name, failed = failed, "Response router stopped");
}
