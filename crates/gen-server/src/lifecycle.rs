//! # Lifecycle
//!
//! `Running → Closing → Closed`, with no way back. The state lives in a
//! `watch` channel so the same value doubles as the shutdown signal for the
//! mailbox, the dispatch loop and the response router.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle state of a server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerState {
    /// Accepting calls.
    Running,
    /// `close` was invoked; the dispatch loop is draining.
    Closing,
    /// The dispatch loop has exited.
    Closed,
}

#[derive(Clone)]
pub(crate) struct Lifecycle {
    state: Arc<watch::Sender<ServerState>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(ServerState::Running);
        Self {
            state: Arc::new(state),
        }
    }

    pub(crate) fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// `Running → Closing`. Returns false if the server was not running.
    pub(crate) fn begin_close(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ServerState::Running {
                *state = ServerState::Closing;
                true
            } else {
                false
            }
        })
    }

    /// Terminal transition, taken when the dispatch loop exits.
    pub(crate) fn mark_closed(&self) {
        self.state.send_if_modified(|state| {
            if *state == ServerState::Closed {
                false
            } else {
                *state = ServerState::Closed;
                true
            }
        });
    }

    /// Resolves once the state reaches `Closed`.
    pub(crate) async fn closed(&self) {
        let mut state = self.subscribe();
        while *state.borrow_and_update() != ServerState::Closed {
            if state.changed().await.is_err() {
                return;
            }
        }
    }

    /// Marks the server closed when dropped, even if the owning task is
    /// torn down by runtime shutdown.
    pub(crate) fn close_on_drop(&self) -> CloseOnDrop {
        CloseOnDrop(self.clone())
    }
}

pub(crate) struct CloseOnDrop(Lifecycle);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.mark_closed();
    }
}

/// Resolves once the server has left `Running`.
pub(crate) async fn shutdown_signalled(state: &mut watch::Receiver<ServerState>) {
    while *state.borrow_and_update() == ServerState::Running {
        if state.changed().await.is_err() {
            return;
        }
    }
}
