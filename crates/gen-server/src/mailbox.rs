//! # Mailbox
//!
//! A bounded request channel (many producers, one dispatch loop) paired with
//! a bounded response channel (dispatch loop to response router). A full
//! request channel suspends producers; that is the only backpressure.

use crate::error::GenServerError;
use crate::lifecycle::{shutdown_signalled, ServerState};
use crate::message::{Request, Response};
use tokio::sync::{mpsc, watch};

/// Producer side of the mailbox, shared by every caller of one server.
pub(crate) struct Mailbox {
    requests: mpsc::Sender<Request>,
    state: watch::Receiver<ServerState>,
}

/// Consumer side handed to the dispatch loop.
pub(crate) struct Inbox {
    pub requests: mpsc::Receiver<Request>,
    pub responses: mpsc::Sender<Response>,
}

/// Create a mailbox and the two receiving ends.
pub(crate) fn mailbox(
    request_capacity: usize,
    response_capacity: usize,
    state: watch::Receiver<ServerState>,
) -> (Mailbox, Inbox, mpsc::Receiver<Response>) {
    let (requests_tx, requests_rx) = mpsc::channel(request_capacity);
    let (responses_tx, responses_rx) = mpsc::channel(response_capacity);
    (
        Mailbox {
            requests: requests_tx,
            state,
        },
        Inbox {
            requests: requests_rx,
            responses: responses_tx,
        },
        responses_rx,
    )
}

impl Mailbox {
    /// Place a request in the mailbox, waiting for space if it is full.
    ///
    /// Fails with [`GenServerError::MailboxClosed`] if the server starts
    /// closing before the request is accepted.
    pub(crate) async fn enqueue(&self, request: Request) -> Result<(), GenServerError> {
        let mut state = self.state.clone();
        tokio::select! {
            biased;
            _ = shutdown_signalled(&mut state) => Err(GenServerError::MailboxClosed),
            sent = self.requests.send(request) => sent.map_err(|_| GenServerError::MailboxClosed),
        }
    }

    /// Free request slots right now.
    pub(crate) fn available(&self) -> usize {
        self.requests.capacity()
    }
}
