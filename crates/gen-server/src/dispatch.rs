//! # Dispatch Loop
//!
//! The only consumer of a server's mailbox and the only code that touches
//! the handler. Runs on one task for the lifetime of the server.

use crate::error::{GenServerError, HandlerFailure};
use crate::handler::Handler;
use crate::lifecycle::{shutdown_signalled, Lifecycle};
use crate::mailbox::Inbox;
use crate::message::{Request, Response};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drain the mailbox until it is closed and empty.
pub(crate) async fn run<H: Handler>(
    mut handler: H,
    inbox: Inbox,
    lifecycle: Lifecycle,
    name: Arc<str>,
) {
    let _closed = lifecycle.close_on_drop();
    let Inbox {
        mut requests,
        responses,
    } = inbox;
    let mut state = lifecycle.subscribe();
    let mut draining = false;
    let mut handled: u64 = 0;

    info!(server = %name, "Dispatch loop started");

    loop {
        let request = tokio::select! {
            biased;
            _ = shutdown_signalled(&mut state), if !draining => {
                // Refuse new requests and release blocked producers; what is
                // already buffered is still handled.
                requests.close();
                draining = true;
                debug!(server = %name, "Mailbox closed, draining");
                continue;
            }
            request = requests.recv() => request,
        };

        let Some(request) = request else {
            break;
        };

        let response = invoke(&mut handler, request);
        handled += 1;

        let sequence = response.sequence;
        if responses.send(response).await.is_err() {
            // The router is gone; nobody is left to deliver to.
            warn!(
                server = %name,
                sequence = sequence,
                "Response dropped, response queue closed"
            );
        }
    }

    info!(server = %name, handled = handled, "Dispatch loop stopped");
}

/// Run one request through the handler, containing any panic to this request.
pub(crate) fn invoke<H: Handler>(handler: &mut H, request: Request) -> Response {
    let Request {
        sequence,
        operation,
        payload,
    } = request;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        handler.handle(&operation, sequence, payload)
    }));

    let result = match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            debug!(sequence = sequence, operation = %operation, error = %err, "Handler returned error");
            Err(GenServerError::from(err))
        }
        Err(panic) => {
            // A typed panic keeps its error so callers can still downcast it
            let (message, source) = match panic.downcast::<anyhow::Error>() {
                Ok(err) => (err.to_string(), Some(HandlerFailure::from(*err))),
                Err(panic) => (panic_message(&*panic), None),
            };
            error!(
                sequence = sequence,
                operation = %operation,
                message = %message,
                "Handler panicked"
            );
            Err(GenServerError::HandlerPanicked {
                operation: operation.clone(),
                message,
                source,
            })
        }
    };

    Response {
        sequence,
        operation,
        result,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(err) = panic.downcast_ref::<GenServerError>() {
        err.to_string()
    } else {
        "non-string panic payload".to_string()
    }
}
