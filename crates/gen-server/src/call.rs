//! # Call handles
//!
//! A [`CallHandle`] is returned by every cast. It completes exactly once,
//! either with the handler's outcome or with the error that kept the request
//! from being answered.

use crate::error::GenServerError;
use crate::message::Payload;
use crate::reply::ReplyTo;
use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, watch};
use tracing::warn;

/// Shared record of one submitted call.
#[derive(Clone)]
pub struct CallHandle {
    inner: Arc<CallInner>,
}

struct CallInner {
    sequence: u64,
    operation: String,
    reply: ReplyTo,
    /// Set by whichever completion path wins
    claimed: AtomicBool,
    outcome: OnceLock<Result<(), GenServerError>>,
    done: watch::Sender<bool>,
    /// Caller-supplied completion channel
    notify: Mutex<Option<mpsc::Sender<CallHandle>>>,
}

impl CallHandle {
    pub(crate) fn new(
        sequence: u64,
        operation: String,
        reply: ReplyTo,
        notify: Option<mpsc::Sender<CallHandle>>,
    ) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            inner: Arc::new(CallInner {
                sequence,
                operation,
                reply,
                claimed: AtomicBool::new(false),
                outcome: OnceLock::new(),
                done,
                notify: Mutex::new(notify),
            }),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.inner.sequence
    }

    pub fn operation(&self) -> &str {
        &self.inner.operation
    }

    pub fn reply_to(&self) -> &ReplyTo {
        &self.inner.reply
    }

    /// Whether the completion signal has fired.
    pub fn is_done(&self) -> bool {
        *self.inner.done.borrow()
    }

    /// Wait for the completion signal.
    ///
    /// To put a deadline on a call, race this against a timer. The call is
    /// not cancelled when the timer wins; its eventual outcome is still
    /// recorded here.
    pub async fn done(&self) {
        let mut done = self.inner.done.subscribe();
        while !*done.borrow_and_update() {
            if done.changed().await.is_err() {
                return;
            }
        }
    }

    /// Wait for completion and return the call's outcome.
    pub async fn wait(&self) -> Result<(), GenServerError> {
        self.done().await;
        self.outcome().cloned().unwrap_or(Err(GenServerError::Shutdown))
    }

    /// The outcome, once completed.
    pub fn outcome(&self) -> Option<&Result<(), GenServerError>> {
        self.inner.outcome.get()
    }

    /// The call's error, if it completed with one.
    pub fn error(&self) -> Option<&GenServerError> {
        self.outcome().and_then(|outcome| outcome.as_ref().err())
    }

    /// Read the reply written into this call's [`ReplySlot<T>`](crate::ReplySlot).
    ///
    /// Only meaningful once the call has completed successfully.
    ///
    /// # Panics
    ///
    /// If the call's destination is not a `ReplySlot<T>`.
    pub fn reply<T: Any + Send + Clone>(&self) -> T {
        match self.try_reply::<T>() {
            Some(value) => value,
            None => panic!(
                "call {} (`{}`) has no reply destination of type {}",
                self.inner.sequence,
                self.inner.operation,
                type_name::<T>()
            ),
        }
    }

    /// Like [`reply`](Self::reply), returning `None` on a destination mismatch.
    pub fn try_reply<T: Any + Send + Clone>(&self) -> Option<T> {
        self.inner.reply.slot::<T>().map(|cell| cell.lock().clone())
    }

    /// Record the outcome and fire the completion signal.
    ///
    /// Only the first completion takes effect; returns false for the rest.
    pub(crate) fn complete(&self, result: Result<Option<Payload>, GenServerError>) -> bool {
        if self.inner.claimed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let outcome = match result {
            Ok(Some(value)) => {
                self.inner.reply.deliver(self.inner.sequence, value);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => Err(err),
        };
        let _ = self.inner.outcome.set(outcome);
        self.inner.done.send_replace(true);

        let notify = self.inner.notify.lock().take();
        if let Some(notify) = notify {
            if let Err(err) = notify.try_send(self.clone()) {
                warn!(
                    sequence = self.inner.sequence,
                    operation = %self.inner.operation,
                    error = %err,
                    "Completion notification dropped, channel full or closed"
                );
            }
        }
        true
    }
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle")
            .field("sequence", &self.inner.sequence)
            .field("operation", &self.inner.operation)
            .field("reply", &self.inner.reply)
            .field("outcome", &self.inner.outcome.get())
            .finish()
    }
}
