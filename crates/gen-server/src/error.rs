//! Error types for server processes.
//!
//! Every failure is attached to the call it originated from. Nothing here is
//! ever raised into an unrelated caller's task.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced on a call, or returned by construction and `close`.
#[derive(Debug, Clone, Error)]
pub enum GenServerError {
    /// The server was closed before (or while) the call was in flight.
    #[error("server is shut down")]
    Shutdown,

    /// The request raced a close and could not be placed in the mailbox.
    #[error("send on closed mailbox")]
    MailboxClosed,

    /// The cast future was dropped before the mailbox accepted the request.
    #[error("submission dropped before the request was enqueued")]
    SubmissionDropped,

    /// The handler returned an error for this request.
    #[error(transparent)]
    Handler(HandlerFailure),

    /// The handler panicked while processing this request.
    ///
    /// `source` holds the error when the handler panicked with an
    /// `anyhow::Error`, so it can still be downcast.
    #[error("handler panicked during `{operation}`: {message}")]
    HandlerPanicked {
        operation: String,
        message: String,
        source: Option<HandlerFailure>,
    },

    /// There is no tokio runtime to host the server tasks.
    #[error("no tokio runtime available to run the server process")]
    NoRuntime,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl GenServerError {
    /// True for the errors caused by the server shutting down.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown | Self::MailboxClosed)
    }

    /// Downcast a handler error to its concrete type, whether the handler
    /// returned it or panicked with it.
    pub fn downcast_handler_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Handler(failure) => failure.downcast_ref(),
            Self::HandlerPanicked {
                source: Some(failure),
                ..
            } => failure.downcast_ref(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for GenServerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Handler(HandlerFailure::from(err))
    }
}

/// A handler error shared between every clone of the call outcome.
#[derive(Clone)]
pub struct HandlerFailure(Arc<anyhow::Error>);

impl HandlerFailure {
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }
}

impl From<anyhow::Error> for HandlerFailure {
    fn from(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl std::error::Error for HandlerFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Errors from configuration validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{which} capacity must be at least 1")]
    ZeroCapacity { which: &'static str },

    #[error("{which} capacity {capacity} exceeds maximum {max}")]
    CapacityTooLarge {
        which: &'static str,
        capacity: usize,
        max: usize,
    },

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Stock errors for handler implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("invalid payload for `{operation}`: expected {expected}")]
    InvalidPayload {
        operation: String,
        expected: &'static str,
    },
}
