//! Messages carried by the mailbox.

use crate::error::GenServerError;
use std::any::Any;

/// A type-erased value exchanged between callers and handlers.
///
/// The concrete type is agreed out-of-band between the two sides.
pub type Payload = Box<dyn Any + Send>;

/// A submitted operation waiting in the mailbox.
#[derive(Debug)]
pub(crate) struct Request {
    /// Correlation id, never interpreted by the dispatch loop
    pub sequence: u64,
    pub operation: String,
    pub payload: Payload,
}

/// The outcome of one request, produced by the dispatch loop.
#[derive(Debug)]
pub(crate) struct Response {
    pub sequence: u64,
    pub operation: String,
    pub result: Result<Option<Payload>, GenServerError>,
}
