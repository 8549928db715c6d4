//! # Reply destinations
//!
//! A caller names where a successful reply value should go. The value is
//! written only when the destination is a reference of exactly the reply's
//! runtime type. In every other case it is silently dropped: a nil
//! destination, a by-value destination, or a type mismatch all leave the
//! caller's data untouched and the call still succeeds. Each discard is
//! traced at `trace` level so a mismatch can be found without turning it
//! into an error.

use crate::message::Payload;
use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{trace, warn};

/// A destination that can receive a reply value of one concrete type.
///
/// `accept` runs on the server's response router. A panic in it is caught
/// and the reply dropped; the call itself still completes.
pub trait ReplySink: Send + Sync + 'static {
    /// Store `value` if it has the sink's type; otherwise hand it back.
    fn accept(&self, value: Payload) -> Result<(), Payload>;

    /// Name of the accepted type, for diagnostics.
    fn expected_type(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send> ReplySink for Mutex<T> {
    fn accept(&self, value: Payload) -> Result<(), Payload> {
        let value = value.downcast::<T>()?;
        *self.lock() = *value;
        Ok(())
    }

    fn expected_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A shared, typed cell a call can write its reply into.
///
/// ```
/// use gen_server::{ReplySlot, ReplyTo};
///
/// let slot = ReplySlot::new(0_i64);
/// let destination = ReplyTo::from(&slot);
/// # drop(destination);
/// assert_eq!(slot.get(), 0);
/// ```
pub struct ReplySlot<T> {
    cell: Arc<Mutex<T>>,
}

impl<T: Any + Send> ReplySlot<T> {
    pub fn new(initial: T) -> Self {
        Self {
            cell: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.cell.lock().clone()
    }

    pub fn take(&self) -> T
    where
        T: Default,
    {
        std::mem::take(&mut *self.cell.lock())
    }

    pub fn set(&self, value: T) {
        *self.cell.lock() = value;
    }
}

impl<T> Clone for ReplySlot<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Any + Send + Default> Default for ReplySlot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for ReplySlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReplySlot").field(&*self.cell.lock()).finish()
    }
}

/// Where a call's reply value goes.
#[derive(Default)]
pub enum ReplyTo {
    /// No destination; the reply is dropped.
    #[default]
    Discard,
    /// A value handed over by value. The caller keeps no reference to it,
    /// so the reply is dropped and this value is left as it was.
    Value(Box<dyn Any + Send + Sync>),
    /// A shared reference the reply is written into on a type match.
    Slot(Arc<dyn ReplySink>),
}

impl ReplyTo {
    /// Offer a reply value. Returns true if it was written.
    pub(crate) fn deliver(&self, sequence: u64, value: Payload) -> bool {
        match self {
            Self::Discard => {
                trace!(sequence = sequence, "Reply discarded: no destination");
                false
            }
            Self::Value(_) => {
                trace!(
                    sequence = sequence,
                    "Reply discarded: destination is not a reference"
                );
                false
            }
            // Sinks may be caller code; a panic must not take down the router
            Self::Slot(sink) => match panic::catch_unwind(AssertUnwindSafe(|| sink.accept(value))) {
                Ok(Ok(())) => true,
                Ok(Err(_)) => {
                    trace!(
                        sequence = sequence,
                        expected = sink.expected_type(),
                        "Reply discarded: destination type mismatch"
                    );
                    false
                }
                Err(_) => {
                    warn!(
                        sequence = sequence,
                        expected = sink.expected_type(),
                        "Reply discarded: destination panicked"
                    );
                    false
                }
            },
        }
    }

    /// The slot cell if this destination is a `ReplySlot<T>`.
    pub(crate) fn slot<T: Any + Send>(&self) -> Option<&Mutex<T>> {
        match self {
            Self::Slot(sink) => sink.as_any().downcast_ref::<Mutex<T>>(),
            _ => None,
        }
    }
}

impl<T: Any + Send> From<&ReplySlot<T>> for ReplyTo {
    fn from(slot: &ReplySlot<T>) -> Self {
        Self::Slot(slot.cell.clone())
    }
}

impl<T: Any + Send> From<ReplySlot<T>> for ReplyTo {
    fn from(slot: ReplySlot<T>) -> Self {
        Self::Slot(slot.cell)
    }
}

impl fmt::Debug for ReplyTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discard => f.write_str("Discard"),
            Self::Value(_) => f.write_str("Value(..)"),
            Self::Slot(sink) => write!(f, "Slot<{}>", sink.expected_type()),
        }
    }
}
