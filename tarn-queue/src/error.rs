//! Queue error types.

use thiserror::Error;

/// The requested capacity cannot be rounded up to a power of two.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("capacity {0} overflows when rounded up to a power of two")]
pub struct CapacityError(pub usize);

/// A blocking or timed push failed; the rejected value rides along so the
/// caller keeps ownership.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushError<T> {
    /// The queue was stopped before the value could be enqueued.
    #[error("queue is stopped")]
    Stopped(T),
    /// The deadline passed while the queue stayed full.
    #[error("push timed out")]
    Timeout(T),
}

impl<T> PushError<T> {
    /// Recovers the value that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            PushError::Stopped(value) | PushError::Timeout(value) => value,
        }
    }
}

/// An in-place push through [`RingQueue::try_push_with`] failed.
///
/// [`RingQueue::try_push_with`]: crate::RingQueue::try_push_with
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PushWithError {
    /// Every slot is occupied.
    #[error("queue is full")]
    Full,
    /// The queue was stopped.
    #[error("queue is stopped")]
    Stopped,
    /// The payload constructor panicked; the reserved slot was restored
    /// and remains usable.
    #[error("payload constructor panicked")]
    ConstructorPanicked,
}

/// A blocking or timed pop failed.
///
/// Shutdown code must treat [`Stopped`] and [`Timeout`] the same way:
/// both mean "no value, re-check your exit condition".
///
/// [`Stopped`]: PopError::Stopped
/// [`Timeout`]: PopError::Timeout
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PopError {
    /// The queue was stopped while waiting.
    #[error("queue is stopped")]
    Stopped,
    /// The deadline passed while the queue stayed empty.
    #[error("pop timed out")]
    Timeout,
}
