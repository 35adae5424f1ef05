//! Lock-free MPMC queues with blocking and timed variants.
//!
//! Two queue flavors share one operational contract (stoppable, timed,
//! multi-producer multi-consumer):
//!
//! - [`RingQueue`]: a bounded array queue over power-of-two capacity.
//!   Producers and consumers hand slots to each other through per-cell
//!   sequence numbers; no mutex is involved on the fast path.
//! - [`LinkedQueue`]: an unbounded Michael–Scott linked queue whose
//!   detached nodes are reclaimed through a [`tarn::Reclaimer`], so a
//!   consumer traversing a node can never see it freed underfoot.
//!
//! Blocking variants park on condition variables; the actual handoff is
//! always the lock-free path. `stop()` wakes every parked thread exactly
//! once and fails all subsequent blocking calls.
//!
//! # Example
//!
//! ```rust
//! use tarn_queue::RingQueue;
//!
//! let queue = RingQueue::new(4).unwrap();
//! queue.try_push(1).unwrap();
//! assert_eq!(queue.try_pop(), Some(1));
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod linked;
pub mod ring;
pub(crate) mod utils;

pub use error::{CapacityError, PopError, PushError, PushWithError};
pub use linked::LinkedQueue;
pub use ring::RingQueue;
