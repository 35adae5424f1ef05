//! Tarn: epoch-based memory reclamation and synchronization primitives.
//!
//! Tarn provides the building blocks shared by the lock-free queues in
//! `tarn-queue` and the log pipeline in `tarn-log`:
//!
//! - **Epoch reclamation**: a [`Reclaimer`] defers destruction of objects
//!   retired while concurrent readers may still reference them. Readers
//!   enter a critical section with [`Reclaimer::pin`]; writers hand
//!   detached nodes to [`Reclaimer::retire`] and the reclaimer frees them
//!   once every reader has moved past the retiring epoch.
//! - **Reader/writer mutex**: [`RwMutex`] with writer-priority admission
//!   and RAII scoped guards.
//! - **Spin lock**: a small TTAS [`SpinLock`] for short critical sections.
//!
//! # Example
//!
//! ```rust
//! use tarn::Reclaimer;
//!
//! let reclaimer = Reclaimer::new();
//!
//! // Enter a critical section; objects retired by other threads stay
//! // alive until this guard is dropped.
//! let guard = reclaimer.pin();
//! drop(guard);
//!
//! // Hand a detached pointer to the reclaimer instead of freeing it.
//! let node = Box::into_raw(Box::new(42u64));
//! unsafe { reclaimer.retire(node) };
//! ```

#![warn(missing_docs)]

mod guard;
mod reclaim;
mod retired;
mod rwmutex;
mod spin;

pub use guard::Guard;
pub use reclaim::Reclaimer;
pub use rwmutex::{ReadGuard, RwMutex, WriteGuard};
pub use spin::{SpinGuard, SpinLock};
