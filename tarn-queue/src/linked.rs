//! Unbounded MPMC linked queue.
//!
//! Michael–Scott two-pointer queue. `head` always points at a sentinel
//! whose value slot is empty; values are linked after `tail`, which may
//! lag by one node (any operation that notices helps swing it). A
//! dequeue advances `head`, making the dequeued node the new sentinel,
//! and hands the old sentinel to the embedded [`Reclaimer`]; a
//! concurrent reader still traversing it keeps it alive through its
//! guard.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicPtr, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::Backoff;
use tarn::Reclaimer;

use crate::error::PopError;
use crate::utils::{CacheAligned, Monitor};

struct Node<T> {
    /// Empty on the sentinel, `Some` everywhere else. Only the dequeuer
    /// that won the head CAS touches it.
    value: UnsafeCell<Option<T>>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value: UnsafeCell::new(None),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }

    fn new(value: T) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value: UnsafeCell::new(Some(value)),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// An unbounded multi-producer multi-consumer queue.
///
/// [`push`](LinkedQueue::push) never fails and never blocks;
/// [`try_pop`](LinkedQueue::try_pop) never blocks. The blocking and
/// timed pops park on a condition variable and fail once
/// [`stop`](LinkedQueue::stop) has been called. Pushing after `stop` is
/// allowed; the values are only drained if consumers keep polling.
pub struct LinkedQueue<T> {
    head: CacheAligned<AtomicPtr<Node<T>>>,
    tail: CacheAligned<AtomicPtr<Node<T>>>,

    /// Reclaims detached sentinels once concurrent readers are done.
    reclaimer: Reclaimer,

    /// Consumers park here while the queue is empty.
    not_empty: Monitor,

    /// May transiently run behind (a pop can finish before the matching
    /// push's increment); reads clamp negatives to zero.
    approximate_size: AtomicIsize,

    stopped: AtomicBool,
}

unsafe impl<T: Send> Send for LinkedQueue<T> {}
unsafe impl<T: Send> Sync for LinkedQueue<T> {}

impl<T: Send + 'static> Default for LinkedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> LinkedQueue<T> {
    /// Creates an empty queue (one permanent sentinel node).
    pub fn new() -> LinkedQueue<T> {
        let sentinel = Node::sentinel();
        LinkedQueue {
            head: CacheAligned::new(AtomicPtr::new(sentinel)),
            tail: CacheAligned::new(AtomicPtr::new(sentinel)),
            reclaimer: Reclaimer::new(),
            not_empty: Monitor::new(),
            approximate_size: AtomicIsize::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    /// Enqueues a value. Never fails; allowed even after `stop`.
    pub fn push(&self, value: T) {
        let node = Node::new(value);
        let guard = self.reclaimer.pin();
        let backoff = Backoff::new();
        loop {
            let last = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*last).next.load(Ordering::Acquire) };
            if last != self.tail.load(Ordering::Acquire) {
                continue;
            }
            if next.is_null() {
                if unsafe {
                    (*last)
                        .next
                        .compare_exchange(
                            ptr::null_mut(),
                            node,
                            Ordering::Release,
                            Ordering::Relaxed,
                        )
                        .is_ok()
                } {
                    // Best effort: a failed swing is completed by the
                    // next operation that notices the lag.
                    let _ = self.tail.compare_exchange(
                        last,
                        node,
                        Ordering::Release,
                        Ordering::Relaxed,
                    );
                    self.approximate_size.fetch_add(1, Ordering::Relaxed);
                    drop(guard);
                    self.not_empty.notify_one();
                    return;
                }
                backoff.spin();
            } else {
                // Tail lags; help it forward and retry.
                let _ = self.tail.compare_exchange(
                    last,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
            }
        }
    }

    /// Attempts to dequeue without blocking. Returns `None` when empty.
    pub fn try_pop(&self) -> Option<T> {
        let _guard = self.reclaimer.pin();
        let backoff = Backoff::new();
        loop {
            let first = self.head.load(Ordering::Acquire);
            let last = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*first).next.load(Ordering::Acquire) };
            if first != self.head.load(Ordering::Acquire) {
                continue;
            }
            if next.is_null() {
                return None;
            }
            if first == last {
                // Tail lags behind a linked node; help before retrying.
                let _ = self.tail.compare_exchange(
                    last,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                continue;
            }
            match self.head.compare_exchange(
                first,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // We own the dequeue: `next` is the new sentinel and
                    // only we may empty its value slot.
                    let value = unsafe { (*(*next).value.get()).take() };
                    debug_assert!(value.is_some());
                    // The old sentinel may still be traversed by peers;
                    // defer its destruction.
                    unsafe { self.reclaimer.retire(first) };
                    self.approximate_size.fetch_sub(1, Ordering::Relaxed);
                    return value;
                }
                Err(_) => backoff.spin(),
            }
        }
    }

    /// Dequeues, parking while the queue is empty.
    ///
    /// Fails with [`PopError::Stopped`] once the queue is stopped.
    pub fn pop_blocking(&self) -> Result<T, PopError> {
        loop {
            if let Some(value) = self.try_pop() {
                return Ok(value);
            }
            let parked = self.not_empty.lock();
            if self.stopped() {
                return Err(PopError::Stopped);
            }
            // Re-check with the lock held: a push completed before this
            // point is visible here, and one completed after it cannot
            // notify until we are parked.
            if let Some(value) = self.try_pop() {
                return Ok(value);
            }
            drop(self.not_empty.wait(parked));
        }
    }

    /// Dequeues, parking up to `timeout` while the queue is empty.
    pub fn pop_for(&self, timeout: Duration) -> Result<T, PopError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(value) = self.try_pop() {
                return Ok(value);
            }
            let parked = self.not_empty.lock();
            if self.stopped() {
                return Err(PopError::Stopped);
            }
            if let Some(value) = self.try_pop() {
                return Ok(value);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(PopError::Timeout);
            }
            let (parked, result) = self.not_empty.wait_timeout(parked, deadline - now);
            drop(parked);
            if result.timed_out() {
                // A value that arrived with the wakeup is still honored.
                return match self.try_pop() {
                    Some(value) => Ok(value),
                    None if self.stopped() => Err(PopError::Stopped),
                    None => Err(PopError::Timeout),
                };
            }
        }
    }

    /// Stops the queue: wakes all parked consumers, which then fail with
    /// [`PopError::Stopped`]. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.not_empty.notify_all();
    }

    /// Approximate number of queued values; informational only.
    pub fn len(&self) -> usize {
        self.approximate_size.load(Ordering::Relaxed).max(0) as usize
    }

    /// Whether the queue is (approximately) empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl<T> Drop for LinkedQueue<T> {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        // Free the remaining chain directly; `&mut self` means no
        // concurrent readers. Nodes retired earlier are no longer
        // reachable from `head` and are freed by the reclaimer's drop.
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            let node = unsafe { Box::from_raw(current) };
            current = node.next.load(Ordering::Relaxed);
        }
    }
}
