//! Bounded MPMC ring queue.
//!
//! A Vyukov-style array queue: each cell carries a sequence number that
//! hands ownership back and forth between producers and consumers.
//! For a cell at position `pos`:
//!
//! - `sequence == pos`: writable by the producer that claims `pos`;
//! - `sequence == pos + 1`: holds a value readable by the consumer
//!   that claims `pos`;
//! - `sequence == pos + capacity`: drained, writable again on the next
//!   lap.
//!
//! The cursor CAS is relaxed; the release store on `sequence` paired
//! with the acquire load on the other side is what publishes the
//! payload.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_utils::Backoff;

use crate::error::{CapacityError, PopError, PushError, PushWithError};
use crate::utils::{CacheAligned, Monitor};

struct Slot<T> {
    /// The cell's current sequence number.
    sequence: AtomicUsize,

    /// The value, if the sequence number says there is one.
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A bounded multi-producer multi-consumer queue.
///
/// Capacity is rounded up to the next power of two (at least 2). The
/// `try_*` operations never block; the `*_blocking` and `*_for`
/// variants park on condition variables when the queue is full or
/// empty. [`RingQueue::stop`] wakes all parked threads and makes every
/// subsequent operation fail immediately.
pub struct RingQueue<T> {
    /// Cells, each on its own cache line.
    buffer: Box<[CacheAligned<Slot<T>>]>,

    /// `capacity - 1`; positions map to cells by `pos & mask`.
    mask: usize,

    /// Next position a producer will claim.
    enqueue_pos: CacheAligned<AtomicUsize>,

    /// Next position a consumer will claim.
    dequeue_pos: CacheAligned<AtomicUsize>,

    stopped: AtomicBool,

    /// Threads currently inside a blocking operation; drop waits for
    /// this to reach zero before tearing the buffer down.
    active_threads: AtomicUsize,

    /// Producers park here while the queue is full.
    not_full: Monitor,

    /// Consumers park here while the queue is empty.
    not_empty: Monitor,
}

unsafe impl<T: Send> Send for RingQueue<T> {}
unsafe impl<T: Send> Sync for RingQueue<T> {}

/// Decrements the active-thread counter even when the operation unwinds.
struct ActiveThread<'a>(&'a AtomicUsize);

impl<'a> ActiveThread<'a> {
    fn enter(counter: &'a AtomicUsize) -> ActiveThread<'a> {
        counter.fetch_add(1, Ordering::AcqRel);
        ActiveThread(counter)
    }
}

impl Drop for ActiveThread<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T> RingQueue<T> {
    /// Creates a queue with the given capacity, rounded up to the next
    /// power of two and never below 2.
    ///
    /// Fails when the round-up would overflow `usize`.
    pub fn new(capacity: usize) -> Result<RingQueue<T>, CapacityError> {
        let capacity = Self::round_up_to_power_of_two(capacity)?;
        let mut buffer = Vec::with_capacity(capacity);
        for i in 0..capacity {
            buffer.push(CacheAligned::new(Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            }));
        }

        Ok(RingQueue {
            buffer: buffer.into_boxed_slice(),
            mask: capacity - 1,
            enqueue_pos: CacheAligned::new(AtomicUsize::new(0)),
            dequeue_pos: CacheAligned::new(AtomicUsize::new(0)),
            stopped: AtomicBool::new(false),
            active_threads: AtomicUsize::new(0),
            not_full: Monitor::new(),
            not_empty: Monitor::new(),
        })
    }

    fn round_up_to_power_of_two(n: usize) -> Result<usize, CapacityError> {
        if n < 2 {
            return Ok(2);
        }
        if n > (usize::MAX >> 1) + 1 {
            return Err(CapacityError(n));
        }
        Ok(n.next_power_of_two())
    }

    /// Attempts to enqueue without blocking.
    ///
    /// Fails when the queue is full or stopped, handing the value back.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut value = Some(value);
        match self.try_push_with(|| value.take().unwrap()) {
            Ok(()) => Ok(()),
            // On Full/Stopped the constructor never ran, so the value is
            // still here; ConstructorPanicked cannot happen for a move.
            Err(_) => Err(value.take().unwrap()),
        }
    }

    /// Attempts to enqueue a value built in place by `ctor`.
    ///
    /// The slot is reserved first; if `ctor` panics, the reservation is
    /// rolled back (`sequence` restored, `enqueue_pos` decremented) so
    /// the slot is not lost, and the panic is reported as
    /// [`PushWithError::ConstructorPanicked`].
    pub fn try_push_with<F>(&self, ctor: F) -> Result<(), PushWithError>
    where
        F: FnOnce() -> T,
    {
        if self.stopped() {
            return Err(PushWithError::Stopped);
        }

        let backoff = Backoff::new();
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        let claimed_seq;
        loop {
            if self.stopped() {
                return Err(PushWithError::Stopped);
            }
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;

            if diff == 0 {
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        claimed_seq = seq;
                        break;
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                // The consumer side has not drained this cell yet.
                return Err(PushWithError::Full);
            } else {
                // Another producer reserved `pos` but has not published.
                backoff.snooze();
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }

        let slot = &self.buffer[pos & self.mask];
        match catch_unwind(AssertUnwindSafe(ctor)) {
            Ok(value) => {
                unsafe { slot.value.get().write(MaybeUninit::new(value)) };
                slot.sequence.store(pos + 1, Ordering::Release);
                Ok(())
            }
            Err(_) => {
                self.enqueue_pos.fetch_sub(1, Ordering::Relaxed);
                slot.sequence.store(claimed_seq, Ordering::Release);
                Err(PushWithError::ConstructorPanicked)
            }
        }
    }

    /// Attempts to dequeue without blocking.
    ///
    /// Returns `None` when the queue is empty or stopped.
    pub fn try_pop(&self) -> Option<T> {
        if self.stopped() {
            return None;
        }

        let backoff = Backoff::new();
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        loop {
            if self.stopped() {
                return None;
            }
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - (pos + 1) as isize;

            if diff == 0 {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { slot.value.get().read().assume_init() };
                        // Re-open the cell for the producer's next lap.
                        slot.sequence
                            .store(pos + self.capacity(), Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                // No producer has published this cell: empty.
                return None;
            } else {
                backoff.snooze();
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Enqueues, parking while the queue is full.
    ///
    /// Fails with [`PushError::Stopped`] once the queue is stopped.
    pub fn push_blocking(&self, value: T) -> Result<(), PushError<T>> {
        let _active = ActiveThread::enter(&self.active_threads);
        let mut value = value;
        loop {
            if self.stopped() {
                return Err(PushError::Stopped(value));
            }
            match self.try_push(value) {
                Ok(()) => {
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Err(rejected) => value = rejected,
            }
            let mut parked = self.not_full.lock();
            while !self.stopped() && self.is_full() {
                parked = self.not_full.wait(parked);
            }
        }
    }

    /// Enqueues, parking up to `timeout` while the queue is full.
    pub fn push_for(&self, value: T, timeout: Duration) -> Result<(), PushError<T>> {
        let _active = ActiveThread::enter(&self.active_threads);
        let deadline = Instant::now() + timeout;
        let mut value = value;
        loop {
            if self.stopped() {
                return Err(PushError::Stopped(value));
            }
            match self.try_push(value) {
                Ok(()) => {
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Err(rejected) => value = rejected,
            }
            let mut parked = self.not_full.lock();
            while !self.stopped() && self.is_full() {
                let now = Instant::now();
                if now >= deadline {
                    return Err(PushError::Timeout(value));
                }
                let (guard, result) = self.not_full.wait_timeout(parked, deadline - now);
                parked = guard;
                if result.timed_out() && !self.stopped() && self.is_full() {
                    return Err(PushError::Timeout(value));
                }
            }
        }
    }

    /// Dequeues, parking while the queue is empty.
    ///
    /// Fails with [`PopError::Stopped`] once the queue is stopped.
    pub fn pop_blocking(&self) -> Result<T, PopError> {
        let _active = ActiveThread::enter(&self.active_threads);
        loop {
            if self.stopped() {
                return Err(PopError::Stopped);
            }
            if let Some(value) = self.try_pop() {
                self.not_full.notify_one();
                return Ok(value);
            }
            let mut parked = self.not_empty.lock();
            while !self.stopped() && self.is_empty() {
                parked = self.not_empty.wait(parked);
            }
        }
    }

    /// Dequeues, parking up to `timeout` while the queue is empty.
    pub fn pop_for(&self, timeout: Duration) -> Result<T, PopError> {
        let _active = ActiveThread::enter(&self.active_threads);
        let deadline = Instant::now() + timeout;
        loop {
            if self.stopped() {
                return Err(PopError::Stopped);
            }
            if let Some(value) = self.try_pop() {
                self.not_full.notify_one();
                return Ok(value);
            }
            let mut parked = self.not_empty.lock();
            while !self.stopped() && self.is_empty() {
                let now = Instant::now();
                if now >= deadline {
                    return Err(PopError::Timeout);
                }
                let (guard, result) = self.not_empty.wait_timeout(parked, deadline - now);
                parked = guard;
                if result.timed_out() && !self.stopped() && self.is_empty() {
                    return Err(PopError::Timeout);
                }
            }
        }
    }

    /// Stops the queue: wakes every parked thread and makes all further
    /// operations fail immediately. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Approximate number of queued values. Informational only; never
    /// use it for correctness decisions.
    pub fn len(&self) -> usize {
        let enqueue = self.enqueue_pos.load(Ordering::Acquire);
        let dequeue = self.dequeue_pos.load(Ordering::Acquire);
        enqueue.saturating_sub(dequeue)
    }

    /// Whether the queue is (approximately) empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the queue is (approximately) full.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// The rounded-up capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl<T> Drop for RingQueue<T> {
    fn drop(&mut self) {
        self.stop();

        // Let blocking operations observe the stop and leave; bounded so
        // a wedged thread cannot hold destruction forever.
        let start = Instant::now();
        while self.active_threads.load(Ordering::Acquire) != 0 {
            if start.elapsed() > Duration::from_secs(1) {
                break;
            }
            thread::yield_now();
        }

        // Drain committed payloads straight off the cells; `&mut self`
        // rules out concurrent access, and cells claimed but never
        // published are skipped.
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        let end = self.enqueue_pos.load(Ordering::Relaxed);
        while pos < end {
            let slot = &self.buffer[pos & self.mask];
            if slot.sequence.load(Ordering::Relaxed) == pos + 1 {
                drop(unsafe { slot.value.get().read().assume_init() });
            }
            pos += 1;
        }
    }
}
