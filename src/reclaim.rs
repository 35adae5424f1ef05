//! Three-epoch memory reclamation.
//!
//! A [`Reclaimer`] owns a global epoch counter and a CAS-linked list of
//! per-thread participants. Readers pin themselves to the current epoch;
//! retired pointers land in the retiring thread's bucket for the current
//! epoch. The epoch only advances when every active participant has
//! caught up, so the bucket two generations behind the global epoch can
//! be freed: no reader can still be inside it.

use std::mem;
use std::ptr;
use std::sync::atomic::{
    AtomicBool, AtomicPtr, AtomicU32, AtomicU64, AtomicUsize, Ordering,
};

use thread_local::ThreadLocal;

use crate::guard::Guard;
use crate::retired::Retired;
use crate::spin::SpinLock;

/// Per-thread reclamation state.
///
/// Participants are pushed onto the reclaimer's list once per thread and
/// stay there until the reclaimer is dropped; a thread that exits leaves
/// its participant behind (inactive, buckets drained by later sweeps).
pub(crate) struct Participant {
    /// Epoch snapshot taken when the outermost guard was created.
    pub(crate) local_epoch: AtomicU64,
    /// Whether the owning thread is inside a guarded section.
    pub(crate) active: AtomicBool,
    /// Guard nesting depth; only touched by the owning thread.
    pub(crate) pin_count: AtomicU32,
    /// Retire buckets indexed by `epoch % 3`. Deleters never run while
    /// this lock is held.
    buckets: SpinLock<[Vec<Retired>; 3]>,
    /// Entries currently sitting in this participant's buckets.
    local_retired: AtomicUsize,
    /// Counts advance opportunities so long-idle threads still probe.
    probe_counter: AtomicU32,
    /// Next participant in the reclaimer's list.
    next: AtomicPtr<Participant>,
}

impl Participant {
    fn new() -> Participant {
        Participant {
            local_epoch: AtomicU64::new(0),
            active: AtomicBool::new(false),
            pin_count: AtomicU32::new(0),
            buckets: SpinLock::new([Vec::new(), Vec::new(), Vec::new()]),
            local_retired: AtomicUsize::new(0),
            probe_counter: AtomicU32::new(0),
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

/// Thread-local handle to a registered participant.
struct Registration(*mut Participant);

// SAFETY: the pointee is owned by the reclaimer and outlives every
// registration; the handle itself is just a cached pointer.
unsafe impl Send for Registration {}

/// An epoch-based reclaimer instance.
///
/// Not process-global: each owner (a queue, a map, ...) creates its own
/// and drops it with the owning structure. All participants registered
/// against this instance are freed when it is dropped.
pub struct Reclaimer {
    global_epoch: AtomicU64,
    participants: AtomicPtr<Participant>,
    registry: ThreadLocal<Registration>,
    base_batch: AtomicUsize,
    retire_batch: AtomicUsize,
    probe_stride: AtomicU32,
    global_retired: AtomicUsize,
}

impl Default for Reclaimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reclaimer {
    /// Creates a reclaimer with default tunables.
    pub fn new() -> Reclaimer {
        Reclaimer {
            global_epoch: AtomicU64::new(0),
            participants: AtomicPtr::new(ptr::null_mut()),
            registry: ThreadLocal::new(),
            base_batch: AtomicUsize::new(32),
            retire_batch: AtomicUsize::new(32),
            probe_stride: AtomicU32::new(256),
            global_retired: AtomicUsize::new(0),
        }
    }

    /// Enter a guarded section pinned to the current epoch.
    ///
    /// While the returned [`Guard`] (or any nested one) is live, no object
    /// retired at this epoch or later will be destroyed. Guards nest: only
    /// the outermost one snapshots the epoch, and only its drop re-opens
    /// the thread for reclamation.
    pub fn pin(&self) -> Guard<'_> {
        let ptr = self.participant();
        let participant = unsafe { &*ptr };
        if participant.pin_count.fetch_add(1, Ordering::Relaxed) == 0 {
            participant.active.store(true, Ordering::Release);
            let epoch = self.global_epoch.load(Ordering::Acquire);
            participant.local_epoch.store(epoch, Ordering::Release);
        }
        Guard::new(self, ptr)
    }

    pub(crate) fn unpin(&self, participant: *mut Participant) {
        let participant = unsafe { &*participant };
        if participant.pin_count.fetch_sub(1, Ordering::Relaxed) == 1 {
            participant.active.store(false, Ordering::Release);
            self.maybe_advance_and_reclaim(participant);
        }
    }

    /// Defer destruction of `ptr` until all current readers have passed.
    ///
    /// # Safety
    ///
    /// - `ptr` must come from `Box::into_raw` and be retired exactly once.
    /// - The caller must not touch `*ptr` afterwards; readers that loaded
    ///   the pointer before it was detached remain valid until their
    ///   guards drop.
    pub unsafe fn retire<T>(&self, ptr: *mut T) {
        let participant = unsafe { &*self.participant() };
        let epoch = self.global_epoch.load(Ordering::Acquire);
        let bucket = (epoch % 3) as usize;
        {
            let mut buckets = participant.buckets.lock();
            buckets[bucket].push(Retired::new(ptr));
        }
        participant.local_retired.fetch_add(1, Ordering::Relaxed);
        self.global_retired.fetch_add(1, Ordering::Relaxed);
        self.maybe_advance_and_reclaim(participant);
    }

    /// Declare that the calling thread holds no protected references and
    /// give the reclaimer an opportunity to advance and sweep.
    pub fn quiescent_point(&self) {
        let participant = unsafe { &*self.participant() };
        self.maybe_advance_and_reclaim(participant);
    }

    /// Sets the per-thread batch size that scales the advance threshold.
    pub fn set_base_batch(&self, n: usize) {
        self.base_batch.store(n, Ordering::Relaxed);
    }

    /// Returns the per-thread batch size.
    pub fn base_batch(&self) -> usize {
        self.base_batch.load(Ordering::Relaxed)
    }

    /// Sets the cached advance threshold directly. Recomputed as
    /// `base_batch * active_threads` on every advance opportunity.
    pub fn set_retire_batch(&self, n: usize) {
        self.retire_batch.store(n, Ordering::Relaxed);
    }

    /// Returns the most recently computed advance threshold.
    pub fn retire_batch(&self) -> usize {
        self.retire_batch.load(Ordering::Relaxed)
    }

    /// Sets how often an advance is attempted regardless of thresholds
    /// (every `n` opportunities, clamped to at least 1).
    pub fn set_probe_stride(&self, n: u32) {
        self.probe_stride.store(n.max(1), Ordering::Relaxed);
    }

    /// Returns the probe stride.
    pub fn probe_stride(&self) -> u32 {
        self.probe_stride.load(Ordering::Relaxed)
    }

    /// Empties every bucket of every participant, running all deleters.
    ///
    /// The `&mut self` receiver is the proof of exclusivity: no guard can
    /// be live and no other thread can retire while this runs, so epoch
    /// safety checks are unnecessary.
    pub fn force_reclaim_all_unsafe(&mut self) {
        self.sweep_all_buckets();
        self.global_retired.store(0, Ordering::Relaxed);
    }

    /// Lazily registers the calling thread, once.
    fn participant(&self) -> *mut Participant {
        self.registry
            .get_or(|| Registration(self.register_thread()))
            .0
    }

    fn register_thread(&self) -> *mut Participant {
        let node = Box::into_raw(Box::new(Participant::new()));
        let mut head = self.participants.load(Ordering::Acquire);
        loop {
            unsafe { (*node).next.store(head, Ordering::Relaxed) };
            match self.participants.compare_exchange_weak(
                head,
                node,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return node,
                Err(current) => head = current,
            }
        }
    }

    fn for_each_participant(&self, mut f: impl FnMut(&Participant)) {
        let mut current = self.participants.load(Ordering::Acquire);
        while !current.is_null() {
            let participant = unsafe { &*current };
            f(participant);
            current = participant.next.load(Ordering::Acquire);
        }
    }

    fn active_thread_count(&self) -> usize {
        let mut count = 0;
        self.for_each_participant(|p| {
            if p.active.load(Ordering::Acquire) {
                count += 1;
            }
        });
        count.max(1)
    }

    /// The epoch can advance past `cur` only when every active
    /// participant has caught up to it.
    fn can_advance(&self, cur: u64) -> bool {
        let mut ok = true;
        self.for_each_participant(|p| {
            if ok
                && p.active.load(Ordering::Acquire)
                && p.local_epoch.load(Ordering::Acquire) < cur
            {
                ok = false;
            }
        });
        ok
    }

    /// Advance opportunity: recompute the threshold, check the three
    /// triggers (local count, global count, probe stride), then try to
    /// advance the epoch and sweep the safe bucket.
    fn maybe_advance_and_reclaim(&self, participant: &Participant) {
        let threshold =
            self.base_batch.load(Ordering::Relaxed) * self.active_thread_count();
        self.retire_batch.store(threshold, Ordering::Relaxed);

        let local = participant.local_retired.load(Ordering::Relaxed);
        let count = participant.probe_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let stride = self.probe_stride.load(Ordering::Relaxed).max(1);
        let probe = count % stride == 0;

        let global = self.global_retired.swap(0, Ordering::AcqRel);
        if !(local >= threshold || global >= threshold || probe) {
            // Not consumed: put the global tally back for a later trigger.
            if global > 0 {
                self.global_retired.fetch_add(global, Ordering::Relaxed);
            }
            return;
        }

        let cur = self.global_epoch.load(Ordering::Acquire);
        if self.can_advance(cur) {
            let _ = self.global_epoch.compare_exchange(
                cur,
                cur + 1,
                Ordering::Release,
                Ordering::Relaxed,
            );
            self.reclaim_safe_buckets(cur + 1);
        }

        // Whether or not we advanced, sweep once at the latest epoch so a
        // bucket freed up by someone else's advance is not missed.
        self.reclaim_safe_buckets(self.global_epoch.load(Ordering::Acquire));
    }

    /// Frees the bucket two generations behind `epoch_now` on every
    /// participant: index `(epoch_now + 1) % 3`.
    fn reclaim_safe_buckets(&self, epoch_now: u64) {
        let bucket = ((epoch_now + 1) % 3) as usize;
        self.for_each_participant(|p| {
            let drained = {
                let mut buckets = p.buckets.lock();
                mem::take(&mut buckets[bucket])
            };
            if drained.is_empty() {
                return;
            }
            p.local_retired.fetch_sub(drained.len(), Ordering::Relaxed);
            for entry in drained {
                // SAFETY: the bucket is two epochs behind the global
                // epoch, so no guard can still reference its entries.
                unsafe { entry.reclaim() };
            }
        });
    }

    /// Advance four times, sweeping after each step, then sweep once more
    /// so every bucket index has been visited.
    fn drain_all(&self) {
        for _ in 0..4 {
            let cur = self.global_epoch.load(Ordering::Acquire);
            self.global_epoch.store(cur + 1, Ordering::Release);
            self.reclaim_safe_buckets(cur + 1);
        }
        self.reclaim_safe_buckets(self.global_epoch.load(Ordering::Acquire));
        self.global_retired.store(0, Ordering::Relaxed);
    }

    fn sweep_all_buckets(&self) {
        self.for_each_participant(|p| {
            for bucket in 0..3 {
                let drained = {
                    let mut buckets = p.buckets.lock();
                    mem::take(&mut buckets[bucket])
                };
                p.local_retired.fetch_sub(drained.len(), Ordering::Relaxed);
                for entry in drained {
                    // SAFETY: caller (drop or `force_reclaim_all_unsafe`)
                    // holds exclusive access to the reclaimer.
                    unsafe { entry.reclaim() };
                }
            }
        });
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        self.drain_all();
        // `&mut self`: nothing can be pinned, so any leftovers are safe
        // to free without epoch checks.
        self.sweep_all_buckets();

        let mut current = self.participants.load(Ordering::Relaxed);
        while !current.is_null() {
            let participant = unsafe { Box::from_raw(current) };
            current = participant.next.load(Ordering::Relaxed);
        }
    }
}
