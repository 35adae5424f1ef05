//! Cache alignment and condvar parking helpers.

use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, WaitTimeoutResult};
use std::time::Duration;

// Cache line sizes per architecture.
// x86/x86_64: 64B, aarch64: 128B (Apple M-series / Neoverse), s390x: 256B.

#[cfg(target_arch = "s390x")]
#[repr(align(256))]
#[derive(Default, Debug)]
pub(crate) struct CacheAligned<T> {
    pub data: T,
}

#[cfg(target_arch = "aarch64")]
#[repr(align(128))]
#[derive(Default, Debug)]
pub(crate) struct CacheAligned<T> {
    pub data: T,
}

#[cfg(not(any(target_arch = "s390x", target_arch = "aarch64")))]
#[repr(align(64))]
#[derive(Default, Debug)]
pub(crate) struct CacheAligned<T> {
    pub data: T,
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for CacheAligned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

impl<T> CacheAligned<T> {
    pub(crate) fn new(t: T) -> Self {
        Self { data: t }
    }
}

/// A mutex/condvar pair used purely for parking.
///
/// Queue state lives in atomics, not behind the mutex. To close the
/// window where a waiter passes its predicate and a notifier fires
/// before the waiter is actually asleep, `notify_*` acquires and
/// releases the mutex first: the notifier cannot get the lock until the
/// waiter has atomically released it into the wait.
pub(crate) struct Monitor {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Monitor {
    pub(crate) fn new() -> Monitor {
        Monitor {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock().unwrap()
    }

    pub(crate) fn wait<'a>(&self, parked: MutexGuard<'a, ()>) -> MutexGuard<'a, ()> {
        self.condvar.wait(parked).unwrap()
    }

    pub(crate) fn wait_timeout<'a>(
        &self,
        parked: MutexGuard<'a, ()>,
        timeout: Duration,
    ) -> (MutexGuard<'a, ()>, WaitTimeoutResult) {
        self.condvar.wait_timeout(parked, timeout).unwrap()
    }

    pub(crate) fn notify_one(&self) {
        drop(self.mutex.lock().unwrap());
        self.condvar.notify_one();
    }

    pub(crate) fn notify_all(&self) {
        drop(self.mutex.lock().unwrap());
        self.condvar.notify_all();
    }
}
