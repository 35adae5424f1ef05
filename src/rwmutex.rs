//! Reader/writer mutex with writer priority.

use std::sync::{Condvar, Mutex};

#[derive(Default)]
struct State {
    /// Threads currently holding the read side.
    readers: usize,
    /// 0 or 1.
    writers: usize,
    /// Threads parked in `write_lock`. New readers are barred while this
    /// is non-zero, which is what keeps writers from starving.
    write_waiters: usize,
}

/// A reader/writer mutex.
///
/// Many readers may hold the lock at once; at most one writer, and never
/// both. Admission is writer-priority: a reader arriving while a writer
/// is waiting blocks until that writer has been through.
///
/// Not reentrant. A thread that read-locks twice deadlocks if a writer
/// queues up between the two acquisitions; a thread that write-locks
/// while holding either side deadlocks immediately.
///
/// Prefer the scoped [`RwMutex::read`] / [`RwMutex::write`] guards; the
/// raw `*_lock` / `*_unlock` methods exist for callers that cannot
/// express the critical section as a lexical scope.
pub struct RwMutex {
    state: Mutex<State>,
    read_cv: Condvar,
    write_cv: Condvar,
}

impl Default for RwMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl RwMutex {
    /// Creates an unlocked mutex.
    pub fn new() -> RwMutex {
        RwMutex {
            state: Mutex::new(State::default()),
            read_cv: Condvar::new(),
            write_cv: Condvar::new(),
        }
    }

    /// Acquires the read side, blocking while a writer holds or awaits
    /// the lock.
    pub fn read_lock(&self) {
        let mut state = self.state.lock().unwrap();
        while state.writers > 0 || state.write_waiters > 0 {
            state = self.read_cv.wait(state).unwrap();
        }
        state.readers += 1;
    }

    /// Acquires the read side if no writer holds or awaits the lock.
    pub fn try_read_lock(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.writers > 0 || state.write_waiters > 0 {
            return false;
        }
        state.readers += 1;
        true
    }

    /// Releases the read side. The last reader out hands the lock to one
    /// waiting writer.
    pub fn read_unlock(&self) {
        let mut state = self.state.lock().unwrap();
        state.readers = state
            .readers
            .checked_sub(1)
            .expect("read_unlock without matching read_lock");
        if state.readers == 0 {
            self.write_cv.notify_one();
        }
    }

    /// Acquires the write side, blocking until all readers and any
    /// current writer have released.
    pub fn write_lock(&self) {
        let mut state = self.state.lock().unwrap();
        state.write_waiters += 1;
        while state.readers > 0 || state.writers > 0 {
            state = self.write_cv.wait(state).unwrap();
        }
        state.write_waiters -= 1;
        state.writers = 1;
    }

    /// Acquires the write side if the lock is free.
    pub fn try_write_lock(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.readers > 0 || state.writers > 0 {
            return false;
        }
        state.writers = 1;
        true
    }

    /// Releases the write side. A waiting writer is preferred over the
    /// reader herd.
    pub fn write_unlock(&self) {
        let mut state = self.state.lock().unwrap();
        assert!(state.writers == 1, "write_unlock without matching write_lock");
        state.writers = 0;
        if state.write_waiters > 0 {
            self.write_cv.notify_one();
        } else {
            self.read_cv.notify_all();
        }
    }

    /// Acquires the read side for the returned guard's scope.
    pub fn read(&self) -> ReadGuard<'_> {
        self.read_lock();
        ReadGuard { lock: self }
    }

    /// Acquires the write side for the returned guard's scope.
    pub fn write(&self) -> WriteGuard<'_> {
        self.write_lock();
        WriteGuard { lock: self }
    }
}

/// RAII read lock; released on drop, including during unwinding.
pub struct ReadGuard<'a> {
    lock: &'a RwMutex,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.read_unlock();
    }
}

/// RAII write lock; released on drop, including during unwinding.
pub struct WriteGuard<'a> {
    lock: &'a RwMutex,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.write_unlock();
    }
}
