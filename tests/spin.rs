use std::sync::Arc;
use std::thread;

use tarn::SpinLock;

#[test]
fn guard_gives_exclusive_access() {
    let lock = SpinLock::new(5u32);
    {
        let mut guard = lock.lock();
        *guard += 1;
        assert!(lock.try_lock().is_none());
    }
    assert_eq!(*lock.lock(), 6);
}

#[test]
fn try_lock_succeeds_when_free() {
    let lock = SpinLock::new(());
    let guard = lock.try_lock();
    assert!(guard.is_some());
    assert!(lock.try_lock().is_none());
    drop(guard);
    assert!(lock.try_lock().is_some());
}

#[test]
#[cfg_attr(miri, ignore)]
fn increments_are_not_lost_under_contention() {
    let lock = Arc::new(SpinLock::new(0u64));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let lock = lock.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..10_000 {
                *lock.lock() += 1;
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*lock.lock(), 80_000);
}
