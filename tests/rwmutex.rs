use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tarn::RwMutex;

#[test]
fn readers_share_writers_exclude() {
    let lock = RwMutex::new();

    lock.read_lock();
    assert!(lock.try_read_lock());
    assert!(!lock.try_write_lock());
    lock.read_unlock();
    lock.read_unlock();

    assert!(lock.try_write_lock());
    assert!(!lock.try_read_lock());
    assert!(!lock.try_write_lock());
    lock.write_unlock();
}

#[test]
fn guards_release_on_scope_exit() {
    let lock = RwMutex::new();
    {
        let _read = lock.read();
        assert!(!lock.try_write_lock());
    }
    {
        let _write = lock.write();
        assert!(!lock.try_read_lock());
    }
    assert!(lock.try_read_lock());
    lock.read_unlock();
}

#[test]
#[cfg_attr(miri, ignore)]
fn mutual_exclusion_invariant() {
    let lock = Arc::new(RwMutex::new());
    let readers = Arc::new(AtomicUsize::new(0));
    let writers = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..8 {
        let lock = lock.clone();
        let readers = readers.clone();
        let writers = writers.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..1_000 {
                if i % 2 == 0 {
                    let _guard = lock.read();
                    readers.fetch_add(1, Ordering::AcqRel);
                    // R > 0 implies W = 0.
                    assert_eq!(writers.load(Ordering::Acquire), 0);
                    readers.fetch_sub(1, Ordering::AcqRel);
                } else {
                    let _guard = lock.write();
                    assert_eq!(writers.fetch_add(1, Ordering::AcqRel), 0);
                    // W = 1 implies R = 0.
                    assert_eq!(readers.load(Ordering::Acquire), 0);
                    writers.fetch_sub(1, Ordering::AcqRel);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn waiting_writer_beats_new_reader() {
    let lock = Arc::new(RwMutex::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    // First reader takes and holds the lock.
    lock.read_lock();

    let writer = {
        let lock = lock.clone();
        let order = order.clone();
        thread::spawn(move || {
            let _guard = lock.write();
            order.lock().unwrap().push("writer");
        })
    };

    // Give the writer time to queue up.
    thread::sleep(Duration::from_millis(100));

    let late_reader = {
        let lock = lock.clone();
        let order = order.clone();
        thread::spawn(move || {
            let _guard = lock.read();
            order.lock().unwrap().push("reader");
        })
    };

    // The late reader must be barred while the writer waits.
    thread::sleep(Duration::from_millis(100));
    assert!(order.lock().unwrap().is_empty());

    lock.read_unlock();
    writer.join().unwrap();
    late_reader.join().unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["writer", "reader"]);
}

#[test]
#[cfg_attr(miri, ignore)]
fn writer_acquires_under_reader_stream() {
    let lock = Arc::new(RwMutex::new());
    let done = Arc::new(AtomicUsize::new(0));

    let mut readers = Vec::new();
    for _ in 0..4 {
        let lock = lock.clone();
        let done = done.clone();
        readers.push(thread::spawn(move || {
            while done.load(Ordering::Acquire) == 0 {
                let _guard = lock.read();
                thread::yield_now();
            }
        }));
    }

    // The writer must get through despite the reader churn.
    {
        let _guard = lock.write();
        done.store(1, Ordering::Release);
    }

    for handle in readers {
        handle.join().unwrap();
    }
}
