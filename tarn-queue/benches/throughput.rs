//! Throughput benchmarks for the tarn queues.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use tarn_queue::{LinkedQueue, RingQueue};

fn bench_ring_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_single_thread");

    group.throughput(Throughput::Elements(1));
    group.bench_function("push_pop", |b| {
        let queue = RingQueue::new(1024).unwrap();
        b.iter(|| {
            queue.try_push(black_box(1u64)).unwrap();
            black_box(queue.try_pop());
        });
    });

    group.finish();
}

fn bench_ring_mpmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_mpmc");

    for threads in [2usize, 4] {
        group.throughput(Throughput::Elements(10_000 * threads as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let queue = Arc::new(RingQueue::new(256).unwrap());
                    let mut handles = Vec::new();
                    for _ in 0..threads {
                        let queue = queue.clone();
                        handles.push(thread::spawn(move || {
                            for i in 0..10_000u64 {
                                let mut value = i;
                                while let Err(rejected) = queue.try_push(value) {
                                    value = rejected;
                                    thread::yield_now();
                                }
                            }
                        }));
                    }
                    for _ in 0..threads {
                        let queue = queue.clone();
                        handles.push(thread::spawn(move || {
                            let mut remaining = 10_000;
                            while remaining > 0 {
                                if queue.try_pop().is_some() {
                                    remaining -= 1;
                                } else {
                                    thread::yield_now();
                                }
                            }
                        }));
                    }
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_linked_mpmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("linked_mpmc");

    for threads in [2usize, 4] {
        group.throughput(Throughput::Elements(10_000 * threads as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let queue = Arc::new(LinkedQueue::new());
                    let mut handles = Vec::new();
                    for _ in 0..threads {
                        let queue = queue.clone();
                        handles.push(thread::spawn(move || {
                            for i in 0..10_000u64 {
                                queue.push(i);
                            }
                        }));
                    }
                    for _ in 0..threads {
                        let queue = queue.clone();
                        handles.push(thread::spawn(move || {
                            let mut remaining = 10_000;
                            while remaining > 0 {
                                if queue.try_pop().is_some() {
                                    remaining -= 1;
                                } else {
                                    thread::yield_now();
                                }
                            }
                        }));
                    }
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_ring_single_thread,
    bench_ring_mpmc,
    bench_linked_mpmc
);
criterion_main!(benches);
