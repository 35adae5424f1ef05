//! End-to-end demo: producers log through the async pipeline while the
//! unbounded queue fans work out to consumers.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tarn_log::{log_info, log_warn, logger, Level, LogConfig, Rotation};
use tarn_queue::LinkedQueue;

fn main() {
    logger()
        .init(LogConfig {
            console: true,
            file_path: Some("logs/simple.log".into()),
            min_level: Level::Info,
            rotation: Rotation::BySize,
            max_file_size: 64 * 1024,
            max_file_count: 3,
            async_mode: true,
            ..LogConfig::default()
        })
        .expect("logger init");

    let work = Arc::new(LinkedQueue::new());

    let mut consumers = Vec::new();
    for id in 0..2 {
        let work = work.clone();
        consumers.push(thread::spawn(move || loop {
            match work.pop_for(Duration::from_millis(200)) {
                Ok(job) => log_info!("consumer {id} handled job {job}"),
                Err(_) => {
                    log_warn!("consumer {id} idle, exiting");
                    return;
                }
            }
        }));
    }

    for job in 0..100 {
        work.push(job);
    }

    for consumer in consumers {
        consumer.join().unwrap();
    }

    log_info!("dropped records: {}", logger().dropped());
    logger().stop();
}
