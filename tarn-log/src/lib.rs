//! Asynchronous, level-filtered log pipeline.
//!
//! Producer threads render a record into a single line and hand it to a
//! lock-free ring queue ([`tarn_queue::RingQueue`]); one output worker
//! drains the queue, applies rotation, and writes to the configured
//! sinks. In synchronous mode the calling thread writes directly under
//! the IO mutex instead.
//!
//! The logger is a process-wide singleton with explicit lifecycle:
//!
//! ```no_run
//! use tarn_log::{log_info, logger, Level, LogConfig, Rotation};
//!
//! logger()
//!     .init(LogConfig {
//!         console: true,
//!         file_path: Some("logs/app.log".into()),
//!         min_level: Level::Info,
//!         rotation: Rotation::BySize,
//!         async_mode: true,
//!         ..LogConfig::default()
//!     })
//!     .unwrap();
//!
//! log_info!("listening on {}:{}", "0.0.0.0", 8080);
//!
//! // Drains the queue, flushes and closes the file.
//! logger().stop();
//! ```
//!
//! Rendered line format:
//! `[YYYY-MM-DD hh:mm:ss] [LEVEL] [basename(file):line func] message`.
//!
//! In async mode producers never block: when the queue is full the
//! record is dropped and counted ([`Logger::dropped`]).

#![warn(missing_docs)]

mod config;
mod logger;
mod macros;

pub use config::{Level, LogConfig, Rotation};
pub use logger::{logger, LogError, Logger};
