//! The process-wide logger: write path, output worker, rotation.

use std::cell::UnsafeCell;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use tarn::RwMutex;
use tarn_queue::{CapacityError, RingQueue};
use thiserror::Error;

use crate::config::{Level, LogConfig, Rotation};

/// Errors surfaced by [`Logger::init`].
#[derive(Debug, Error)]
pub enum LogError {
    /// `init` was called while the pipeline is running; call
    /// [`Logger::stop`] first.
    #[error("logger is already running")]
    AlreadyRunning,
    /// The configured queue size cannot be allocated.
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    /// The worker thread could not be spawned.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything a running pipeline owns. Swapped in by `init`, taken out
/// by `stop`; immutable in between except through the sinks mutex.
struct Core {
    config: LogConfig,
    /// `Some` in async mode. Transports rendered lines, not records,
    /// so the worker has no formatting left to do.
    queue: Option<RingQueue<String>>,
    /// Serializes all sink IO (writers in sync mode, the worker in
    /// async mode, rotation, stop).
    sinks: Mutex<Sinks>,
    running: AtomicBool,
    /// Records rejected by a full queue in async mode.
    dropped: AtomicU64,
}

struct Sinks {
    file: Option<File>,
    /// Running size of the open file, maintained across writes so the
    /// rotation check does not stat the file each time.
    file_size: u64,
    /// Calendar date the open file belongs to (for by-date rotation).
    file_date: Option<NaiveDate>,
}

/// The process-wide log pipeline.
///
/// Obtain it with [`logger`]; there is exactly one per process. The
/// pipeline does nothing until [`init`](Logger::init) installs a
/// configuration, and [`stop`](Logger::stop) tears it down again
/// (draining queued records first). Both are explicit; no work happens
/// in static destructors.
pub struct Logger {
    /// Guards the core swap: writers (`init`/`stop`) exclude the
    /// producer read path only while installing or removing the core.
    swap: RwMutex,
    core: UnsafeCell<Option<Arc<Core>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

// SAFETY: `core` is only read under the swap read lock and only
// replaced under the swap write lock.
unsafe impl Send for Logger {}
unsafe impl Sync for Logger {}

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger {
    swap: RwMutex::new(),
    core: UnsafeCell::new(None),
    worker: Mutex::new(None),
});

/// The process-wide [`Logger`] singleton.
pub fn logger() -> &'static Logger {
    &LOGGER
}

impl Logger {
    /// Starts the pipeline with `config`.
    ///
    /// Opens the file sink (parent directories are created; an open
    /// failure goes to stderr and leaves the sink disabled) and, in
    /// async mode, spawns the output worker. Fails with
    /// [`LogError::AlreadyRunning`] when called twice without a `stop`
    /// in between, since configuration only changes while stopped.
    pub fn init(&self, config: LogConfig) -> Result<(), LogError> {
        let _swap = self.swap.write();
        let slot = unsafe { &mut *self.core.get() };
        if slot.is_some() {
            return Err(LogError::AlreadyRunning);
        }

        let mut sinks = Sinks {
            file: None,
            file_size: 0,
            file_date: None,
        };
        if let Some(path) = config.file_path.as_deref() {
            open_file(path, &mut sinks);
        }

        let queue = if config.async_mode {
            Some(RingQueue::new(config.max_queue_size)?)
        } else {
            None
        };

        let core = Arc::new(Core {
            config,
            queue,
            sinks: Mutex::new(sinks),
            running: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
        });

        if core.config.async_mode {
            let worker_core = Arc::clone(&core);
            let handle = thread::Builder::new()
                .name("tarn-log-worker".into())
                .spawn(move || worker_loop(&worker_core))?;
            *self.worker.lock().unwrap() = Some(handle);
        }

        *slot = Some(core);
        Ok(())
    }

    /// Stops the pipeline: the worker drains every queued record, the
    /// file sink is flushed and closed. Idempotent; records arriving
    /// after the stop are discarded.
    pub fn stop(&self) {
        let _swap = self.swap.write();
        let slot = unsafe { &mut *self.core.get() };
        let Some(core) = slot.take() else {
            return;
        };

        core.running.store(false, Ordering::Release);
        if let Some(queue) = &core.queue {
            // Empty-line sentinel: kicks the worker off its timed wait
            // so shutdown does not ride out a full poll interval.
            let _ = queue.try_push(String::new());
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }

        let mut sinks = core.sinks.lock().unwrap();
        if let Some(mut file) = sinks.file.take() {
            let _ = file.flush();
        }
    }

    /// Submits an already-materialized message.
    pub fn write(&self, level: Level, message: &str, file: &str, func: &str, line: u32) {
        self.write_fmt(level, format_args!("{message}"), file, func, line);
    }

    /// Submits a message built from format arguments. The level filter
    /// runs before the arguments are rendered.
    pub fn write_fmt(
        &self,
        level: Level,
        args: fmt::Arguments<'_>,
        file: &str,
        func: &str,
        line: u32,
    ) {
        let _swap = self.swap.read();
        let Some(core) = (unsafe { &*self.core.get() }).as_ref() else {
            return;
        };
        if !core.running.load(Ordering::Acquire) || level < core.config.min_level {
            return;
        }

        let rendered = render(level, args, file, func, line);
        match &core.queue {
            Some(queue) => {
                if queue.try_push(rendered).is_err() {
                    core.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            None => {
                let mut sinks = core.sinks.lock().unwrap();
                write_line(&core.config, &mut sinks, &rendered);
                flush_file(&mut sinks);
            }
        }
    }

    /// Records rejected by a full async queue since the last `init`.
    pub fn dropped(&self) -> u64 {
        let _swap = self.swap.read();
        (unsafe { &*self.core.get() })
            .as_ref()
            .map_or(0, |core| core.dropped.load(Ordering::Relaxed))
    }

    /// Whether the pipeline is currently running.
    pub fn is_running(&self) -> bool {
        let _swap = self.swap.read();
        (unsafe { &*self.core.get() }).is_some()
    }
}

/// `[YYYY-MM-DD hh:mm:ss] [LEVEL] [basename(file):line func] message\n`
fn render(level: Level, args: fmt::Arguments<'_>, file: &str, func: &str, line: u32) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!(
        "[{timestamp}] [{level}] [{file}:{line} {func}] {args}\n",
        file = basename(file),
    )
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Single consumer of the record queue. Pops in a timed loop so it can
/// notice shutdown, writes each line under the IO mutex, and flushes the
/// file once per drained batch.
fn worker_loop(core: &Core) {
    let queue = core.queue.as_ref().expect("async worker without a queue");
    loop {
        match queue.pop_for(Duration::from_millis(100)) {
            Ok(line) => {
                let mut sinks = core.sinks.lock().unwrap();
                write_line(&core.config, &mut sinks, &line);
                while let Some(line) = queue.try_pop() {
                    write_line(&core.config, &mut sinks, &line);
                }
                flush_file(&mut sinks);
            }
            Err(_) => {
                if !core.running.load(Ordering::Acquire) {
                    // Final drain: everything queued before stop still
                    // reaches the sinks.
                    let mut sinks = core.sinks.lock().unwrap();
                    while let Some(line) = queue.try_pop() {
                        write_line(&core.config, &mut sinks, &line);
                    }
                    flush_file(&mut sinks);
                    return;
                }
            }
        }
    }
}

fn write_line(config: &LogConfig, sinks: &mut Sinks, line: &str) {
    if line.is_empty() {
        // Shutdown sentinel.
        return;
    }
    if config.console {
        print!("{line}");
    }
    if let Some(path) = config.file_path.as_deref() {
        check_rotation(config, path, sinks);
        if let Some(file) = sinks.file.as_mut() {
            match file.write_all(line.as_bytes()) {
                Ok(()) => sinks.file_size += line.len() as u64,
                Err(err) => eprintln!("tarn-log: write to {} failed: {err}", path.display()),
            }
        }
    }
}

fn flush_file(sinks: &mut Sinks) {
    if let Some(file) = sinks.file.as_mut() {
        let _ = file.flush();
    }
}

fn check_rotation(config: &LogConfig, path: &Path, sinks: &mut Sinks) {
    if sinks.file.is_none() {
        return;
    }
    match config.rotation {
        Rotation::None => {}
        Rotation::BySize => {
            if sinks.file_size >= config.max_file_size {
                rotate_by_size(config, path, sinks);
            }
        }
        Rotation::ByDate => {
            let today = Local::now().date_naive();
            if sinks.file_date.is_some_and(|date| date != today) {
                rotate_by_date(path, sinks);
            }
        }
    }
}

/// Shift the numbered backups up (`path.N-1` becomes `path.N`, newest is
/// `path.1`), then reopen a fresh live file.
fn rotate_by_size(config: &LogConfig, path: &Path, sinks: &mut Sinks) {
    sinks.file = None;
    let mut n = config.max_file_count;
    while n >= 2 {
        let _ = fs::rename(numbered(path, n - 1), numbered(path, n));
        n -= 1;
    }
    let _ = fs::rename(path, numbered(path, 1));
    open_file(path, sinks);
}

/// The closed file keeps the date it was written under.
fn rotate_by_date(path: &Path, sinks: &mut Sinks) {
    let date = sinks.file_date.take();
    sinks.file = None;
    if let Some(date) = date {
        let mut renamed = path.as_os_str().to_os_string();
        renamed.push(format!(".{}", date.format("%Y-%m-%d")));
        let _ = fs::rename(path, PathBuf::from(renamed));
    }
    open_file(path, sinks);
}

fn numbered(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Opens (appending) the live log file, creating parent directories. An
/// open failure is reported to stderr and leaves the file sink disabled.
fn open_file(path: &Path, sinks: &mut Sinks) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = fs::create_dir_all(parent);
        }
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            sinks.file_size = file.metadata().map(|m| m.len()).unwrap_or(0);
            sinks.file_date = Some(Local::now().date_naive());
            sinks.file = Some(file);
        }
        Err(err) => {
            eprintln!("tarn-log: cannot open {}: {err}", path.display());
            sinks.file = None;
        }
    }
}
