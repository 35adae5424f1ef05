//! Logger configuration.

use std::fmt;
use std::path::PathBuf;

/// Log severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Fine-grained tracing.
    Trace,
    /// Debugging information.
    Debug,
    /// Normal operation.
    Info,
    /// Something suspicious, execution continues.
    Warn,
    /// An operation failed.
    Error,
    /// The process cannot continue sensibly.
    Fatal,
}

impl Level {
    /// Upper-case tag used in rendered lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the file sink rolls over to a fresh file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// Never rotate.
    #[default]
    None,
    /// Rotate when the file reaches [`LogConfig::max_file_size`];
    /// rotated files get numeric suffixes, newest is `.1`.
    BySize,
    /// Rotate when the calendar date changes; the closed file gets a
    /// `.YYYY-MM-DD` suffix.
    ByDate,
}

/// Logger configuration. Only applied by [`init`](crate::Logger::init);
/// changing configuration requires the logger to be stopped.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Mirror every record to stdout.
    pub console: bool,
    /// File sink path; `None` disables the file sink. Parent directories
    /// are created when the sink opens.
    pub file_path: Option<PathBuf>,
    /// Records below this level are discarded before rendering.
    pub min_level: Level,
    /// File rotation policy.
    pub rotation: Rotation,
    /// Size threshold for [`Rotation::BySize`], in bytes.
    pub max_file_size: u64,
    /// How many rotated files to keep for [`Rotation::BySize`].
    pub max_file_count: usize,
    /// Capacity of the async record queue (rounded up to a power of
    /// two by the ring).
    pub max_queue_size: usize,
    /// Route records through the background worker instead of writing
    /// on the calling thread.
    pub async_mode: bool,
}

impl Default for LogConfig {
    fn default() -> LogConfig {
        LogConfig {
            console: true,
            file_path: None,
            min_level: Level::Debug,
            rotation: Rotation::None,
            max_file_size: 5 * 1024 * 1024,
            max_file_count: 5,
            max_queue_size: 1000,
            async_mode: false,
        }
    }
}
