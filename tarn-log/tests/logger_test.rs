use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tarn_log::{log_debug, log_info, log_warn, logger, Level, LogConfig, LogError, Rotation};
use tempfile::tempdir;

// The logger is process-wide; tests in this binary run in parallel, so
// every test serializes on this lock and leaves the logger stopped.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    logger().stop();
    guard
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn init_twice_requires_stop_between() {
    let _serial = serial();

    logger().init(LogConfig::default()).unwrap();
    assert!(logger().is_running());
    assert!(matches!(
        logger().init(LogConfig::default()),
        Err(LogError::AlreadyRunning)
    ));

    logger().stop();
    logger().stop();
    assert!(!logger().is_running());

    logger().init(LogConfig::default()).unwrap();
    logger().stop();
}

#[test]
fn records_below_min_level_produce_no_output() {
    let _serial = serial();
    let dir = tempdir().unwrap();
    let path = dir.path().join("filter.log");

    logger()
        .init(LogConfig {
            console: false,
            file_path: Some(path.clone()),
            min_level: Level::Info,
            async_mode: false,
            ..LogConfig::default()
        })
        .unwrap();

    log_debug!("must not appear: {}", 13);
    log_info!("kept message {}", 42);
    logger().stop();

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("[INFO]"));
    assert!(lines[0].contains("kept message 42"));
    assert!(!lines[0].contains("must not appear"));
}

#[test]
fn rendered_line_carries_site_and_timestamp() {
    let _serial = serial();
    let dir = tempdir().unwrap();
    let path = dir.path().join("format.log");

    logger()
        .init(LogConfig {
            console: false,
            file_path: Some(path.clone()),
            min_level: Level::Trace,
            async_mode: false,
            ..LogConfig::default()
        })
        .unwrap();

    log_warn!("formatted {} {}", "a", 1);
    logger().stop();

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    // [YYYY-MM-DD hh:mm:ss] [LEVEL] [basename(file):line func] message
    assert!(line.starts_with("[20"), "timestamp missing: {line}");
    assert!(line.contains("] [WARN] ["));
    assert!(line.contains("logger_test.rs:"));
    assert!(line.ends_with("formatted a 1"));
}

#[test]
fn async_mode_drains_on_stop() {
    let _serial = serial();
    let dir = tempdir().unwrap();
    let path = dir.path().join("async.log");

    logger()
        .init(LogConfig {
            console: false,
            file_path: Some(path.clone()),
            min_level: Level::Trace,
            max_queue_size: 1024,
            async_mode: true,
            ..LogConfig::default()
        })
        .unwrap();

    for i in 0..500 {
        log_info!("async line {i}");
    }
    // stop() joins the worker, which drains everything still queued.
    logger().stop();

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 500);
    assert!(lines[0].contains("async line 0"));
    assert!(lines[499].contains("async line 499"));
}

#[test]
fn overflow_drops_are_counted_not_lost_silently() {
    let _serial = serial();
    let dir = tempdir().unwrap();
    let path = dir.path().join("drops.log");

    const TOTAL: u64 = 20_000;

    logger()
        .init(LogConfig {
            console: false,
            file_path: Some(path.clone()),
            min_level: Level::Trace,
            // Tiny queue: bursts overrun the worker and must be counted.
            max_queue_size: 2,
            async_mode: true,
            ..LogConfig::default()
        })
        .unwrap();

    for i in 0..TOTAL {
        log_info!("burst {i}");
    }
    // All producers are done, so the drop counter is final.
    let dropped = logger().dropped();
    logger().stop();

    let written = read_lines(&path).len() as u64;
    assert_eq!(written + dropped, TOTAL);
}

#[test]
fn rotation_by_size_shifts_numbered_backups() {
    let _serial = serial();
    let dir = tempdir().unwrap();
    let path = dir.path().join("rotate.log");

    logger()
        .init(LogConfig {
            console: false,
            file_path: Some(path.clone()),
            min_level: Level::Trace,
            rotation: Rotation::BySize,
            max_file_size: 1024,
            max_file_count: 3,
            async_mode: false,
            ..LogConfig::default()
        })
        .unwrap();

    let backup_1 = dir.path().join("rotate.log.1");
    let backup_2 = dir.path().join("rotate.log.2");
    let backup_3 = dir.path().join("rotate.log.3");

    // Write until exactly two rotations have happened (~3 KiB total).
    let message = "x".repeat(100);
    let mut emitted = 0;
    while !backup_2.exists() {
        log_info!("{message}");
        emitted += 1;
        assert!(emitted < 1_000, "rotation never happened");
    }
    logger().stop();

    assert!(path.exists());
    assert!(backup_1.exists());
    assert!(backup_2.exists());
    assert!(!backup_3.exists());

    // Every closed file crossed the size limit before rotating.
    assert!(fs::metadata(&backup_1).unwrap().len() >= 1024);
    assert!(fs::metadata(&backup_2).unwrap().len() >= 1024);
}

#[test]
fn rotated_file_count_stays_bounded() {
    let _serial = serial();
    let dir = tempdir().unwrap();
    let path = dir.path().join("bounded.log");

    logger()
        .init(LogConfig {
            console: false,
            file_path: Some(path.clone()),
            min_level: Level::Trace,
            rotation: Rotation::BySize,
            max_file_size: 256,
            max_file_count: 2,
            async_mode: false,
            ..LogConfig::default()
        })
        .unwrap();

    let message = "y".repeat(64);
    for _ in 0..200 {
        log_info!("{message}");
    }
    logger().stop();

    // Far more than two rotations happened; only `.1` and `.2` survive.
    assert!(path.exists());
    assert!(dir.path().join("bounded.log.1").exists());
    assert!(dir.path().join("bounded.log.2").exists());
    assert!(!dir.path().join("bounded.log.3").exists());
}

#[test]
fn date_rotation_leaves_same_day_writes_alone() {
    let _serial = serial();
    let dir = tempdir().unwrap();
    let path = dir.path().join("dated.log");

    logger()
        .init(LogConfig {
            console: false,
            file_path: Some(path.clone()),
            min_level: Level::Trace,
            rotation: Rotation::ByDate,
            async_mode: false,
            ..LogConfig::default()
        })
        .unwrap();

    for i in 0..10 {
        log_info!("same day {i}");
    }
    logger().stop();

    // The date cannot change mid-test; everything stays in the live file.
    assert_eq!(read_lines(&path).len(), 10);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn parent_directories_are_created() {
    let _serial = serial();
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/deeper/app.log");

    logger()
        .init(LogConfig {
            console: false,
            file_path: Some(path.clone()),
            min_level: Level::Trace,
            async_mode: false,
            ..LogConfig::default()
        })
        .unwrap();

    log_info!("created on demand");
    logger().stop();

    assert_eq!(read_lines(&path).len(), 1);
}

#[test]
fn write_api_matches_macro_output() {
    let _serial = serial();
    let dir = tempdir().unwrap();
    let path = dir.path().join("api.log");

    logger()
        .init(LogConfig {
            console: false,
            file_path: Some(path.clone()),
            min_level: Level::Trace,
            async_mode: false,
            ..LogConfig::default()
        })
        .unwrap();

    logger().write(Level::Error, "direct call", "src/net/session.rs", "accept", 88);
    logger().stop();

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 1);
    // The path is reduced to its basename.
    assert!(lines[0].contains("[session.rs:88 accept]"));
    assert!(lines[0].contains("[ERROR]"));
    assert!(lines[0].ends_with("direct call"));
}

#[test]
fn stopped_logger_discards_records() {
    let _serial = serial();
    let dir = tempdir().unwrap();
    let path = dir.path().join("stopped.log");

    logger()
        .init(LogConfig {
            console: false,
            file_path: Some(path.clone()),
            min_level: Level::Trace,
            async_mode: false,
            ..LogConfig::default()
        })
        .unwrap();
    log_info!("before stop");
    logger().stop();

    log_info!("after stop");

    assert_eq!(read_lines(&path).len(), 1);
}
