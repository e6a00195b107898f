//! Session logger: backs the `log` facade with a single file in the OS data directory.
//!
//! The file is **truncated at each launch**, so it only ever holds output from
//! the most recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\Retouch\retouch.log`
//!   Linux:    `~/.local/share/Retouch/retouch.log`
//!   macOS:    `~/Library/Application Support/Retouch/retouch.log`
//!
//! Library code only uses `log::info!` and friends; the binary calls
//! [`init`] once to route those records here.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{Level, LevelFilter, Log, Metadata, Record};

pub const APP_DIR_NAME: &str = "Retouch";

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOGGER: SessionLogger = SessionLogger;

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Write a line to the session log. I/O errors are ignored so that logging
/// never takes the process down.
pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// `[HH:MM:SS] [LEVEL] message`
pub fn format_line(level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", timestamp(), level, msg)
}

struct SessionLogger;

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), &record.args().to_string());
        if record.level() <= Level::Warn {
            eprintln!("{}", line);
        }
        write_line(&line);
    }

    fn flush(&self) {
        if let Some(mutex) = LOG_FILE.get()
            && let Ok(mut file) = mutex.lock()
        {
            let _ = file.flush();
        }
    }
}

/// Initialise the session logger. Call once, before any logging.
///
/// * Creates (or truncates) the log file.
/// * Installs the file backend as the global `log` logger at `level`.
/// * Installs a panic hook that mirrors the panic into the log before
///   handing over to the default handler.
///
/// A log file that cannot be opened is not fatal; records still reach stderr
/// for warnings and errors.
pub fn init(level: LevelFilter) {
    let path = log_file_path();

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(f) => {
            let _ = LOG_PATH.set(path.clone());
            let _ = LOG_FILE.set(Mutex::new(f));
        }
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
        }
    }

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }

    write_line(&format!("=== Retouch session started {} ===", human_timestamp()));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
}

/// Parse a level name from settings or the command line, defaulting to `Info`.
pub fn parse_level(name: &str) -> LevelFilter {
    name.trim().parse().unwrap_or(LevelFilter::Info)
}

fn log_file_path() -> PathBuf {
    app_data_dir().join("retouch.log")
}

/// `<platform data dir>/Retouch`, shared with the settings file.
pub fn app_data_dir() -> PathBuf {
    data_dir().join(APP_DIR_NAME)
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// HH:MM:SS within the current UTC day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            let h = (secs % 86400) / 3600;
            let m = (secs % 3600) / 60;
            let s = secs % 60;
            format!("{:02}:{:02}:{:02}", h, m, s)
        }
        Err(_) => "??:??:??".to_string(),
    }
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format() {
        let line = format_line(Level::Warn, "crop failed");
        assert!(line.ends_with("] [WARN] crop failed"));
        assert_eq!(line.as_bytes()[0], b'[');
        assert_eq!(&line[9..10], "]");
    }

    #[test]
    fn level_parsing_falls_back_to_info() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN "), LevelFilter::Warn);
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
    }

    #[test]
    fn data_dir_ends_with_app_folder() {
        assert!(app_data_dir().ends_with(APP_DIR_NAME));
    }
}
