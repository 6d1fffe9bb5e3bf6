//! # Run Log Module
//!
//! Sink dei record di log per una singola esecuzione.
//!
//! ## Responsabilità:
//! - Riceve record `{timestamp, livello, messaggio}` con livelli INFO/OK/SKIP/WARN/ERR
//! - Li accoda a un file di testo (append-only, best effort)
//! - Li rispecchia su `tracing` per la console
//!
//! Un errore di scrittura disabilita il file con un solo warning e non
//! interrompe mai l'esecuzione. Il handle viene creato all'inizio del run e
//! chiuso (flush) alla fine: nessuno stato globale.
//!
//! ## Formato:
//! ```text
//! [2024-05-01 12:00:03] [OK] 2023/IMG_0001.jpeg (912.40 KB, scale 80%)
//! [2024-05-01 12:00:03] [SKIP] 2024/IMG_0001.JPG duplicate of 2023/IMG_0001.JPG
//! ```

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Ok,
    Skip,
    Warn,
    Err,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Ok => "OK",
            Self::Skip => "SKIP",
            Self::Warn => "WARN",
            Self::Err => "ERR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Append-only log handle scoped to one run
pub struct RunLog {
    path: Option<PathBuf>,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl RunLog {
    /// Open (or create) the log file. A failure leaves a console-only log.
    pub fn open(path: &Path) -> Self {
        let writer = match Self::open_writer(path) {
            Ok(writer) => Some(writer),
            Err(e) => {
                warn!("Log file {} unavailable, logging to console only: {}", path.display(), e);
                None
            }
        };

        Self {
            path: Some(path.to_path_buf()),
            writer: Mutex::new(writer),
        }
    }

    /// Console-only log
    pub fn console_only() -> Self {
        Self {
            path: None,
            writer: Mutex::new(None),
        }
    }

    fn open_writer(path: &Path) -> std::io::Result<BufWriter<File>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, level: LogLevel, message: impl Into<String>) {
        let record = LogRecord {
            timestamp: Local::now(),
            level,
            message: message.into(),
        };

        match level {
            LogLevel::Info | LogLevel::Ok | LogLevel::Skip => {
                info!("[{}] {}", level, record.message)
            }
            LogLevel::Warn => warn!("{}", record.message),
            LogLevel::Err => error!("{}", record.message),
        }

        let Ok(mut guard) = self.writer.lock() else {
            return;
        };
        let failure = match guard.as_mut() {
            Some(writer) => writeln!(writer, "{}", record).err(),
            None => None,
        };
        if let Some(e) = failure {
            warn!("Disabling log file after write failure: {}", e);
            *guard = None;
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message);
    }

    pub fn ok(&self, message: impl Into<String>) {
        self.record(LogLevel::Ok, message);
    }

    pub fn skip(&self, message: impl Into<String>) {
        self.record(LogLevel::Skip, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(LogLevel::Warn, message);
    }

    pub fn err(&self, message: impl Into<String>) {
        self.record(LogLevel::Err, message);
    }

    pub fn flush(&self) {
        if let Ok(mut guard) = self.writer.lock() {
            if let Some(writer) = guard.as_mut() {
                let _ = writer.flush();
            }
        }
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_records_are_appended_with_level_tags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/run.log");

        let log = RunLog::open(&path);
        log.info("starting");
        log.skip("a/b.jpg duplicate of c/b.jpg");
        log.err("conversion failed");
        log.flush();
        drop(log);

        let log = RunLog::open(&path);
        log.ok("second run");
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("[INFO] starting"));
        assert!(lines[1].contains("[SKIP] a/b.jpg duplicate of c/b.jpg"));
        assert!(lines[2].contains("[ERR] conversion failed"));
        assert!(lines[3].contains("[OK] second run"));
        assert!(lines[0].starts_with('['));
    }

    #[test]
    fn test_unwritable_log_degrades_to_console() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        // A regular file cannot be a parent directory.
        let log = RunLog::open(&blocker.join("run.log"));
        log.warn("still fine");
        assert!(log.path().is_some());
    }

    #[test]
    fn test_level_names() {
        assert_eq!(LogLevel::Ok.to_string(), "OK");
        assert_eq!(LogLevel::Warn.as_str(), "WARN");
        assert_eq!(LogLevel::Err.as_str(), "ERR");
    }
}
