use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;
use tracing::warn;

/// Append-only `timestamp | step | subject | status` log.
///
/// A disabled log swallows every entry, so stages can record
/// unconditionally. The parent directory is created on first write.
#[derive(Debug)]
pub struct ProcessingLog {
    path: Option<PathBuf>,
    lock: Mutex<()>,
}

impl ProcessingLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            lock: Mutex::new(()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            lock: Mutex::new(()),
        }
    }

    pub fn record(&self, step: &str, subject: &str, status: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("{} | {} | {} | {}\n", timestamp, step, subject, status);
        let result = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(path))
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(err) = result {
            warn!(path = %path.display(), error = %err, "processing log write failed");
        }
    }
}
