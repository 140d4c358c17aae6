//! The append-only relay log, one per source network.
//!
//! Every observed packet, airdrop, delivery and error ends up here as one line:
//! `timestamp \t category \t message`. The category is the network the line is about.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// A write-only sink for relay log entries.
pub trait RelayLog: Send + Sync {
    /// Appends one entry. Write failures are reported through `tracing` and otherwise ignored.
    fn append(&self, category: &str, message: &str);
}

/// A relay log backed by `<dir>/<source>.log`.
pub struct FileRelayLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileRelayLog {
    /// Creates the log directory if needed and truncates the log file of `source`.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be created.
    pub fn create(dir: impl AsRef<Path>, source: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;

        let path = dir.join(format!("{source}.log"));
        let file = File::create(&path)
            .with_context(|| format!("failed to create relay log {}", path.display()))?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// The file entries are written to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RelayLog for FileRelayLog {
    fn append(&self, category: &str, message: &str) {
        tracing::info!(network = %category, "{message}");

        let line = format_entry(OffsetDateTime::now_utc(), category, message);
        let Ok(mut writer) = self.writer.lock() else {
            tracing::warn!(path = %self.path.display(), "relay log lock poisoned");
            return;
        };
        if let Err(e) = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.flush())
        {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write relay log");
        }
    }
}

/// An in-memory relay log.
#[derive(Debug, Default)]
pub struct MemoryRelayLog {
    entries: Mutex<Vec<(String, String)>>,
}

impl MemoryRelayLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of `(category, message)` pairs in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Messages containing `needle`.
    #[must_use]
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|(_, message)| message.contains(needle).then_some(message))
            .collect()
    }
}

impl RelayLog for MemoryRelayLog {
    fn append(&self, category: &str, message: &str) {
        tracing::debug!(network = %category, "{message}");
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((category.to_string(), message.to_string()));
        }
    }
}

fn format_entry(at: OffsetDateTime, category: &str, message: &str) -> String {
    let timestamp = at
        .format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!("{timestamp}\t{category}\t{message}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_tab_separated_lines() {
        let at = OffsetDateTime::from_unix_timestamp(0).unwrap();
        assert_eq!(
            format_entry(at, "ethereum", "listening..."),
            "1970-01-01T00:00:00Z\tethereum\tlistening...\n"
        );
    }

    #[test]
    fn file_log_truncates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ethereum.log"), "stale\n").unwrap();

        let log = FileRelayLog::create(dir.path(), "ethereum").unwrap();
        log.append("ethereum", "listening...");
        log.append("arbitrum", "0xabc");

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("\tethereum\tlistening..."));
        assert!(lines[1].ends_with("\tarbitrum\t0xabc"));
    }

    #[test]
    fn file_log_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join(".logs").join("relayers");
        let log = FileRelayLog::create(&nested, "bsc").unwrap();
        assert_eq!(log.path(), nested.join("bsc.log"));
        assert!(log.path().exists());
    }

    #[test]
    fn memory_log_keeps_order() {
        let log = MemoryRelayLog::new();
        log.append("a", "first");
        log.append("b", "second");
        assert_eq!(
            log.entries(),
            vec![
                ("a".to_string(), "first".to_string()),
                ("b".to_string(), "second".to_string())
            ]
        );
        assert_eq!(log.matching("sec"), vec!["second".to_string()]);
    }
}
