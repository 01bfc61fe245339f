//! Append-only sync log
//!
//! One header block per pass, then one line per applied operation. The file is
//! opened in append mode and every line is flushed as soon as it is written, so
//! a crash mid-pass leaves a log that describes exactly what was done.

use chrono::{DateTime, Local};
use mirrorsync_types::{Error, LogEntry, Result, LOG_TIMESTAMP_FORMAT};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Banner opening each pass's header
pub const SYNC_BANNER: &str =
    "------------------------------ SYNC ------------------------------";

/// Rule closing each pass's header
pub const SYNC_RULE: &str =
    "------------------------------------------------------------------";

/// Render the header block written at the start of every pass
pub fn format_header(source: &Path, replica: &Path, timestamp: DateTime<Local>) -> String {
    format!(
        "\n{}\n{}\n      SOURCE: {}\n DESTINATION: {}\n{}\n",
        timestamp.format(LOG_TIMESTAMP_FORMAT),
        SYNC_BANNER,
        source.display(),
        replica.display(),
        SYNC_RULE
    )
}

/// Handle on the sync log for the duration of one pass
#[derive(Debug)]
pub struct SyncJournal {
    path: PathBuf,
    writer: BufWriter<File>,
    entries: u64,
}

impl SyncJournal {
    /// Open `path` for appending, creating it if needed
    ///
    /// The parent directory must already exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| Error::log_open(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            entries: 0,
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of operation lines written through this handle
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Write the pass header
    ///
    /// A failure here is reported as [`Error::LogOpen`]: nothing has been
    /// mutated yet and the pass must not go on without a log.
    pub fn write_header(
        &mut self,
        source: &Path,
        replica: &Path,
        timestamp: DateTime<Local>,
    ) -> Result<()> {
        let header = format_header(source, replica, timestamp);
        self.writer
            .write_all(header.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|e| Error::log_open(&self.path, e))
    }

    /// Append one operation line
    pub fn record(&mut self, entry: &LogEntry) -> Result<()> {
        writeln!(self.writer, "{}", entry)
            .and_then(|()| self.writer.flush())
            .map_err(|e| Error::journal(format!("{}: {}", self.path.display(), e)))?;
        self.entries += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mirrorsync_types::{OperationKind, RelativePath};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_header_layout() {
        let timestamp = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let header = format_header(Path::new("/src"), Path::new("/dst"), timestamp);

        let lines: Vec<&str> = header.split('\n').collect();
        assert_eq!(
            lines,
            vec![
                "",
                "2024-Mar-05 14:07:09",
                SYNC_BANNER,
                "      SOURCE: /src",
                " DESTINATION: /dst",
                SYNC_RULE,
                "",
            ]
        );
        assert_eq!(SYNC_BANNER.len(), 66);
        assert_eq!(SYNC_RULE.len(), 66);
    }

    #[test]
    fn test_appends_across_handles() {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("sync.log");
        fs::write(&log, "previous run\n").unwrap();

        let entry = LogEntry::now(
            OperationKind::Delete,
            RelativePath::new("old.txt").unwrap(),
            temp_dir.path().join("replica").join("old.txt"),
        );

        for _ in 0..2 {
            let mut journal = SyncJournal::open(&log).unwrap();
            journal
                .write_header(Path::new("/src"), Path::new("/dst"), Local::now())
                .unwrap();
            journal.record(&entry).unwrap();
            assert_eq!(journal.entries(), 1);
        }

        let contents = fs::read_to_string(&log).unwrap();
        assert!(contents.starts_with("previous run\n\n"));
        assert_eq!(contents.matches(SYNC_BANNER).count(), 2);
        assert_eq!(contents.matches(" - deleted ").count(), 2);
    }

    #[test]
    fn test_lines_visible_before_drop() {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("sync.log");

        let mut journal = SyncJournal::open(&log).unwrap();
        journal
            .write_header(Path::new("/src"), Path::new("/dst"), Local::now())
            .unwrap();

        let contents = fs::read_to_string(&log).unwrap();
        assert!(contents.contains(" DESTINATION: /dst\n"));
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("missing").join("sync.log");

        let error = SyncJournal::open(&log).unwrap_err();
        assert!(matches!(error, Error::LogOpen { .. }));
        assert!(error.is_fatal());
    }
}
