//! Backup management for local file backups taken before destructive sync operations.

use crate::{utils, Config, Result};
use anyhow::Context;
use chrono::Local;
use std::path::PathBuf;

/// Prefix for SQLite backup files.
pub const SQLITE: &str = "splitsync.sqlite";

/// Manages backup file creation and rotation.
///
/// The `Backup` struct is immutable and owns copies of the paths and settings it needs.
/// Create a new instance via `Config::backup()` or `Backup::new()`.
#[derive(Debug, Clone)]
pub struct Backup {
    backups_dir: PathBuf,
    backup_copies: u32,
    sqlite_path: PathBuf,
}

impl Backup {
    /// Creates a new `Backup` instance from a `Config`.
    pub fn new(config: &Config) -> Self {
        Self {
            backups_dir: config.backups().to_path_buf(),
            backup_copies: config.backup_copies(),
            sqlite_path: config.sqlite_path().to_path_buf(),
        }
    }

    /// Copies the SQLite database file to the backups directory.
    ///
    /// The filename format is `splitsync.sqlite.YYYY-MM-DD-NNN` where NNN is a sequence
    /// number. Automatically rotates old backups, keeping only `backup_copies` files.
    ///
    /// Returns the path to the created backup file.
    pub async fn copy_sqlite(&self) -> Result<PathBuf> {
        let date = today();
        let seq = self.next_sequence_number(&date).await?;
        let filename = format!("{SQLITE}.{date}-{seq:03}");
        let path = self.backups_dir.join(&filename);

        utils::copy(&self.sqlite_path, &path).await?;

        self.rotate().await?;

        Ok(path)
    }

    /// Scans the backups directory for existing files with today's date and returns the
    /// next sequence number.
    async fn next_sequence_number(&self, date: &str) -> Result<u32> {
        let mut max_seq: u32 = 0;

        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();

            if let Some(seq) = parse_sequence_number(&name, date) {
                max_seq = max_seq.max(seq);
            }
        }

        Ok(max_seq + 1)
    }

    /// Rotates old backup files, keeping only `backup_copies` files.
    async fn rotate(&self) -> Result<()> {
        // Collect all matching backup files
        let mut files: Vec<(PathBuf, String)> = Vec::new();

        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy().to_string();

            if is_backup_file(&name) {
                files.push((entry.path(), name));
            }
        }

        // Sort by filename (which sorts by date and sequence number due to the format)
        files.sort_by(|a, b| a.1.cmp(&b.1));

        // Delete oldest files if we have more than backup_copies
        let to_delete = files.len().saturating_sub(self.backup_copies as usize);
        for (path, _) in files.into_iter().take(to_delete) {
            utils::remove(&path).await?;
        }

        Ok(())
    }
}

/// Returns today's date in YYYY-MM-DD format.
fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Parses the sequence number from a backup filename for the given date.
/// Returns None if the filename doesn't match the expected pattern.
fn parse_sequence_number(filename: &str, date: &str) -> Option<u32> {
    // Pattern: {SQLITE}.{date}-{NNN}
    let expected_start = format!("{SQLITE}.{date}-");
    let rest = filename.strip_prefix(&expected_start)?;
    if rest.len() != 3 {
        return None;
    }
    rest.parse().ok()
}

/// True if the filename looks like one of our backup files.
fn is_backup_file(filename: &str) -> bool {
    // Pattern: {SQLITE}.{YYYY-MM-DD}-{NNN}
    let Some(rest) = filename.strip_prefix(&format!("{SQLITE}.")) else {
        return false;
    };
    let bytes = rest.as_bytes();
    // YYYY-MM-DD-NNN is exactly 14 characters
    if bytes.len() != 14 {
        return false;
    }
    rest.char_indices().all(|(ix, c)| match ix {
        4 | 7 | 10 => c == '-',
        _ => c.is_ascii_digit(),
    })
}
