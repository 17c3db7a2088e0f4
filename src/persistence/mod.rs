pub mod summary;

pub use summary::LedgerSummary;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::models::TradeRecord;
use crate::Result;

/// Canonical (lowercase) column order of the ledger file
pub const LEDGER_COLUMNS: [&str; 8] = [
    "timestamp",
    "signal",
    "price",
    "stop_loss",
    "take_profit",
    "outcome",
    "result",
    "pnl",
];

/// Append-only CSV trade ledger with a shadow backup copy
///
/// Protocol:
/// - on open, a missing primary is restored from the backup before anything else
/// - after every append, the primary is copied over the backup
pub struct TradeLedger {
    path: PathBuf,
    backup_path: PathBuf,
}

impl TradeLedger {
    /// Open the ledger, promoting the backup if the primary is gone
    pub fn open(path: impl Into<PathBuf>, backup_path: impl Into<PathBuf>) -> Result<Self> {
        let ledger = Self {
            path: path.into(),
            backup_path: backup_path.into(),
        };
        ledger.restore_if_missing()?;
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Move the backup into place when the primary does not exist
    ///
    /// Returns true if a restore happened.
    pub fn restore_if_missing(&self) -> Result<bool> {
        if self.path.exists() || !self.backup_path.exists() {
            return Ok(false);
        }

        tracing::warn!(
            primary = %self.path.display(),
            backup = %self.backup_path.display(),
            "🔁 Restoring trade ledger from backup"
        );
        fs::rename(&self.backup_path, &self.path)?;
        Ok(true)
    }

    /// Copy the primary over the backup (no-op if there is no primary yet)
    pub fn backup(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::copy(&self.path, &self.backup_path)?;
        tracing::debug!(backup = %self.backup_path.display(), "Ledger backed up");
        Ok(())
    }

    /// Append one trade, then refresh the backup
    pub fn append(&self, record: &TradeRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(LEDGER_COLUMNS)?;
        }
        writer.serialize(record)?;
        writer.flush()?;

        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(e.error().kind(), e.error().to_string()))?;
        file.sync_all()?;

        tracing::info!(
            signal = %record.signal,
            price = record.entry_price,
            "Trade appended to ledger"
        );

        self.backup()
    }

    /// Read every row; header names are matched case-insensitively
    pub fn read_all(&self) -> Result<Vec<TradeRecord>> {
        read_records(&self.path)
    }
}

/// Read ledger rows from any CSV with the ledger columns
///
/// Headers are trimmed and lowercased before matching, so files written with
/// capitalized column names parse the same way. A missing file is an empty ledger.
pub fn read_records(path: &Path) -> Result<Vec<TradeRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let normalized: StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    reader.set_headers(normalized);

    let mut records = Vec::new();
    for row in reader.deserialize::<TradeRecord>() {
        records.push(row?);
    }
    Ok(records)
}
