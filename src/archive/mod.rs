//! Historical archive
//!
//! Copies audit and ledger facts older than a cut-off into Parquet files.
//! Archived partitions are write-once: every run writes new time-stamped
//! files and never rewrites an existing one.

mod parquet;

pub use self::parquet::{calculation_schema, phase_schema, ArchiveReader, ParquetArchiver};

use std::path::PathBuf;

/// What one archive run wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub phase_records: usize,
    pub calculation_records: usize,
    pub files: Vec<PathBuf>,
}
