//! Storage abstractions
//!
//! Time-series facts are append-only rows keyed by `(entity key, timestamp)`
//! and read back with range scans. Mutable entities (positions, the
//! `verified` flag of calculation records) are written through
//! compare-and-swap so concurrent writers never overwrite each other.

mod memory;

pub use memory::{InMemoryCalculationRepository, InMemoryPositionRepository, InMemoryTimeSeries};

use crate::error::ErrorClass;
use crate::ledger::{RiskCalculationRecord, VerificationMethod};
use crate::position::Position;
use crate::types::{AccountId, PositionId, RecordId};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Row changed since it was read
    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    VersionConflict { id: Uuid, expected: u64, actual: u64 },
    #[error("Not found: {0}")]
    NotFound(Uuid),
    #[error("Already exists: {0}")]
    AlreadyExists(Uuid),
    /// Attempt to rewrite a write-once field
    #[error("Immutable field rewrite rejected on {0}")]
    ImmutableViolation(Uuid),
}

impl StorageError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StorageError::VersionConflict { .. } => ErrorClass::Concurrency,
            StorageError::NotFound(_) => ErrorClass::NotFound,
            StorageError::AlreadyExists(_) => ErrorClass::Validation,
            StorageError::ImmutableViolation(_) => ErrorClass::Integrity,
        }
    }
}

/// Half-open time range `[from, to)`; `None` means unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn before(to: DateTime<Utc>) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| ts >= from) && self.to.map_or(true, |to| ts < to)
    }
}

/// Append-only time-series storage
pub trait TimeSeriesStore<T>: Send + Sync {
    /// Append a record; rows with equal timestamps keep insertion order
    fn append(&self, key: &str, timestamp: DateTime<Utc>, record: T) -> Result<(), StorageError>;
    /// Records for `key` inside `range`, oldest first
    fn range_scan(&self, key: &str, range: TimeRange) -> Result<Vec<T>, StorageError>;
    /// Most recent record for `key`
    fn latest(&self, key: &str) -> Result<Option<T>, StorageError> {
        Ok(self.range_scan(key, TimeRange::all())?.pop())
    }
    /// All keys with at least one record
    fn keys(&self) -> Vec<String>;
}

/// Versioned position storage
pub trait PositionRepository: Send + Sync {
    /// Store a new position at version 0
    fn insert(&self, position: Position) -> Result<Position, StorageError>;
    fn get(&self, id: PositionId) -> Result<Option<Position>, StorageError>;
    /// Replace the stored row if its version still equals `expected_version`.
    /// The saved row carries `expected_version + 1`.
    fn compare_and_swap(&self, next: Position, expected_version: u64) -> Result<Position, StorageError>;
    /// Positions of an account ordered by creation time
    fn list_by_account(&self, account_id: AccountId) -> Result<Vec<Position>, StorageError>;
}

/// Write-once risk calculation storage
pub trait CalculationRepository: Send + Sync {
    fn insert(&self, record: RiskCalculationRecord) -> Result<(), StorageError>;
    fn get(&self, id: RecordId) -> Result<Option<RiskCalculationRecord>, StorageError>;
    /// Set `verified` from false to true; a record already verified is returned unchanged
    fn mark_verified(
        &self,
        id: RecordId,
        method: VerificationMethod,
        at: DateTime<Utc>,
    ) -> Result<RiskCalculationRecord, StorageError>;
    /// Records created inside `range`, oldest first
    fn range(&self, range: TimeRange) -> Result<Vec<RiskCalculationRecord>, StorageError>;
}
