//! In-memory storage backends
//!
//! All three are sharded `DashMap`s, so writers on different keys do not
//! contend on a single lock.

use super::{CalculationRepository, PositionRepository, StorageError, TimeRange, TimeSeriesStore};
use crate::ledger::{RiskCalculationRecord, VerificationMethod};
use crate::position::Position;
use crate::types::{AccountId, PositionId, RecordId};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Time-series rows ordered by `(timestamp, insertion sequence)`
pub struct InMemoryTimeSeries<T> {
    series: DashMap<String, BTreeMap<(DateTime<Utc>, u64), T>>,
    sequence: AtomicU64,
}

impl<T> InMemoryTimeSeries<T> {
    pub fn new() -> Self {
        Self {
            series: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Total number of rows across all keys
    pub fn len(&self) -> usize {
        self.series.iter().map(|s| s.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for InMemoryTimeSeries<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> TimeSeriesStore<T> for InMemoryTimeSeries<T> {
    fn append(&self, key: &str, timestamp: DateTime<Utc>, record: T) -> Result<(), StorageError> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.series
            .entry(key.to_string())
            .or_default()
            .insert((timestamp, seq), record);
        Ok(())
    }

    fn range_scan(&self, key: &str, range: TimeRange) -> Result<Vec<T>, StorageError> {
        let Some(rows) = self.series.get(key) else {
            return Ok(vec![]);
        };
        Ok(rows
            .iter()
            .filter(|((ts, _), _)| range.contains(*ts))
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn latest(&self, key: &str) -> Result<Option<T>, StorageError> {
        Ok(self
            .series
            .get(key)
            .and_then(|rows| rows.values().next_back().cloned()))
    }

    fn keys(&self) -> Vec<String> {
        self.series.iter().map(|s| s.key().clone()).collect()
    }
}

/// Position rows with optimistic versioning
#[derive(Default)]
pub struct InMemoryPositionRepository {
    rows: DashMap<PositionId, Position>,
}

impl InMemoryPositionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionRepository for InMemoryPositionRepository {
    fn insert(&self, mut position: Position) -> Result<Position, StorageError> {
        match self.rows.entry(position.id) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(position.id)),
            Entry::Vacant(slot) => {
                position.version = 0;
                slot.insert(position.clone());
                Ok(position)
            }
        }
    }

    fn get(&self, id: PositionId) -> Result<Option<Position>, StorageError> {
        Ok(self.rows.get(&id).map(|p| p.clone()))
    }

    fn compare_and_swap(&self, mut next: Position, expected_version: u64) -> Result<Position, StorageError> {
        let mut current = self.rows.get_mut(&next.id).ok_or(StorageError::NotFound(next.id))?;

        if current.version != expected_version {
            return Err(StorageError::VersionConflict {
                id: next.id,
                expected: expected_version,
                actual: current.version,
            });
        }
        if !current.same_frozen_inputs(&next) {
            return Err(StorageError::ImmutableViolation(next.id));
        }
        if current.status.is_terminal() && !current.differs_only_in_annotations(&next) {
            return Err(StorageError::ImmutableViolation(next.id));
        }

        next.version = expected_version + 1;
        *current = next.clone();
        Ok(next)
    }

    fn list_by_account(&self, account_id: AccountId) -> Result<Vec<Position>, StorageError> {
        let mut positions: Vec<Position> = self
            .rows
            .iter()
            .filter(|p| p.account_id == account_id)
            .map(|p| p.clone())
            .collect();
        positions.sort_by_key(|p| (p.created_at, p.id));
        Ok(positions)
    }
}

/// Risk calculation records; only the verification fields ever change
#[derive(Default)]
pub struct InMemoryCalculationRepository {
    rows: DashMap<RecordId, RiskCalculationRecord>,
}

impl InMemoryCalculationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored row bypassing every check
    #[cfg(test)]
    pub(crate) fn overwrite(&self, record: RiskCalculationRecord) {
        self.rows.insert(record.id, record);
    }
}

impl CalculationRepository for InMemoryCalculationRepository {
    fn insert(&self, record: RiskCalculationRecord) -> Result<(), StorageError> {
        match self.rows.entry(record.id) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    fn get(&self, id: RecordId) -> Result<Option<RiskCalculationRecord>, StorageError> {
        Ok(self.rows.get(&id).map(|r| r.clone()))
    }

    fn mark_verified(
        &self,
        id: RecordId,
        method: VerificationMethod,
        at: DateTime<Utc>,
    ) -> Result<RiskCalculationRecord, StorageError> {
        let mut record = self.rows.get_mut(&id).ok_or(StorageError::NotFound(id))?;
        if !record.verified {
            record.verified = true;
            record.verification_method = Some(method);
            record.verified_at = Some(at);
        }
        Ok(record.clone())
    }

    fn range(&self, range: TimeRange) -> Result<Vec<RiskCalculationRecord>, StorageError> {
        let mut records: Vec<RiskCalculationRecord> = self
            .rows
            .iter()
            .filter(|r| range.contains(r.created_at))
            .map(|r| r.clone())
            .collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        Ok(records)
    }
}
