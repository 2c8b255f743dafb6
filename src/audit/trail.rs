//! Append-only per-position phase log

use super::{AuditError, ExecutionPhaseRecord, Phase, PhaseEntry};
use crate::storage::{PositionRepository, TimeRange, TimeSeriesStore};
use crate::telemetry;
use crate::types::PositionId;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Records decision-cycle phases for positions
pub struct ExecutionAuditTrail {
    records: Arc<dyn TimeSeriesStore<ExecutionPhaseRecord>>,
    positions: Arc<dyn PositionRepository>,
    locks: DashMap<PositionId, Arc<Mutex<()>>>,
}

impl ExecutionAuditTrail {
    pub fn new(
        records: Arc<dyn TimeSeriesStore<ExecutionPhaseRecord>>,
        positions: Arc<dyn PositionRepository>,
    ) -> Self {
        Self {
            records,
            positions,
            locks: DashMap::new(),
        }
    }

    /// Append one phase record after checking cycle order
    pub fn append_phase(
        &self,
        position_id: PositionId,
        entry: PhaseEntry,
    ) -> Result<ExecutionPhaseRecord, AuditError> {
        if !entry.payload.fits(entry.phase) {
            return Err(AuditError::PayloadMismatch { phase: entry.phase });
        }
        if self.positions.get(position_id)?.is_none() {
            return Err(AuditError::PositionNotFound(position_id));
        }

        let lock = self
            .locks
            .entry(position_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.append_locked(position_id, entry)
        };
        // Released after the guard; a writer still holding a clone keeps it alive
        self.locks
            .remove_if(&position_id, |_, held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
        result
    }

    fn append_locked(
        &self,
        position_id: PositionId,
        entry: PhaseEntry,
    ) -> Result<ExecutionPhaseRecord, AuditError> {
        let key = position_id.to_string();
        let last = self.records.latest(&key)?;
        let cycle = match next_cycle(last.as_ref(), &entry) {
            Ok(cycle) => cycle,
            Err(reason) => {
                telemetry::record_phase_rejected(entry.phase);
                tracing::warn!(%position_id, phase = %entry.phase, %reason, "Phase rejected");
                return Err(AuditError::PhaseSequence {
                    position_id,
                    phase: entry.phase,
                    reason,
                });
            }
        };

        let record = ExecutionPhaseRecord {
            id: Uuid::new_v4(),
            position_id,
            cycle,
            phase: entry.phase,
            start_time: entry.start_time,
            duration_ms: entry.duration_ms,
            success: entry.success,
            payload: entry.payload,
            recorded_at: Utc::now(),
        };
        self.records.append(&key, record.start_time, record.clone())?;

        tracing::debug!(
            %position_id,
            cycle,
            phase = %record.phase,
            success = record.success,
            "Phase recorded"
        );
        Ok(record)
    }

    /// Full trail of a position, ordered by start time
    pub fn get_audit_trail(&self, position_id: PositionId) -> Result<Vec<ExecutionPhaseRecord>, AuditError> {
        self.range(position_id, TimeRange::all())
    }

    pub fn range(
        &self,
        position_id: PositionId,
        range: TimeRange,
    ) -> Result<Vec<ExecutionPhaseRecord>, AuditError> {
        Ok(self.records.range_scan(&position_id.to_string(), range)?)
    }

    /// Records of every position inside `range`
    pub fn scan_all(&self, range: TimeRange) -> Result<Vec<ExecutionPhaseRecord>, AuditError> {
        let mut all = vec![];
        for key in self.records.keys() {
            all.extend(self.records.range_scan(&key, range)?);
        }
        all.sort_by_key(|r| (r.start_time, r.recorded_at));
        Ok(all)
    }
}

/// Cycle number for `entry`, or why it is out of order.
///
/// OBSERVE always opens a new cycle. Every other phase must directly follow
/// its predecessor, and that predecessor must have succeeded.
fn next_cycle(last: Option<&ExecutionPhaseRecord>, entry: &PhaseEntry) -> Result<u32, String> {
    if let Some(last) = last {
        if entry.start_time < last.start_time {
            return Err(format!(
                "start {} precedes last recorded start {}",
                entry.start_time, last.start_time
            ));
        }
    }

    match (entry.phase.predecessor(), last) {
        (None, last) => Ok(last.map_or(1, |l| l.cycle + 1)),
        (Some(required), Some(last)) if last.phase == required && last.success => Ok(last.cycle),
        (Some(required), Some(last)) if last.phase == required => {
            Err(format!("{required} failed in cycle {}; start a new cycle with OBSERVE", last.cycle))
        }
        (Some(required), Some(last)) => Err(format!(
            "{} must follow {required}, last phase was {}",
            entry.phase, last.phase
        )),
        (Some(required), None) => Err(format!("{} must follow {required}; no cycle started", entry.phase)),
    }
}
