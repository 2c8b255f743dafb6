//! Verification ledger
//!
//! Every sizing calculation is persisted with a SHA-256 over its inputs and
//! output. `verify` recomputes the calculation and flips `verified` once;
//! a mismatch is an integrity alert and never touches the record.

mod hash;

pub use hash::{calculation_hash, canonical_payload, HashInput};

use crate::error::ErrorClass;
use crate::risk::{PositionSize, RiskCalculator, RiskError};
use crate::storage::{CalculationRepository, StorageError, TimeRange};
use crate::telemetry;
use crate::types::{RecordId, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// How a record was verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    /// Recomputed by this engine
    Recompute,
    /// Checked by a person
    Manual,
    /// Checked by an outside auditor or service
    External,
}

/// One persisted sizing calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskCalculationRecord {
    pub id: RecordId,
    pub side: Side,
    pub equity: Decimal,
    pub risk_pct: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub risk_amount: Decimal,
    pub per_unit_risk: Decimal,
    pub position_size: Decimal,
    pub elapsed_ms: u64,
    pub hash: String,
    pub verified: bool,
    pub verification_method: Option<VerificationMethod>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RiskCalculationRecord {
    fn hash_input(&self, position_size: Decimal) -> HashInput {
        HashInput {
            equity: self.equity,
            risk_pct: self.risk_pct,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            position_size,
        }
    }
}

/// Ledger errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Calculation record not found: {0}")]
    NotFound(RecordId),
    /// Stored hash or size disagrees with the recomputation
    #[error("Verification mismatch on {id}: stored {stored_hash}, recomputed {recomputed_hash}")]
    VerificationMismatch {
        id: RecordId,
        stored_hash: String,
        recomputed_hash: String,
    },
    /// Stored inputs no longer pass the calculator
    #[error("Recalculation of {id} failed: {source}")]
    Recalculation { id: RecordId, source: RiskError },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LedgerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::NotFound(_) => ErrorClass::NotFound,
            LedgerError::VerificationMismatch { .. } | LedgerError::Recalculation { .. } => {
                ErrorClass::Integrity
            }
            LedgerError::Storage(e) => e.class(),
        }
    }
}

/// Persists and verifies sizing calculations
pub struct VerificationLedger {
    calculator: RiskCalculator,
    records: Arc<dyn CalculationRepository>,
}

impl VerificationLedger {
    pub fn new(calculator: RiskCalculator, records: Arc<dyn CalculationRepository>) -> Self {
        Self { calculator, records }
    }

    /// Persist a calculation, unverified
    pub fn record(&self, calc: &PositionSize, elapsed_ms: u64) -> Result<RiskCalculationRecord, LedgerError> {
        let hash = calculation_hash(&HashInput {
            equity: calc.equity,
            risk_pct: calc.risk_pct,
            entry_price: calc.entry_price,
            stop_loss: calc.stop_loss,
            position_size: calc.position_size,
        });

        let record = RiskCalculationRecord {
            id: Uuid::new_v4(),
            side: calc.side,
            equity: calc.equity,
            risk_pct: calc.risk_pct,
            entry_price: calc.entry_price,
            stop_loss: calc.stop_loss,
            risk_amount: calc.risk_amount,
            per_unit_risk: calc.per_unit_risk,
            position_size: calc.position_size,
            elapsed_ms,
            hash,
            verified: false,
            verification_method: None,
            verified_at: None,
            created_at: Utc::now(),
        };

        self.records.insert(record.clone())?;
        telemetry::record_calculation(elapsed_ms);
        tracing::debug!(record_id = %record.id, hash = %record.hash, "Recorded risk calculation");
        Ok(record)
    }

    /// Recompute a stored calculation and mark it verified on match
    pub fn verify(&self, record_id: RecordId, method: VerificationMethod) -> Result<RiskCalculationRecord, LedgerError> {
        let record = self.get(record_id)?;
        if record.verified {
            return Ok(record);
        }

        let recomputed = self
            .calculator
            .compute(record.equity, record.risk_pct, record.entry_price, record.stop_loss, record.side)
            .map_err(|source| {
                telemetry::record_verification(false);
                tracing::error!(
                    alert = "integrity",
                    record_id = %record_id,
                    error = %source,
                    "Stored risk calculation no longer recomputes"
                );
                LedgerError::Recalculation { id: record_id, source }
            })?;

        let recomputed_hash = calculation_hash(&record.hash_input(recomputed.position_size));
        let stored_fields_hash = calculation_hash(&record.hash_input(record.position_size));

        if recomputed_hash != record.hash || stored_fields_hash != record.hash {
            telemetry::record_verification(false);
            tracing::error!(
                alert = "integrity",
                record_id = %record_id,
                stored = %record.hash,
                recomputed = %recomputed_hash,
                "Risk calculation verification mismatch"
            );
            return Err(LedgerError::VerificationMismatch {
                id: record_id,
                stored_hash: record.hash,
                recomputed_hash,
            });
        }

        let verified = self.records.mark_verified(record_id, method, Utc::now())?;
        telemetry::record_verification(true);
        tracing::info!(record_id = %record_id, method = ?method, "Risk calculation verified");
        Ok(verified)
    }

    pub fn get(&self, record_id: RecordId) -> Result<RiskCalculationRecord, LedgerError> {
        self.records
            .get(record_id)?
            .ok_or(LedgerError::NotFound(record_id))
    }

    /// Records created inside `range`
    pub fn range(&self, range: TimeRange) -> Result<Vec<RiskCalculationRecord>, LedgerError> {
        Ok(self.records.range(range)?)
    }

    pub fn list_unverified(&self) -> Result<Vec<RiskCalculationRecord>, LedgerError> {
        Ok(self
            .range(TimeRange::all())?
            .into_iter()
            .filter(|r| !r.verified)
            .collect())
    }
}
