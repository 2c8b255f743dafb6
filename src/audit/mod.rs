//! Execution audit trail
//!
//! One write-once record per decision-cycle phase per position. Corrections
//! are new records; nothing is ever updated in place.

mod trail;
mod types;

pub use trail::ExecutionAuditTrail;
pub use types::{
    DecisionOutcome, ExecutionPhaseRecord, ExecutionReport, MarketObservation, Phase, PhaseEntry,
    PhasePayload,
};

use crate::error::ErrorClass;
use crate::storage::StorageError;
use crate::types::PositionId;
use thiserror::Error;

/// Audit trail errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    /// Phase out of cycle order; nothing written
    #[error("Phase sequence error on {position_id}: {phase} rejected ({reason})")]
    PhaseSequence {
        position_id: PositionId,
        phase: Phase,
        reason: String,
    },
    #[error("Payload does not belong to phase {phase}")]
    PayloadMismatch { phase: Phase },
    #[error("Position not found: {0}")]
    PositionNotFound(PositionId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuditError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AuditError::PhaseSequence { .. } => ErrorClass::State,
            AuditError::PayloadMismatch { .. } => ErrorClass::Validation,
            AuditError::PositionNotFound(_) => ErrorClass::NotFound,
            AuditError::Storage(e) => e.class(),
        }
    }
}
