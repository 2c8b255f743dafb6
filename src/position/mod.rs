//! Position module
//!
//! The position entity, its state machine, and the store that owns its
//! lifecycle.

mod model;
mod store;

pub use model::{Annotation, Position, PositionStatus};
pub use store::{NewPosition, PositionStore};

use crate::account::AccountError;
use crate::error::ErrorClass;
use crate::ledger::LedgerError;
use crate::risk::RiskError;
use crate::storage::StorageError;
use crate::types::PositionId;
use thiserror::Error;

/// Position lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error(transparent)]
    Risk(#[from] RiskError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Operation not allowed from the current state
    #[error("Invalid transition: cannot {operation} position {id} in state {from}")]
    InvalidTransition {
        id: PositionId,
        from: PositionStatus,
        operation: &'static str,
    },
    #[error("Position not found: {0}")]
    NotFound(PositionId),
    /// Optimistic-lock retries exhausted
    #[error("Write conflict on position {id} after {attempts} attempts")]
    Conflict { id: PositionId, attempts: u32 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PositionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PositionError::Risk(e) => e.class(),
            PositionError::Account(e) => e.class(),
            PositionError::Ledger(e) => e.class(),
            PositionError::InvalidTransition { .. } => ErrorClass::State,
            PositionError::NotFound(_) => ErrorClass::NotFound,
            PositionError::Conflict { .. } => ErrorClass::Concurrency,
            PositionError::Storage(e) => e.class(),
        }
    }
}
