//! Engine facade
//!
//! Wires the calculator, ledger, position store and audit trail over one
//! set of storage backends built from [`Config`].

mod cycle;

pub use cycle::{CycleOutcome, DecisionCycle, TradeRequest};

use crate::account::AccountDirectory;
use crate::audit::{AuditError, ExecutionAuditTrail, ExecutionPhaseRecord};
use crate::config::Config;
use crate::ledger::VerificationLedger;
use crate::pnl::MetricsEngine;
use crate::position::{Position, PositionError, PositionStatus, PositionStore};
use crate::risk::RiskCalculator;
use crate::storage::{InMemoryCalculationRepository, InMemoryPositionRepository, InMemoryTimeSeries};
use crate::types::{AccountId, PositionId};
use std::sync::Arc;

/// All components over shared storage
pub struct RiskEngine {
    config: Config,
    calculator: RiskCalculator,
    ledger: Arc<VerificationLedger>,
    positions: Arc<PositionStore>,
    audit: Arc<ExecutionAuditTrail>,
}

impl RiskEngine {
    /// Engine over in-memory storage
    pub fn in_memory(config: Config, accounts: Arc<dyn AccountDirectory>) -> Self {
        let calculator = RiskCalculator::new(config.risk.clone());
        let position_rows = Arc::new(InMemoryPositionRepository::new());

        let ledger = Arc::new(VerificationLedger::new(
            calculator.clone(),
            Arc::new(InMemoryCalculationRepository::new()),
        ));
        let positions = Arc::new(PositionStore::new(
            calculator.clone(),
            ledger.clone(),
            accounts,
            position_rows.clone(),
            config.store.max_write_retries,
        ));
        let audit = Arc::new(ExecutionAuditTrail::new(
            Arc::new(InMemoryTimeSeries::new()),
            position_rows,
        ));

        tracing::info!(
            min_risk_pct = %config.risk.min_risk_pct,
            max_risk_pct = %config.risk.max_risk_pct,
            max_write_retries = config.store.max_write_retries,
            "Risk engine initialized"
        );

        Self {
            config,
            calculator,
            ledger,
            positions,
            audit,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn calculator(&self) -> &RiskCalculator {
        &self.calculator
    }

    pub fn ledger(&self) -> &Arc<VerificationLedger> {
        &self.ledger
    }

    pub fn positions(&self) -> &Arc<PositionStore> {
        &self.positions
    }

    pub fn audit(&self) -> &Arc<ExecutionAuditTrail> {
        &self.audit
    }

    pub fn metrics(&self) -> &MetricsEngine {
        self.positions.metrics()
    }

    pub fn get_position(&self, position_id: PositionId) -> Result<Position, PositionError> {
        self.positions.get_position(position_id)
    }

    pub fn list_positions(
        &self,
        account_id: AccountId,
        status: Option<PositionStatus>,
    ) -> Result<Vec<Position>, PositionError> {
        self.positions.list_positions(account_id, status)
    }

    pub fn get_audit_trail(&self, position_id: PositionId) -> Result<Vec<ExecutionPhaseRecord>, AuditError> {
        self.audit.get_audit_trail(position_id)
    }
}
