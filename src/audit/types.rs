//! Audit trail types

use crate::types::PositionId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Decision cycle phase (OODA)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Observe,
    Orient,
    Decide,
    Act,
}

impl Phase {
    /// Phase that must directly precede this one in a cycle
    pub fn predecessor(&self) -> Option<Phase> {
        match self {
            Phase::Observe => None,
            Phase::Orient => Some(Phase::Observe),
            Phase::Decide => Some(Phase::Orient),
            Phase::Act => Some(Phase::Decide),
        }
    }

    pub fn successor(&self) -> Option<Phase> {
        match self {
            Phase::Observe => Some(Phase::Orient),
            Phase::Orient => Some(Phase::Decide),
            Phase::Decide => Some(Phase::Act),
            Phase::Act => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Observe => "OBSERVE",
            Phase::Orient => "ORIENT",
            Phase::Decide => "DECIDE",
            Phase::Act => "ACT",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market state seen during OBSERVE/ORIENT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketObservation {
    pub price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub spread: Decimal,
    /// Age of the snapshot when observed
    pub staleness_ms: i64,
}

/// Outcome of DECIDE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub calculated_size: Option<Decimal>,
    /// Trading protocol rules broken by this decision
    pub violations: Vec<String>,
}

/// Exchange result of ACT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub exchange_order_id: Option<String>,
    pub response: Option<String>,
    pub fill_price: Option<Decimal>,
    pub quantity: Option<Decimal>,
}

/// Phase-specific payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhasePayload {
    Market(MarketObservation),
    Decision(DecisionOutcome),
    Execution(ExecutionReport),
}

impl PhasePayload {
    /// Whether this payload belongs to `phase`
    pub fn fits(&self, phase: Phase) -> bool {
        matches!(
            (self, phase),
            (PhasePayload::Market(_), Phase::Observe | Phase::Orient)
                | (PhasePayload::Decision(_), Phase::Decide)
                | (PhasePayload::Execution(_), Phase::Act)
        )
    }
}

/// A phase to append
#[derive(Debug, Clone)]
pub struct PhaseEntry {
    pub phase: Phase,
    pub start_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub payload: PhasePayload,
}

/// One immutable audit row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPhaseRecord {
    pub id: Uuid,
    pub position_id: PositionId,
    /// 1-based decision cycle number within the position
    pub cycle: u32,
    pub phase: Phase,
    pub start_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub payload: PhasePayload,
    pub recorded_at: DateTime<Utc>,
}
