//! Prometheus metrics
//!
//! Recording is a no-op until an exporter is installed.

use crate::audit::Phase;
use crate::position::PositionStatus;
use metrics::{counter, histogram};

pub const CALCULATIONS_TOTAL: &str = "risk_ledger_calculations_total";
pub const CALCULATION_LATENCY_MS: &str = "risk_ledger_calculation_latency_ms";
pub const VERIFICATIONS_TOTAL: &str = "risk_ledger_verifications_total";
pub const TRANSITIONS_TOTAL: &str = "risk_ledger_position_transitions_total";
pub const WRITE_CONFLICTS_TOTAL: &str = "risk_ledger_write_conflicts_total";
pub const PHASES_REJECTED_TOTAL: &str = "risk_ledger_phases_rejected_total";

/// A sizing calculation was recorded in the ledger
pub fn record_calculation(elapsed_ms: u64) {
    counter!(CALCULATIONS_TOTAL).increment(1);
    histogram!(CALCULATION_LATENCY_MS).record(elapsed_ms as f64);
}

pub fn record_verification(matched: bool) {
    let outcome = if matched { "match" } else { "mismatch" };
    counter!(VERIFICATIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_transition(from: Option<PositionStatus>, to: PositionStatus) {
    let from = from.map_or("NONE", |s| s.as_str());
    counter!(TRANSITIONS_TOTAL, "from" => from, "to" => to.as_str()).increment(1);
}

/// Optimistic-lock retries exhausted
pub fn record_conflict(operation: &'static str) {
    counter!(WRITE_CONFLICTS_TOTAL, "operation" => operation).increment(1);
}

pub fn record_phase_rejected(phase: Phase) {
    counter!(PHASES_REJECTED_TOTAL, "phase" => phase.as_str()).increment(1);
}
