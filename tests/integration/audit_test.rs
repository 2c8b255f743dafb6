//! Audit trail and archive integration tests

use chrono::{DateTime, Duration, Utc};
use risk_ledger::account::{Account, AccountRiskSettings, InMemoryAccountDirectory};
use risk_ledger::archive::{ArchiveReader, ParquetArchiver};
use risk_ledger::audit::{
    AuditError, DecisionOutcome, ExecutionReport, MarketObservation, Phase, PhaseEntry, PhasePayload,
};
use risk_ledger::config::{Config, RiskConfig};
use risk_ledger::engine::RiskEngine;
use risk_ledger::ledger::VerificationMethod;
use risk_ledger::position::{NewPosition, Position};
use risk_ledger::risk::LossLimits;
use risk_ledger::types::Side;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

fn engine_with_position() -> (RiskEngine, Position) {
    let accounts = Arc::new(InMemoryAccountDirectory::new());
    let account_id = Uuid::new_v4();
    accounts.upsert(Account {
        id: account_id,
        current_equity: dec!(10000),
        risk: AccountRiskSettings::new(&RiskConfig::default(), dec!(0.02), dec!(0.03), LossLimits::default())
            .unwrap(),
    });
    let engine = RiskEngine::in_memory(Config::default(), accounts);
    let position = engine
        .positions()
        .create(NewPosition {
            account_id,
            symbol: "BTCUSDT".to_string(),
            exchange: "binance".to_string(),
            side: Side::Buy,
            entry_price: dec!(100),
            stop_loss: dec!(95),
            take_profit: None,
            risk_percentage: None,
        })
        .unwrap();
    (engine, position)
}

fn entry(phase: Phase, start_time: DateTime<Utc>) -> PhaseEntry {
    let payload = match phase {
        Phase::Observe | Phase::Orient => PhasePayload::Market(MarketObservation {
            price: dec!(100),
            bid: dec!(99.99),
            ask: dec!(100.01),
            spread: dec!(0.02),
            staleness_ms: 40,
        }),
        Phase::Decide => PhasePayload::Decision(DecisionOutcome {
            calculated_size: Some(dec!(40)),
            violations: vec![],
        }),
        Phase::Act => PhasePayload::Execution(ExecutionReport {
            exchange_order_id: Some("x-1".to_string()),
            response: Some("FILLED".to_string()),
            fill_price: Some(dec!(100)),
            quantity: Some(dec!(40)),
        }),
    };
    PhaseEntry {
        phase,
        start_time,
        duration_ms: 2,
        success: true,
        payload,
    }
}

#[test]
fn test_trail_is_ordered_and_immutable_across_reads() {
    let (engine, position) = engine_with_position();
    let t0 = Utc::now();

    for (i, phase) in [Phase::Observe, Phase::Orient, Phase::Decide, Phase::Act]
        .into_iter()
        .enumerate()
    {
        engine
            .audit()
            .append_phase(position.id, entry(phase, t0 + Duration::milliseconds(i as i64 * 10)))
            .unwrap();
    }

    let first_read = engine.get_audit_trail(position.id).unwrap();
    let second_read = engine.get_audit_trail(position.id).unwrap();
    assert_eq!(first_read, second_read);

    let phases: Vec<Phase> = first_read.iter().map(|r| r.phase).collect();
    assert_eq!(phases, vec![Phase::Observe, Phase::Orient, Phase::Decide, Phase::Act]);
    assert!(first_read.windows(2).all(|w| w[0].start_time <= w[1].start_time));
}

#[test]
fn test_out_of_order_phase_rejected() {
    let (engine, position) = engine_with_position();
    let t0 = Utc::now();

    engine.audit().append_phase(position.id, entry(Phase::Observe, t0)).unwrap();
    let err = engine
        .audit()
        .append_phase(position.id, entry(Phase::Act, t0))
        .unwrap_err();

    assert!(matches!(err, AuditError::PhaseSequence { phase: Phase::Act, .. }));
    assert_eq!(engine.get_audit_trail(position.id).unwrap().len(), 1);
}

#[test]
fn test_archive_writes_partitions_before_cutoff() {
    let (engine, position) = engine_with_position();
    let t0 = Utc::now();
    engine.audit().append_phase(position.id, entry(Phase::Observe, t0)).unwrap();
    engine
        .audit()
        .append_phase(position.id, entry(Phase::Orient, t0 + Duration::hours(2)))
        .unwrap();
    engine
        .ledger()
        .verify(position.risk_calculation_id.unwrap(), VerificationMethod::Recompute)
        .unwrap();

    let temp_dir = TempDir::new().unwrap();
    let archiver = ParquetArchiver::new(temp_dir.path().to_path_buf());
    let summary = archiver.archive(&engine, t0 + Duration::hours(1)).unwrap();

    assert_eq!(summary.phase_records, 1);
    assert_eq!(summary.calculation_records, 1);
    assert_eq!(summary.files.len(), 2);

    let calculations = summary
        .files
        .iter()
        .find(|p| p.to_string_lossy().contains("calculations_"))
        .unwrap();
    let records = ArchiveReader::new(calculations.clone()).read_calculations().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].verified);
    assert_eq!(records[0].hash, engine.ledger().get(records[0].id).unwrap().hash);

    // Archiving copies; the live trail is untouched
    assert_eq!(engine.get_audit_trail(position.id).unwrap().len(), 2);
}

#[test]
fn test_archive_with_nothing_old_writes_no_files() {
    let (engine, _) = engine_with_position();
    let temp_dir = TempDir::new().unwrap();
    let archiver = ParquetArchiver::new(temp_dir.path().to_path_buf());

    let summary = archiver.archive(&engine, Utc::now() - Duration::days(1)).unwrap();
    assert_eq!(summary.phase_records, 0);
    assert_eq!(summary.calculation_records, 0);
    assert!(summary.files.is_empty());
}
