//! Concurrent writers on positions and the audit trail

use chrono::Utc;
use risk_ledger::account::{Account, AccountRiskSettings, InMemoryAccountDirectory};
use risk_ledger::audit::{MarketObservation, Phase, PhaseEntry, PhasePayload};
use risk_ledger::config::{Config, RiskConfig};
use risk_ledger::engine::RiskEngine;
use risk_ledger::position::{NewPosition, Position, PositionError};
use risk_ledger::risk::LossLimits;
use risk_ledger::types::{AccountId, Side};
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

const THREADS: usize = 8;
const WRITES_PER_THREAD: usize = 25;

fn engine(max_write_retries: u32) -> (Arc<RiskEngine>, AccountId) {
    let accounts = Arc::new(InMemoryAccountDirectory::new());
    let account_id = Uuid::new_v4();
    accounts.upsert(Account {
        id: account_id,
        current_equity: dec!(100000),
        risk: AccountRiskSettings::new(&RiskConfig::default(), dec!(0.01), dec!(0.02), LossLimits::default())
            .unwrap(),
    });
    let mut config = Config::default();
    config.store.max_write_retries = max_write_retries;
    (Arc::new(RiskEngine::in_memory(config, accounts)), account_id)
}

fn open_position(engine: &RiskEngine, account_id: AccountId) -> Position {
    let p = engine
        .positions()
        .create(NewPosition {
            account_id,
            symbol: "SOLUSDT".to_string(),
            exchange: "binance".to_string(),
            side: Side::Buy,
            entry_price: dec!(150),
            stop_loss: dec!(140),
            take_profit: None,
            risk_percentage: None,
        })
        .unwrap();
    engine
        .positions()
        .confirm_entry(p.id, p.calculated_position_size, dec!(150), vec![])
        .unwrap()
}

#[test]
fn test_same_position_writes_serialize() {
    let (engine, account_id) = engine(10_000);
    let position = open_position(&engine, account_id);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = engine.clone();
            thread::spawn(move || {
                for i in 0..WRITES_PER_THREAD {
                    engine
                        .positions()
                        .annotate(position.id, format!("thread {t} note {i}"))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stored = engine.get_position(position.id).unwrap();
    assert_eq!(stored.annotations.len(), THREADS * WRITES_PER_THREAD);
    assert_eq!(stored.version, position.version + (THREADS * WRITES_PER_THREAD) as u64);
}

#[test]
fn test_exhausted_retries_surface_as_conflict_without_lost_writes() {
    let (engine, account_id) = engine(0);
    let position = open_position(&engine, account_id);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = engine.clone();
            thread::spawn(move || {
                let mut ok = 0usize;
                for i in 0..WRITES_PER_THREAD {
                    match engine.positions().annotate(position.id, format!("{t}-{i}")) {
                        Ok(_) => ok += 1,
                        Err(PositionError::Conflict { attempts, .. }) => assert_eq!(attempts, 1),
                        Err(e) => panic!("unexpected error {e}"),
                    }
                }
                ok
            })
        })
        .collect();
    let succeeded: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let stored = engine.get_position(position.id).unwrap();
    assert_eq!(stored.annotations.len(), succeeded);
    assert_eq!(stored.version, position.version + succeeded as u64);
}

#[test]
fn test_independent_positions_in_parallel() {
    let (engine, account_id) = engine(3);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                let position = open_position(&engine, account_id);
                engine
                    .positions()
                    .close(position.id, dec!(160), Utc::now())
                    .unwrap()
            })
        })
        .collect();
    let closed: Vec<Position> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // 100000 * 0.01 / 10 = 100 units, +10 each
    assert!(closed.iter().all(|p| p.realized_pnl == Some(dec!(1000))));
    let ids: HashSet<_> = closed.iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), THREADS);
    assert_eq!(engine.list_positions(account_id, None).unwrap().len(), THREADS);
}

#[test]
fn test_concurrent_observes_get_distinct_cycles() {
    let (engine, account_id) = engine(3);
    let position = open_position(&engine, account_id);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                engine
                    .audit()
                    .append_phase(
                        position.id,
                        PhaseEntry {
                            phase: Phase::Observe,
                            start_time: Utc::now(),
                            duration_ms: 1,
                            success: true,
                            payload: PhasePayload::Market(MarketObservation {
                                price: dec!(150),
                                bid: dec!(149.9),
                                ask: dec!(150.1),
                                spread: dec!(0.2),
                                staleness_ms: 0,
                            }),
                        },
                    )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let cycles: HashSet<u32> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|r| r.cycle)
        .collect();
    let appended = results.iter().filter(|r| r.is_ok()).count();

    assert_eq!(cycles.len(), appended);
    assert_eq!(engine.get_audit_trail(position.id).unwrap().len(), appended);
}
