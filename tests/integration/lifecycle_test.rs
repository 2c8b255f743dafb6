//! Position lifecycle through the engine facade

use chrono::{Duration, Utc};
use risk_ledger::account::{Account, AccountRiskSettings, InMemoryAccountDirectory};
use risk_ledger::config::{Config, RiskConfig};
use risk_ledger::engine::RiskEngine;
use risk_ledger::error::ErrorClass;
use risk_ledger::ledger::VerificationMethod;
use risk_ledger::position::{NewPosition, PositionStatus};
use risk_ledger::risk::LossLimits;
use risk_ledger::types::{AccountId, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

fn engine(equity: Decimal) -> (RiskEngine, Arc<InMemoryAccountDirectory>, AccountId) {
    let accounts = Arc::new(InMemoryAccountDirectory::new());
    let account_id = Uuid::new_v4();
    accounts.upsert(Account {
        id: account_id,
        current_equity: equity,
        risk: AccountRiskSettings::new(&RiskConfig::default(), dec!(0.02), dec!(0.03), LossLimits::default())
            .unwrap(),
    });
    (
        RiskEngine::in_memory(Config::default(), accounts.clone()),
        accounts,
        account_id,
    )
}

fn request(account_id: AccountId, side: Side, entry: Decimal, stop: Decimal) -> NewPosition {
    NewPosition {
        account_id,
        symbol: "ETHUSDT".to_string(),
        exchange: "binance".to_string(),
        side,
        entry_price: entry,
        stop_loss: stop,
        take_profit: None,
        risk_percentage: None,
    }
}

#[test]
fn test_long_round_trip() {
    let (engine, _, account_id) = engine(dec!(10000));
    let store = engine.positions();

    let pending = store.create(request(account_id, Side::Buy, dec!(100), dec!(95))).unwrap();
    assert_eq!(pending.calculated_position_size, dec!(40));

    let record_id = pending.risk_calculation_id.unwrap();
    let verified = engine.ledger().verify(record_id, VerificationMethod::Recompute).unwrap();
    assert!(verified.verified);
    assert_eq!(verified.verification_method, Some(VerificationMethod::Recompute));

    let open = store
        .confirm_entry(pending.id, dec!(40), dec!(100), vec!["o-1".to_string()])
        .unwrap();
    let t0 = Utc::now();
    let marked = store.update_price(open.id, dec!(104), t0).unwrap();
    assert_eq!(marked.unrealized_pnl, dec!(160));

    let closed = store.close(open.id, dec!(107.5), t0 + Duration::seconds(30)).unwrap();
    assert_eq!(closed.realized_pnl, Some(dec!(300)));
    assert_eq!(closed.r_multiple, Some(dec!(1.5)));
    assert_eq!(closed.status, PositionStatus::Closed);
    assert_eq!(closed.closed_at, Some(t0 + Duration::seconds(30)));

    // Frozen inputs survive every transition
    assert_eq!(closed.entry_price, pending.entry_price);
    assert_eq!(closed.stop_loss, pending.stop_loss);
    assert_eq!(closed.account_equity_at_entry, dec!(10000));
    assert_eq!(closed.calculated_position_size, dec!(40));
}

#[test]
fn test_short_losing_trade() {
    let (engine, _, account_id) = engine(dec!(20000));
    let store = engine.positions();

    // 20000 * 0.02 / 10 = 40
    let p = store.create(request(account_id, Side::Sell, dec!(50), dec!(60))).unwrap();
    assert_eq!(p.calculated_position_size, dec!(40));

    store.confirm_entry(p.id, dec!(40), dec!(50), vec![]).unwrap();
    let closed = store.close(p.id, dec!(60), Utc::now()).unwrap();

    assert_eq!(closed.realized_pnl, Some(dec!(-400)));
    assert_eq!(closed.r_multiple, Some(dec!(-1)));
}

#[test]
fn test_equity_change_does_not_touch_existing_positions() {
    let (engine, accounts, account_id) = engine(dec!(10000));
    let store = engine.positions();

    let first = store.create(request(account_id, Side::Buy, dec!(100), dec!(95))).unwrap();
    accounts.set_equity(account_id, dec!(5000)).unwrap();
    let second = store.create(request(account_id, Side::Buy, dec!(100), dec!(95))).unwrap();

    assert_eq!(store.get_position(first.id).unwrap().calculated_position_size, dec!(40));
    assert_eq!(second.calculated_position_size, dec!(20));
    assert_eq!(second.account_equity_at_entry, dec!(5000));
}

#[test]
fn test_partial_fill_drives_pnl() {
    let (engine, _, account_id) = engine(dec!(10000));
    let store = engine.positions();

    let p = store.create(request(account_id, Side::Buy, dec!(100), dec!(95))).unwrap();
    store.confirm_entry(p.id, dec!(25), dec!(100.2), vec![]).unwrap();
    let closed = store.close(p.id, dec!(110.2), Utc::now()).unwrap();

    // (110.2 - 100.2) * 25
    assert_eq!(closed.realized_pnl, Some(dec!(250)));
}

#[test]
fn test_invalid_inputs_write_nothing() {
    let (engine, _, account_id) = engine(dec!(10000));
    let store = engine.positions();

    let err = store
        .create(request(account_id, Side::Buy, dec!(100), dec!(105)))
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);

    let err = store
        .create(request(account_id, Side::Buy, dec!(-1), dec!(-5)))
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);

    assert!(engine.list_positions(account_id, None).unwrap().is_empty());
    assert!(engine.ledger().list_unverified().unwrap().is_empty());
}

#[test]
fn test_ledger_lists_unverified_until_verified() {
    let (engine, _, account_id) = engine(dec!(10000));
    let store = engine.positions();

    let a = store.create(request(account_id, Side::Buy, dec!(100), dec!(95))).unwrap();
    store.create(request(account_id, Side::Buy, dec!(100), dec!(90))).unwrap();
    assert_eq!(engine.ledger().list_unverified().unwrap().len(), 2);

    engine
        .ledger()
        .verify(a.risk_calculation_id.unwrap(), VerificationMethod::Manual)
        .unwrap();
    assert_eq!(engine.ledger().list_unverified().unwrap().len(), 1);
}

#[test]
fn test_cancelled_position_is_terminal() {
    let (engine, _, account_id) = engine(dec!(10000));
    let store = engine.positions();

    let p = store.create(request(account_id, Side::Buy, dec!(100), dec!(95))).unwrap();
    store.cancel(p.id).unwrap();

    let err = store.confirm_entry(p.id, dec!(40), dec!(100), vec![]).unwrap_err();
    assert_eq!(err.class(), ErrorClass::State);
    assert_eq!(
        engine
            .list_positions(account_id, Some(PositionStatus::Cancelled))
            .unwrap()
            .len(),
        1
    );
}
