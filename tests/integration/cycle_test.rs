//! Decision cycle integration tests

use async_trait::async_trait;
use chrono::{Duration, Utc};
use risk_ledger::account::{Account, AccountRiskSettings, InMemoryAccountDirectory};
use risk_ledger::audit::{Phase, PhasePayload};
use risk_ledger::config::{Config, RiskConfig};
use risk_ledger::engine::{CycleOutcome, DecisionCycle, RiskEngine, TradeRequest};
use risk_ledger::error::ErrorClass;
use risk_ledger::execution::{ExchangeClient, OrderAck, OrderRequest, PaperExchange};
use risk_ledger::market::{MarketSnapshot, StaticFeed};
use risk_ledger::position::{PositionError, PositionStatus};
use risk_ledger::risk::LossLimits;
use risk_ledger::types::{AccountId, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

struct RejectingExchange;

#[async_trait]
impl ExchangeClient for RejectingExchange {
    async fn submit_order(&self, _order: OrderRequest) -> anyhow::Result<OrderAck> {
        anyhow::bail!("insufficient margin")
    }
}

struct Harness {
    engine: Arc<RiskEngine>,
    feed: Arc<StaticFeed>,
    account_id: AccountId,
}

fn harness() -> Harness {
    let accounts = Arc::new(InMemoryAccountDirectory::new());
    let account_id = Uuid::new_v4();
    accounts.upsert(Account {
        id: account_id,
        current_equity: dec!(10000),
        risk: AccountRiskSettings::new(&RiskConfig::default(), dec!(0.02), dec!(0.03), LossLimits::default())
            .unwrap(),
    });
    Harness {
        engine: Arc::new(RiskEngine::in_memory(Config::default(), accounts)),
        feed: Arc::new(StaticFeed::new()),
        account_id,
    }
}

fn snapshot(price: Decimal, age: Duration) -> MarketSnapshot {
    MarketSnapshot {
        symbol: "BTCUSDT".to_string(),
        exchange: "paper".to_string(),
        timestamp: Utc::now() - age,
        price,
        bid: price - dec!(0.05),
        ask: price + dec!(0.05),
        volume_24h: dec!(5000),
        change_24h: dec!(1.5),
        depth: None,
    }
}

fn request(account_id: AccountId, stop: Decimal) -> TradeRequest {
    TradeRequest {
        account_id,
        symbol: "BTCUSDT".to_string(),
        exchange: "paper".to_string(),
        side: Side::Buy,
        stop_loss: stop,
        take_profit: None,
        risk_percentage: None,
    }
}

#[tokio::test]
async fn test_entry_and_exit_cycles() {
    let h = harness();
    let exchange = Arc::new(PaperExchange::new(dec!(0.001)));
    let cycle = DecisionCycle::new(h.engine.clone(), h.feed.clone(), exchange.clone());

    h.feed.publish(snapshot(dec!(100), Duration::zero())).unwrap();
    let outcome = cycle.run_entry(request(h.account_id, dec!(95))).await.unwrap();
    let CycleOutcome::Executed { position, ack } = outcome else {
        panic!("entry should execute");
    };
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.actual_position_size, Some(dec!(40)));
    assert_eq!(position.entry_order_ids, vec![ack.order_id.clone()]);

    h.feed.publish(snapshot(dec!(110), Duration::zero())).unwrap();
    let CycleOutcome::Executed { position, .. } = cycle.run_exit(position.id).await.unwrap() else {
        panic!("exit should execute");
    };
    assert_eq!(position.status, PositionStatus::Closed);
    assert_eq!(position.realized_pnl, Some(dec!(400)));
    assert_eq!(position.r_multiple, Some(dec!(2)));

    let trail = h.engine.get_audit_trail(position.id).unwrap();
    assert_eq!(trail.len(), 8);
    assert!(trail.iter().all(|r| r.success));
    assert_eq!(trail[3].cycle, 1);
    assert_eq!(trail[4].phase, Phase::Observe);
    assert_eq!(trail[4].cycle, 2);
    assert_eq!(exchange.get_fills().await.len(), 2);
}

#[tokio::test]
async fn test_stale_snapshot_vetoes_entry() {
    let h = harness();
    let exchange = Arc::new(PaperExchange::new(dec!(0)));
    let cycle = DecisionCycle::new(h.engine.clone(), h.feed.clone(), exchange.clone());

    h.feed.publish(snapshot(dec!(100), Duration::minutes(5))).unwrap();
    let outcome = cycle.run_entry(request(h.account_id, dec!(95))).await.unwrap();

    let CycleOutcome::Vetoed { position, violations } = outcome else {
        panic!("stale data should veto");
    };
    assert_eq!(violations, vec!["STALE_MARKET_DATA".to_string()]);
    assert_eq!(position.status, PositionStatus::Cancelled);

    let trail = h.engine.get_audit_trail(position.id).unwrap();
    assert_eq!(trail.len(), 3);
    assert_eq!(trail[2].phase, Phase::Decide);
    assert!(!trail[2].success);
    match &trail[2].payload {
        PhasePayload::Decision(d) => assert_eq!(d.violations, violations),
        other => panic!("unexpected payload {other:?}"),
    }
    assert!(exchange.get_fills().await.is_empty());
}

#[tokio::test]
async fn test_exchange_failure_records_failed_act_and_cancels() {
    let h = harness();
    let cycle = DecisionCycle::new(h.engine.clone(), h.feed.clone(), Arc::new(RejectingExchange));

    h.feed.publish(snapshot(dec!(100), Duration::zero())).unwrap();
    let outcome = cycle.run_entry(request(h.account_id, dec!(95))).await.unwrap();

    let CycleOutcome::ExecutionFailed { position, reason } = outcome else {
        panic!("exchange rejection expected");
    };
    assert!(reason.contains("insufficient margin"));
    assert_eq!(position.status, PositionStatus::Cancelled);

    let trail = h.engine.get_audit_trail(position.id).unwrap();
    assert_eq!(trail.len(), 4);
    assert_eq!(trail[3].phase, Phase::Act);
    assert!(!trail[3].success);
}

#[tokio::test]
async fn test_stop_above_market_is_refused() {
    let h = harness();
    let cycle = DecisionCycle::new(
        h.engine.clone(),
        h.feed.clone(),
        Arc::new(PaperExchange::new(dec!(0))),
    );

    h.feed.publish(snapshot(dec!(100), Duration::zero())).unwrap();
    let outcome = cycle.run_entry(request(h.account_id, dec!(101))).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Refused(_)));
    assert!(h.engine.list_positions(h.account_id, None).unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_account_is_an_error_not_a_refusal() {
    let h = harness();
    let cycle = DecisionCycle::new(
        h.engine.clone(),
        h.feed.clone(),
        Arc::new(PaperExchange::new(dec!(0))),
    );

    h.feed.publish(snapshot(dec!(100), Duration::zero())).unwrap();
    let err = cycle.run_entry(request(Uuid::new_v4(), dec!(95))).await.unwrap_err();

    let err = err.downcast_ref::<PositionError>().unwrap();
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert!(h.engine.list_positions(h.account_id, None).unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_market_data_is_an_error() {
    let h = harness();
    let cycle = DecisionCycle::new(
        h.engine.clone(),
        h.feed.clone(),
        Arc::new(PaperExchange::new(dec!(0))),
    );
    assert!(cycle.run_entry(request(h.account_id, dec!(95))).await.is_err());
}

#[tokio::test]
async fn test_exit_requires_open_position() {
    let h = harness();
    let cycle = DecisionCycle::new(h.engine.clone(), h.feed.clone(), Arc::new(RejectingExchange));

    h.feed.publish(snapshot(dec!(100), Duration::zero())).unwrap();
    let CycleOutcome::ExecutionFailed { position, .. } =
        cycle.run_entry(request(h.account_id, dec!(95))).await.unwrap()
    else {
        panic!("exchange rejection expected");
    };

    assert!(cycle.run_exit(position.id).await.is_err());
}
