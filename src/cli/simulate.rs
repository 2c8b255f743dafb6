//! Simulate command implementation

use crate::account::{Account, AccountRiskSettings, InMemoryAccountDirectory};
use crate::archive::ParquetArchiver;
use crate::config::Config;
use crate::engine::{CycleOutcome, DecisionCycle, RiskEngine, TradeRequest};
use crate::execution::PaperExchange;
use crate::market::{MarketSnapshot, StaticFeed};
use crate::risk::LossLimits;
use crate::types::Side;
use chrono::Utc;
use clap::Args;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Account equity
    #[arg(long, default_value = "10000")]
    pub equity: Decimal,

    /// Risk per trade, defaults to the account default of 0.02
    #[arg(long)]
    pub risk_pct: Option<Decimal>,

    #[arg(long, default_value = "BTCUSDT")]
    pub symbol: String,

    #[arg(long, default_value = "paper")]
    pub exchange: String,

    /// Market price at entry
    #[arg(long)]
    pub price: Decimal,

    /// Half the quoted spread around the price
    #[arg(long, default_value = "0.01")]
    pub half_spread: Decimal,

    #[arg(long)]
    pub stop: Decimal,

    #[arg(long)]
    pub take_profit: Option<Decimal>,

    #[arg(long, default_value = "buy")]
    pub side: Side,

    /// Close the position at this market price after entry
    #[arg(long)]
    pub exit_price: Option<Decimal>,

    /// Write the audit trail and ledger to Parquet afterwards
    #[arg(long)]
    pub archive: bool,
}

impl SimulateArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let accounts = Arc::new(InMemoryAccountDirectory::new());
        let account_id = Uuid::new_v4();
        let max_risk = config.risk.max_risk_pct;
        let default_risk = Decimal::new(2, 2).max(config.risk.min_risk_pct).min(max_risk);
        accounts.upsert(Account {
            id: account_id,
            current_equity: self.equity,
            risk: AccountRiskSettings::new(&config.risk, default_risk, max_risk, LossLimits::default())?,
        });

        let engine = Arc::new(RiskEngine::in_memory(config.clone(), accounts));
        let feed = Arc::new(StaticFeed::new());
        let exchange = Arc::new(PaperExchange::new(config.cycle.paper_fee_rate));
        let cycle = DecisionCycle::new(engine.clone(), feed.clone(), exchange.clone());

        feed.publish(self.snapshot(self.price))?;
        let entry = cycle
            .run_entry(TradeRequest {
                account_id,
                symbol: self.symbol.clone(),
                exchange: self.exchange.clone(),
                side: self.side,
                stop_loss: self.stop,
                take_profit: self.take_profit,
                risk_percentage: self.risk_pct,
            })
            .await?;

        let mut position = match entry {
            CycleOutcome::Executed { position, .. } => position,
            CycleOutcome::Refused(e) => anyhow::bail!("Entry refused: {}", e),
            other => {
                print_outcome(&engine, &other)?;
                return Ok(());
            }
        };

        if let Some(exit_price) = self.exit_price {
            feed.publish(self.snapshot(exit_price))?;
            position = match cycle.run_exit(position.id).await? {
                CycleOutcome::Refused(e) => anyhow::bail!("Exit refused: {}", e),
                outcome => outcome.position().cloned().unwrap_or(position),
            };
        }

        println!("{}", serde_json::to_string_pretty(&position)?);
        for record in engine.get_audit_trail(position.id)? {
            println!("{}", serde_json::to_string(&record)?);
        }
        if let Some(record_id) = position.risk_calculation_id {
            let record = engine.ledger().get(record_id)?;
            println!("{}", serde_json::to_string(&record)?);
        }
        println!("fees paid: {}", exchange.get_fills().await.iter().map(|f| f.fees).sum::<Decimal>());

        if self.archive {
            let archiver = ParquetArchiver::new(config.archive.output_dir.clone());
            let summary = archiver.archive(&engine, Utc::now() + chrono::Duration::seconds(1))?;
            for file in summary.files {
                println!("archived {}", file.display());
            }
        }

        Ok(())
    }

    fn snapshot(&self, price: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            symbol: self.symbol.clone(),
            exchange: self.exchange.clone(),
            timestamp: Utc::now(),
            price,
            bid: price - self.half_spread,
            ask: price + self.half_spread,
            volume_24h: Decimal::ZERO,
            change_24h: Decimal::ZERO,
            depth: None,
        }
    }
}

fn print_outcome(engine: &RiskEngine, outcome: &CycleOutcome) -> anyhow::Result<()> {
    match outcome {
        CycleOutcome::Vetoed { violations, .. } => println!("vetoed: {}", violations.join(", ")),
        CycleOutcome::ExecutionFailed { reason, .. } => println!("execution failed: {reason}"),
        _ => {}
    }
    if let Some(position) = outcome.position() {
        println!("{}", serde_json::to_string_pretty(position)?);
        for record in engine.get_audit_trail(position.id)? {
            println!("{}", serde_json::to_string(&record)?);
        }
    }
    Ok(())
}
