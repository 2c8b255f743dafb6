//! Size command implementation

use crate::config::Config;
use crate::ledger::{VerificationLedger, VerificationMethod};
use crate::risk::RiskCalculator;
use crate::storage::InMemoryCalculationRepository;
use crate::types::Side;
use clap::Args;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;

#[derive(Args, Debug)]
pub struct SizeArgs {
    /// Account equity
    #[arg(long)]
    pub equity: Decimal,

    /// Fraction of equity to risk, defaults to 0.02
    #[arg(long)]
    pub risk_pct: Option<Decimal>,

    /// Entry price
    #[arg(long)]
    pub entry: Decimal,

    /// Stop-loss price
    #[arg(long)]
    pub stop: Decimal,

    /// BUY/LONG or SELL/SHORT
    #[arg(long, default_value = "buy")]
    pub side: Side,
}

impl SizeArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let calculator = RiskCalculator::new(config.risk.clone());
        let ledger = VerificationLedger::new(calculator.clone(), Arc::new(InMemoryCalculationRepository::new()));
        let risk_pct = self.risk_pct.unwrap_or(default_risk_pct(config));

        let started = Instant::now();
        let size = calculator.compute(self.equity, risk_pct, self.entry, self.stop, self.side)?;
        let record = ledger.record(&size, started.elapsed().as_millis() as u64)?;
        let record = ledger.verify(record.id, VerificationMethod::Recompute)?;

        println!("{}", serde_json::to_string_pretty(&record)?);
        Ok(())
    }
}

/// Standard 2% when it lies inside the configured bounds
fn default_risk_pct(config: &Config) -> Decimal {
    let standard = Decimal::new(2, 2);
    standard.max(config.risk.min_risk_pct).min(config.risk.max_risk_pct)
}
