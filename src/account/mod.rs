//! Account collaborator
//!
//! Accounts are owned elsewhere; the engine only reads equity and risk
//! settings through [`AccountDirectory`].

mod directory;

pub use directory::InMemoryAccountDirectory;

use crate::config::RiskConfig;
use crate::error::ErrorClass;
use crate::risk::{LossLimits, RiskError};
use crate::types::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Account lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Account not found: {0}")]
    NotFound(AccountId),
    #[error(transparent)]
    Risk(#[from] RiskError),
}

impl AccountError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AccountError::NotFound(_) => ErrorClass::NotFound,
            AccountError::Risk(e) => e.class(),
        }
    }
}

/// Risk settings of an account
///
/// `min_bound <= default_risk <= max_risk <= max_bound` holds after every
/// constructor and setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRiskSettings {
    default_risk_percentage: Decimal,
    max_risk_percentage: Decimal,
    pub limits: LossLimits,
}

impl AccountRiskSettings {
    /// Create validated settings
    pub fn new(
        bounds: &RiskConfig,
        default_risk_percentage: Decimal,
        max_risk_percentage: Decimal,
        limits: LossLimits,
    ) -> Result<Self, RiskError> {
        check_ordering(bounds, default_risk_percentage, max_risk_percentage)?;
        Ok(Self {
            default_risk_percentage,
            max_risk_percentage,
            limits,
        })
    }

    pub fn default_risk_percentage(&self) -> Decimal {
        self.default_risk_percentage
    }

    pub fn max_risk_percentage(&self) -> Decimal {
        self.max_risk_percentage
    }

    /// Change the default risk; rejected if it would break the ordering
    pub fn set_default_risk(&mut self, bounds: &RiskConfig, value: Decimal) -> Result<(), RiskError> {
        check_ordering(bounds, value, self.max_risk_percentage)?;
        self.default_risk_percentage = value;
        Ok(())
    }

    /// Change the maximum risk; rejected if it would break the ordering
    pub fn set_max_risk(&mut self, bounds: &RiskConfig, value: Decimal) -> Result<(), RiskError> {
        check_ordering(bounds, self.default_risk_percentage, value)?;
        self.max_risk_percentage = value;
        Ok(())
    }
}

fn check_ordering(bounds: &RiskConfig, default: Decimal, max: Decimal) -> Result<(), RiskError> {
    let out_of_bounds = |value| RiskError::RiskOutOfBounds {
        value,
        min: bounds.min_risk_pct,
        max: bounds.max_risk_pct,
    };

    if default < bounds.min_risk_pct || default > bounds.max_risk_pct {
        return Err(out_of_bounds(default));
    }
    if max < default || max > bounds.max_risk_pct {
        return Err(RiskError::RiskOutOfBounds {
            value: max,
            min: default,
            max: bounds.max_risk_pct,
        });
    }
    Ok(())
}

/// A trading account as seen by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub current_equity: Decimal,
    pub risk: AccountRiskSettings,
}

/// Read access to account equity and risk settings
pub trait AccountDirectory: Send + Sync {
    /// Current account equity
    fn get_equity(&self, account_id: AccountId) -> Result<Decimal, AccountError>;
    /// Risk settings and loss limits
    fn get_risk_settings(&self, account_id: AccountId) -> Result<AccountRiskSettings, AccountError>;
}
