//! In-memory account directory

use super::{Account, AccountDirectory, AccountError, AccountRiskSettings};
use crate::types::AccountId;
use dashmap::DashMap;
use rust_decimal::Decimal;

/// Account directory backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryAccountDirectory {
    accounts: DashMap<AccountId, Account>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account
    pub fn upsert(&self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    /// Update equity after external settlement
    pub fn set_equity(&self, account_id: AccountId, equity: Decimal) -> Result<(), AccountError> {
        let mut account = self
            .accounts
            .get_mut(&account_id)
            .ok_or(AccountError::NotFound(account_id))?;
        account.current_equity = equity;
        Ok(())
    }
}

impl AccountDirectory for InMemoryAccountDirectory {
    fn get_equity(&self, account_id: AccountId) -> Result<Decimal, AccountError> {
        self.accounts
            .get(&account_id)
            .map(|a| a.current_equity)
            .ok_or(AccountError::NotFound(account_id))
    }

    fn get_risk_settings(&self, account_id: AccountId) -> Result<AccountRiskSettings, AccountError> {
        self.accounts
            .get(&account_id)
            .map(|a| a.risk.clone())
            .ok_or(AccountError::NotFound(account_id))
    }
}
