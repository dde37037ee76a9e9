use serde::{Deserialize, Serialize};

use super::{balance, Amount, Ledger};

/// Opaque account key. The caller derives it from the chat (username for a
/// private chat, title for a group); nothing here interprets it.
pub type AccountKey = String;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Currency label shown next to amounts (e.g. "EUR")
    pub currency: Option<String>,
    /// Day of month the salary arrives, starts a new budgeting period
    pub salary_day: Option<u32>,
}

impl AccountSettings {
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_salary_day(mut self, day: u32) -> Self {
        self.salary_day = Some(day);
        self
    }
}

/// One chat's books: its ledger, the cached running balance and settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub key: AccountKey,
    pub ledger: Ledger,
    pub balance: Amount,
    pub settings: AccountSettings,
}

impl Account {
    pub fn new(key: impl Into<AccountKey>) -> Self {
        Self {
            key: key.into(),
            ledger: Ledger::new(),
            balance: balance::apply_reset(),
            settings: AccountSettings::default(),
        }
    }

    /// True when the cached balance equals the signed sum of the ledger.
    pub fn is_consistent(&self) -> bool {
        balance::recompute(self.ledger.entries()) == Ok(self.balance)
    }
}
