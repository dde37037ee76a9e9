use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Amount;

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Money coming in (balance increases)
    Income,
    /// Money going out (balance decreases)
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "Income",
            TransactionKind::Expense => "Expense",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Some(TransactionKind::Income),
            "expense" => Some(TransactionKind::Expense),
            _ => None,
        }
    }

    /// Apply this kind's sign to a magnitude.
    pub fn signed(&self, amount: Amount) -> Amount {
        match self {
            TransactionKind::Income => amount,
            TransactionKind::Expense => -amount,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction before it has been stored in a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    /// Always a non-negative magnitude, the sign comes from `kind`
    pub amount: Amount,
    pub author: String,
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

impl NewTransaction {
    pub fn new(kind: TransactionKind, amount: Amount) -> Self {
        assert!(
            !amount.is_sign_negative() || amount.is_zero(),
            "Transaction amount must not be negative"
        );
        Self {
            kind,
            // -0 is stored as 0
            amount: amount.abs(),
            author: String::new(),
            category: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn income(amount: Amount) -> Self {
        Self::new(TransactionKind::Income, amount)
    }

    pub fn expense(amount: Amount) -> Self {
        Self::new(TransactionKind::Expense, amount)
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A stored ledger entry. Only `amount` changes after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub amount: Amount,
    /// Display name of whoever recorded it
    pub author: String,
    /// Free text: the source of an income or the purpose of an expense
    pub category: String,
    /// Creation time, unaffected by edits
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn from_new(new: NewTransaction) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: new.kind,
            amount: new.amount,
            author: new.author,
            category: new.category,
            timestamp: new.timestamp,
        }
    }

    /// The amount with the sign implied by the kind.
    pub fn signed_amount(&self) -> Amount {
        self.kind.signed(self.amount)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [TransactionKind::Income, TransactionKind::Expense] {
            assert_eq!(TransactionKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(
            TransactionKind::from_str(" income "),
            Some(TransactionKind::Income)
        );
        assert_eq!(
            TransactionKind::from_str("EXPENSE"),
            Some(TransactionKind::Expense)
        );
        assert_eq!(TransactionKind::from_str("transfer"), None);
    }

    #[test]
    fn test_signed_amount() {
        let income = Transaction::from_new(NewTransaction::income(dec!(100)));
        let expense = Transaction::from_new(NewTransaction::expense(dec!(40)).with_category("food"));

        assert_eq!(income.signed_amount(), dec!(100));
        assert_eq!(expense.signed_amount(), dec!(-40));
        assert_eq!(expense.category, "food");
    }

    #[test]
    fn test_from_new_assigns_fresh_ids() {
        let a = Transaction::from_new(NewTransaction::income(dec!(1)));
        let b = Transaction::from_new(NewTransaction::income(dec!(1)));
        assert_ne!(a.id, b.id);
    }

    #[test]
    #[should_panic(expected = "Transaction amount must not be negative")]
    fn test_transaction_rejects_negative_amount() {
        NewTransaction::income(dec!(-1));
    }
}
