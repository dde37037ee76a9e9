use crate::domain::{Amount, PeriodSummary, Transaction, TransactionKind};

/// Default number of entries shown by a history listing.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// A complete user intent, with every argument already collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Record {
        kind: TransactionKind,
        category: String,
        amount: Amount,
    },
    Balance,
    History {
        limit: Option<usize>,
    },
    Edit {
        position: usize,
        amount: Amount,
    },
    Delete {
        position: usize,
    },
    Reset,
    /// Entries and totals of the current salary period
    Period,
}

/// A ledger row together with the number users refer to it by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// 1-based position in the full ledger at the time of listing
    pub position: usize,
    pub transaction: Transaction,
}

/// What a command produced, for the caller to render.
#[derive(Debug, Clone)]
pub enum Outcome {
    Recorded(Recorded),
    Balance(Amount),
    History(Vec<LedgerEntry>),
    Edited(Edited),
    Deleted(Deleted),
    Reset,
    Period(PeriodSummary),
}

/// Result of recording a transaction
#[derive(Debug, Clone)]
pub struct Recorded {
    pub position: usize,
    pub transaction: Transaction,
    pub balance: Amount,
}

/// Result of changing the amount of an entry
#[derive(Debug, Clone)]
pub struct Edited {
    pub position: usize,
    pub previous: Transaction,
    pub transaction: Transaction,
    pub balance: Amount,
}

/// Result of deleting an entry
#[derive(Debug, Clone)]
pub struct Deleted {
    pub position: usize,
    pub transaction: Transaction,
    pub balance: Amount,
}
