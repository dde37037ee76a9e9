use serde::{Deserialize, Serialize};

use super::{Amount, NewTransaction, Transaction};

/// An ordered list of transactions for one account.
///
/// Entries are referred to by their 1-based position in insertion order.
/// Positions are not stored: removing an entry shifts every later entry down
/// by one, so "entry N" always means the N-th row of the current listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: Vec<Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transactions(entries: Vec<Transaction>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a new transaction at the end of the ledger.
    pub fn append(&mut self, new: NewTransaction) -> Transaction {
        let transaction = Transaction::from_new(new);
        self.entries.push(transaction.clone());
        transaction
    }

    /// Get the transaction at a 1-based position.
    pub fn get(&self, position: usize) -> Result<&Transaction, LedgerError> {
        let index = self.index_of(position)?;
        Ok(&self.entries[index])
    }

    /// Change the amount of the transaction at a 1-based position.
    /// Kind, author, category and timestamp are left untouched.
    pub fn replace_amount(
        &mut self,
        position: usize,
        new_amount: Amount,
    ) -> Result<Transaction, LedgerError> {
        let index = self.index_of(position)?;
        let entry = &mut self.entries[index];
        entry.amount = new_amount;
        Ok(entry.clone())
    }

    /// Remove the transaction at a 1-based position and return it.
    pub fn remove(&mut self, position: usize) -> Result<Transaction, LedgerError> {
        let index = self.index_of(position)?;
        Ok(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn index_of(&self, position: usize) -> Result<usize, LedgerError> {
        if position == 0 || position > self.entries.len() {
            return Err(LedgerError::InvalidPosition {
                position,
                len: self.entries.len(),
            });
        }
        Ok(position - 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    InvalidPosition { position: usize, len: usize },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::InvalidPosition { position, len } => {
                if *len == 0 {
                    write!(f, "Entry {} does not exist, the ledger is empty", position)
                } else {
                    write!(
                        f,
                        "Entry {} does not exist, choose a number between 1 and {}",
                        position, len
                    )
                }
            }
        }
    }
}

impl std::error::Error for LedgerError {}
