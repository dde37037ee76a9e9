use std::collections::HashMap;

use crate::domain::{Account, AccountKey, Amount, LedgerError, NewTransaction, Transaction};

/// In-memory working set: one [`Account`] per account key.
///
/// Accounts are created lazily. Lookups on a key that was never created behave
/// like an empty ledger, since "no account yet" and "no transactions yet" look
/// the same to a user.
#[derive(Debug, Default)]
pub struct LedgerStore {
    accounts: HashMap<AccountKey, Account>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.accounts.contains_key(key)
    }

    pub fn account(&self, key: &str) -> Option<&Account> {
        self.accounts.get(key)
    }

    /// Return the account for `key`, creating an empty one if needed.
    pub fn get_or_create(&mut self, key: &str) -> &mut Account {
        self.accounts
            .entry(key.to_string())
            .or_insert_with(|| Account::new(key))
    }

    /// Put a whole account in place, replacing any previous state for its key.
    pub fn insert(&mut self, account: Account) {
        self.accounts.insert(account.key.clone(), account);
    }

    /// Drop an account from the working set. Used to undo a lazy creation.
    pub fn evict(&mut self, key: &str) -> Option<Account> {
        self.accounts.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    pub fn append(&mut self, key: &str, new: NewTransaction) -> Transaction {
        self.get_or_create(key).ledger.append(new)
    }

    /// Transactions of an account in insertion order. Empty for unknown keys.
    pub fn list(&self, key: &str) -> &[Transaction] {
        self.accounts
            .get(key)
            .map(|a| a.ledger.entries())
            .unwrap_or(&[])
    }

    pub fn get(&self, key: &str, position: usize) -> Result<&Transaction, LedgerError> {
        match self.accounts.get(key) {
            Some(account) => account.ledger.get(position),
            None => Err(LedgerError::InvalidPosition { position, len: 0 }),
        }
    }

    pub fn replace_amount(
        &mut self,
        key: &str,
        position: usize,
        new_amount: Amount,
    ) -> Result<Transaction, LedgerError> {
        match self.accounts.get_mut(key) {
            Some(account) => account.ledger.replace_amount(position, new_amount),
            None => Err(LedgerError::InvalidPosition { position, len: 0 }),
        }
    }

    pub fn remove(&mut self, key: &str, position: usize) -> Result<Transaction, LedgerError> {
        match self.accounts.get_mut(key) {
            Some(account) => account.ledger.remove(position),
            None => Err(LedgerError::InvalidPosition { position, len: 0 }),
        }
    }

    /// Empty the ledger of an account. The account itself stays.
    pub fn clear(&mut self, key: &str) {
        if let Some(account) = self.accounts.get_mut(key) {
            account.ledger.clear();
        }
    }

    pub fn balance(&self, key: &str) -> Amount {
        self.accounts
            .get(key)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    pub fn set_balance(&mut self, key: &str, balance: Amount) {
        self.get_or_create(key).balance = balance;
    }
}
