use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use crate::domain::{
    balance, period_start, summarize, Account, AccountSettings, Amount, BalanceOverflow,
    NewTransaction, PeriodSummary, Transaction, TransactionKind, SALARY_DAY_RANGE,
};
use crate::io::{parse_csv, ImportOptions};
use crate::storage::{LedgerStore, Repository};

use super::{AppError, Command, Deleted, Edited, LedgerEntry, Outcome, Recorded};

/// Application service providing the ledger operations for every account.
///
/// Accounts are read from the repository the first time they are touched and
/// then served from the in-memory [`LedgerStore`]. A mutation is applied in
/// memory, saved, and rolled back if the save fails, so the working set never
/// holds changes the database does not.
pub struct LedgerService {
    store: LedgerStore,
    repo: Repository,
}

/// Result of importing a CSV file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub balance: Amount,
    pub dry_run: bool,
}

/// Cached, stored and recomputed balances of an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub account: String,
    pub transactions: usize,
    /// Balance held in memory
    pub cached: Amount,
    /// Balance in the database row, `None` if the account was never saved
    pub stored: Option<Amount>,
    /// Signed sum of the ledger
    pub recomputed: Amount,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.cached == self.recomputed && self.stored.is_none_or(|s| s == self.recomputed)
    }
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            store: LedgerStore::new(),
            repo,
        }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Close the database. Later mutations fail with `StorageUnavailable`.
    pub async fn close(&self) {
        self.repo.close().await;
    }

    // ========================
    // Transactions
    // ========================

    /// Record a new income or expense and return it with the new balance.
    pub async fn record(
        &mut self,
        key: &str,
        kind: TransactionKind,
        amount: Amount,
        author: &str,
        category: &str,
    ) -> Result<Recorded, AppError> {
        let amount = validate_amount(amount)?;
        let category = category.trim();
        if kind == TransactionKind::Expense && category.is_empty() {
            return Err(AppError::MissingCategory);
        }

        self.hydrate(key).await?;
        let snapshot = self.store.account(key).cloned();

        let transaction = self.store.append(
            key,
            NewTransaction::new(kind, amount)
                .with_author(author)
                .with_category(category),
        );
        let incremental = balance::apply_add(self.store.balance(key), &transaction);
        let balance = self.settle(key, incremental, &snapshot)?;
        self.persist(key, snapshot).await?;

        info!(account = key, kind = %kind, %amount, %balance, "recorded transaction");
        Ok(Recorded {
            position: self.store.list(key).len(),
            transaction,
            balance,
        })
    }

    pub async fn add_income(
        &mut self,
        key: &str,
        amount: Amount,
        author: &str,
        source: &str,
    ) -> Result<Recorded, AppError> {
        self.record(key, TransactionKind::Income, amount, author, source)
            .await
    }

    pub async fn add_expense(
        &mut self,
        key: &str,
        amount: Amount,
        author: &str,
        category: &str,
    ) -> Result<Recorded, AppError> {
        self.record(key, TransactionKind::Expense, amount, author, category)
            .await
    }

    /// Current balance. Zero for an account with no transactions.
    pub async fn balance(&mut self, key: &str) -> Result<Amount, AppError> {
        self.hydrate(key).await?;
        Ok(self.store.balance(key))
    }

    /// All transactions in ledger order. Empty for an unknown account.
    pub async fn list(&mut self, key: &str) -> Result<Vec<Transaction>, AppError> {
        self.hydrate(key).await?;
        Ok(self.store.list(key).to_vec())
    }

    /// The last `limit` entries (all when `None`), numbered by their position
    /// in the full ledger.
    pub async fn history(
        &mut self,
        key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        self.hydrate(key).await?;
        let transactions = self.store.list(key);
        if transactions.is_empty() {
            return Err(AppError::AccountEmpty(key.to_string()));
        }

        let skip = limit.map_or(0, |l| transactions.len().saturating_sub(l));
        Ok(transactions
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(index, transaction)| LedgerEntry {
                position: index + 1,
                transaction: transaction.clone(),
            })
            .collect())
    }

    /// Change the amount of entry `position` (1-based).
    pub async fn edit_amount(
        &mut self,
        key: &str,
        position: usize,
        amount: Amount,
    ) -> Result<Edited, AppError> {
        let amount = validate_amount(amount)?;
        self.hydrate(key).await?;

        let previous = self.store.get(key, position)?.clone();
        let snapshot = self.store.account(key).cloned();

        let transaction = self.store.replace_amount(key, position, amount)?;
        let incremental = balance::apply_edit(self.store.balance(key), &previous, amount);
        let balance = self.settle(key, incremental, &snapshot)?;
        self.persist(key, snapshot).await?;

        info!(
            account = key,
            position,
            old_amount = %previous.amount,
            new_amount = %amount,
            %balance,
            "edited transaction"
        );
        Ok(Edited {
            position,
            previous,
            transaction,
            balance,
        })
    }

    /// Delete entry `position` (1-based). Later entries move up by one.
    pub async fn delete(&mut self, key: &str, position: usize) -> Result<Deleted, AppError> {
        self.hydrate(key).await?;
        let snapshot = self.store.account(key).cloned();

        let transaction = self.store.remove(key, position)?;
        let incremental = balance::apply_delete(self.store.balance(key), &transaction);
        let balance = self.settle(key, incremental, &snapshot)?;
        self.persist(key, snapshot).await?;

        info!(account = key, position, %balance, "deleted transaction");
        Ok(Deleted {
            position,
            transaction,
            balance,
        })
    }

    /// Empty the ledger and zero the balance. Settings and the account stay.
    pub async fn reset(&mut self, key: &str) -> Result<(), AppError> {
        self.hydrate(key).await?;
        let snapshot = self.store.account(key).cloned();

        self.store.get_or_create(key);
        self.store.clear(key);
        self.settle(key, Ok(balance::apply_reset()), &snapshot)?;
        self.persist(key, snapshot).await?;

        info!(account = key, "reset ledger");
        Ok(())
    }

    // ========================
    // Import / export
    // ========================

    /// A copy of the account for export. Fails with `AccountEmpty` when there
    /// is nothing to export.
    pub async fn export_account(&mut self, key: &str) -> Result<Account, AppError> {
        self.hydrate(key).await?;
        match self.store.account(key) {
            Some(account) if !account.ledger.is_empty() => Ok(account.clone()),
            _ => Err(AppError::AccountEmpty(key.to_string())),
        }
    }

    /// Append every row of a CSV file to the ledger.
    ///
    /// The whole file is validated first; one bad row rejects the import and
    /// leaves the account untouched. The balance is recomputed once at the end.
    pub async fn import_csv(
        &mut self,
        key: &str,
        text: &str,
        options: ImportOptions,
    ) -> Result<ImportSummary, AppError> {
        let rows = parse_csv(text, Utc::now())?;
        self.hydrate(key).await?;

        // A file that would push the balance out of range is rejected up front
        let projected = rows.iter().try_fold(
            balance::recompute(self.store.list(key))?,
            |running, row| balance::apply_signed(running, row.kind, row.amount),
        )?;

        if options.dry_run {
            return Ok(ImportSummary {
                imported: rows.len(),
                balance: projected,
                dry_run: true,
            });
        }

        let snapshot = self.store.account(key).cloned();
        self.store.get_or_create(key);
        let imported = rows.len();
        for row in rows {
            self.store.append(key, row);
        }
        let balance = self.settle(key, Ok(projected), &snapshot)?;
        self.persist(key, snapshot).await?;

        info!(account = key, imported, %balance, "imported transactions");
        Ok(ImportSummary {
            imported,
            balance,
            dry_run: false,
        })
    }

    // ========================
    // Settings and periods
    // ========================

    pub async fn settings(&mut self, key: &str) -> Result<AccountSettings, AppError> {
        self.hydrate(key).await?;
        Ok(self
            .store
            .account(key)
            .map(|a| a.settings.clone())
            .unwrap_or_default())
    }

    /// Update the settings given as `Some`, keeping the others.
    ///
    /// An empty currency clears the currency and a salary day of 0 clears the
    /// salary day, so periods follow the calendar month again.
    pub async fn update_settings(
        &mut self,
        key: &str,
        currency: Option<String>,
        salary_day: Option<u32>,
    ) -> Result<AccountSettings, AppError> {
        if let Some(day) = salary_day {
            if day != CLEAR_SALARY_DAY && !SALARY_DAY_RANGE.contains(&day) {
                return Err(AppError::InvalidSalaryDay(day));
            }
        }

        self.hydrate(key).await?;
        let snapshot = self.store.account(key).cloned();

        let account = self.store.get_or_create(key);
        if let Some(currency) = currency {
            let currency = currency.trim().to_string();
            account.settings.currency = (!currency.is_empty()).then_some(currency);
        }
        if let Some(day) = salary_day {
            account.settings.salary_day = (day != CLEAR_SALARY_DAY).then_some(day);
        }
        let settings = account.settings.clone();
        self.persist(key, snapshot).await?;

        info!(account = key, ?settings, "updated settings");
        Ok(settings)
    }

    /// Entries and totals of the salary period containing `today`.
    pub async fn period_summary(
        &mut self,
        key: &str,
        today: NaiveDate,
    ) -> Result<PeriodSummary, AppError> {
        self.hydrate(key).await?;
        let salary_day = self
            .store
            .account(key)
            .and_then(|a| a.settings.salary_day);
        let start = period_start(today, salary_day);
        Ok(summarize(self.store.list(key), start)?)
    }

    // ========================
    // Integrity
    // ========================

    /// Compare the cached and stored balances against a full recomputation.
    pub async fn verify(&mut self, key: &str) -> Result<ConsistencyReport, AppError> {
        self.hydrate(key).await?;
        let stored = self.repo.load_account(key).await?.map(|a| a.balance);
        let transactions = self.store.list(key);

        Ok(ConsistencyReport {
            account: key.to_string(),
            transactions: transactions.len(),
            cached: self.store.balance(key),
            stored,
            recomputed: balance::recompute(transactions)?,
        })
    }

    /// Keys of all persisted accounts.
    pub async fn account_keys(&self) -> Result<Vec<String>, AppError> {
        Ok(self.repo.list_account_keys().await?)
    }

    // ========================
    // Commands
    // ========================

    /// Run a fully assembled command for `key` on behalf of `author`.
    pub async fn execute(
        &mut self,
        key: &str,
        author: &str,
        command: Command,
    ) -> Result<Outcome, AppError> {
        debug!(account = key, ?command, "executing command");
        match command {
            Command::Record {
                kind,
                category,
                amount,
            } => Ok(Outcome::Recorded(
                self.record(key, kind, amount, author, &category).await?,
            )),
            Command::Balance => Ok(Outcome::Balance(self.balance(key).await?)),
            Command::History { limit } => Ok(Outcome::History(self.history(key, limit).await?)),
            Command::Edit { position, amount } => {
                Ok(Outcome::Edited(self.edit_amount(key, position, amount).await?))
            }
            Command::Delete { position } => Ok(Outcome::Deleted(self.delete(key, position).await?)),
            Command::Reset => {
                self.reset(key).await?;
                Ok(Outcome::Reset)
            }
            Command::Period => Ok(Outcome::Period(
                self.period_summary(key, Utc::now().date_naive()).await?,
            )),
        }
    }

    // ========================
    // Internals
    // ========================

    /// Load an account into the working set if it is not there yet.
    async fn hydrate(&mut self, key: &str) -> Result<(), AppError> {
        if self.store.contains(key) {
            return Ok(());
        }

        let Some(mut account) = self.repo.load_account(key).await? else {
            debug!(account = key, "no stored account");
            return Ok(());
        };

        if !account.is_consistent() {
            let recomputed = balance::recompute(account.ledger.entries())?;
            warn!(
                account = key,
                stored = %account.balance,
                %recomputed,
                "stored balance disagrees with ledger, using recomputed balance"
            );
            account.balance = recomputed;
        }

        debug!(account = key, transactions = account.ledger.len(), "loaded account");
        self.store.insert(account);
        Ok(())
    }

    /// Store the recomputed balance after checking it against the
    /// incrementally updated one. A balance out of range discards the change.
    fn settle(
        &mut self,
        key: &str,
        incremental: Result<Amount, BalanceOverflow>,
        snapshot: &Option<Account>,
    ) -> Result<Amount, AppError> {
        let recomputed = match balance::recompute(self.store.list(key)) {
            Ok(recomputed) => recomputed,
            Err(err) => {
                warn!(account = key, "balance out of range, change discarded");
                self.restore(key, snapshot.clone());
                return Err(err.into());
            }
        };
        if incremental != Ok(recomputed) {
            error!(
                account = key,
                ?incremental,
                %recomputed,
                "running balance diverged from ledger, using recomputed balance"
            );
        }
        self.store.set_balance(key, recomputed);
        Ok(recomputed)
    }

    /// Save the account, restoring `snapshot` in memory if the save fails.
    async fn persist(&mut self, key: &str, snapshot: Option<Account>) -> Result<(), AppError> {
        let Some(account) = self.store.account(key) else {
            return Ok(());
        };

        let saved = self.repo.save_account(account).await;
        if let Err(err) = saved {
            error!(account = key, error = %format!("{err:#}"), "failed to save account");
            self.restore(key, snapshot);
            return Err(AppError::StorageUnavailable(err));
        }
        Ok(())
    }

    /// Put back the state from before a failed mutation. `None` means the
    /// account did not exist yet.
    fn restore(&mut self, key: &str, snapshot: Option<Account>) {
        match snapshot {
            Some(previous) => self.store.insert(previous),
            None => {
                self.store.evict(key);
            }
        }
    }
}

/// Salary day value that removes the salary day setting.
pub const CLEAR_SALARY_DAY: u32 = 0;

/// Reject negative amounts. Returns the magnitude, turning -0 into 0.
fn validate_amount(amount: Amount) -> Result<Amount, AppError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AppError::InvalidAmount(format!(
            "{} is negative, amounts are magnitudes",
            amount
        )));
    }
    Ok(amount.abs())
}
