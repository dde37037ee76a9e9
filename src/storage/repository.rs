use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{Account, AccountSettings, Ledger, Transaction, TransactionKind};

use super::MIGRATION_001_INITIAL;

/// Repository persisting accounts (ledger, balance and settings) in SQLite.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Close all connections. Every later call fails.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Load an account with its ledger in position order.
    pub async fn load_account(&self, key: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT account_key, balance, currency, salary_day
            FROM accounts
            WHERE account_key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let balance_str: String = row.get("balance");
        let salary_day: Option<i64> = row.get("salary_day");
        let settings = AccountSettings {
            currency: row.get("currency"),
            salary_day: salary_day
                .map(u32::try_from)
                .transpose()
                .context("Invalid salary day")?,
        };

        let rows = sqlx::query(
            r#"
            SELECT id, kind, amount, author, category, timestamp
            FROM transactions
            WHERE account_key = ?
            ORDER BY position
            "#,
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        let transactions = rows
            .iter()
            .map(Self::row_to_transaction)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Account {
            key: row.get("account_key"),
            ledger: Ledger::from_transactions(transactions),
            balance: Decimal::from_str(&balance_str).context("Invalid stored balance")?,
            settings,
        }))
    }

    /// Save the complete state of an account in one database transaction.
    ///
    /// The account row is upserted and its transaction rows are replaced, so a
    /// reader never observes a ledger that disagrees with its balance.
    pub async fn save_account(&self, account: &Account) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO accounts (account_key, balance, currency, salary_day, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(account_key) DO UPDATE SET
                balance = excluded.balance,
                currency = excluded.currency,
                salary_day = excluded.salary_day,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&account.key)
        .bind(account.balance.to_string())
        .bind(&account.settings.currency)
        .bind(account.settings.salary_day.map(i64::from))
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save account")?;

        sqlx::query("DELETE FROM transactions WHERE account_key = ?")
            .bind(&account.key)
            .execute(&mut *tx)
            .await
            .context("Failed to clear transactions")?;

        for (index, transaction) in account.ledger.entries().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transactions (id, account_key, position, kind, amount, author, category, timestamp)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(transaction.id.to_string())
            .bind(&account.key)
            .bind((index + 1) as i64)
            .bind(transaction.kind.as_str())
            .bind(transaction.amount.to_string())
            .bind(&transaction.author)
            .bind(&transaction.category)
            .bind(transaction.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await
            .context("Failed to save transaction")?;
        }

        tx.commit().await.context("Failed to commit account")?;
        Ok(())
    }

    /// Keys of every stored account, sorted.
    pub async fn list_account_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT account_key FROM accounts ORDER BY account_key")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        Ok(rows.iter().map(|row| row.get("account_key")).collect())
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let kind_str: String = row.get("kind");
        let amount_str: String = row.get("amount");
        let timestamp_str: String = row.get("timestamp");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            amount: Decimal::from_str(&amount_str).context("Invalid amount")?,
            author: row.get("author"),
            category: row.get("category"),
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .context("Invalid timestamp")?
                .with_timezone(&Utc),
        })
    }
}
