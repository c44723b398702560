//! This module is responsible for reading, writing and managing the SQLite database.
//!
//! The database holds two independent keyed stores: the ledger tables (`transactions`,
//! `group_index`, `attachments`) own synchronized data mirrored from the remote service,
//! and the draft tables (`draft_transactions`, `pending_submissions`) own locally staged
//! data that has not been submitted yet. Ledger operations live in `ledger.rs`, draft
//! operations in `drafts.rs`.

mod drafts;
mod ledger;
mod migrations;

pub(crate) use ledger::LedgerGroup;

use crate::model::{Amount, TransactionLeg};
use crate::Result;
use anyhow::{bail, Context};
use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct Db {
    pool: SqlitePool,
}

impl Db {
    /// - Validates that there is a SQLite file at `path`
    /// - Creates a SQLite connection pool
    /// - Updates the database schema with migrations if it is out-of-date
    pub(crate) async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("No SQLite file found at '{}'", path.display());
        }
        let pool = connect(path, false).await?;
        let db = Self { pool };
        let version = db.schema_version().await?;
        migrations::run(&db.pool, version, migrations::CURRENT_VERSION).await?;
        Ok(db)
    }

    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the database schema
    pub(crate) async fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A file already exists at '{}'", path.display());
        }
        let pool = connect(path, true).await?;
        sqlx::query("CREATE TABLE schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .context("Failed to create schema_version table")?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&pool)
            .await
            .context("Failed to seed schema_version")?;
        migrations::run(&pool, 0, migrations::CURRENT_VERSION).await?;
        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the current schema version.
    pub(crate) async fn schema_version(&self) -> Result<i32> {
        let row = sqlx::query("SELECT version FROM schema_version")
            .fetch_one(&self.pool)
            .await
            .context("Failed to read schema_version")?;
        row.try_get::<i32, _>("version")
            .context("schema_version row is malformed")
    }
}

async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open SQLite database at '{}'", path.display()))
}

/// Reads one transaction leg from a row of `transactions` or `draft_transactions`.
/// The two tables share their leg columns.
pub(crate) fn leg_from_row(row: &SqliteRow) -> Result<TransactionLeg> {
    let amount: String = row.try_get("amount")?;
    let kind: String = row.try_get("kind")?;
    let tags: String = row.try_get("tags")?;
    let date_epoch: i64 = row.try_get("date_epoch")?;
    let date = DateTime::from_timestamp(date_epoch, 0)
        .with_context(|| format!("Stored date_epoch {date_epoch} is out of range"))?;
    // Drafts carry staged attachment URIs; the ledger table has no such column.
    let attachments: Vec<String> = match row.try_get::<String, _>("attachments") {
        Ok(json) => serde_json::from_str(&json).context("Stored attachments are malformed")?,
        Err(_) => Vec::new(),
    };
    Ok(TransactionLeg {
        journal_id: row.try_get("journal_id")?,
        amount: Amount::from_str(&amount)
            .with_context(|| format!("Stored amount '{amount}' is malformed"))?,
        kind: kind
            .parse()
            .with_context(|| format!("Stored kind '{kind}' is malformed"))?,
        description: row.try_get("description")?,
        date,
        source_name: row.try_get("source_name")?,
        destination_name: row.try_get("destination_name")?,
        currency_code: row.try_get("currency_code")?,
        category_name: row.try_get("category_name")?,
        budget_name: row.try_get("budget_name")?,
        bill_name: row.try_get("bill_name")?,
        piggy_bank_name: row.try_get("piggy_bank_name")?,
        tags: serde_json::from_str(&tags).context("Stored tags are malformed")?,
        notes: row.try_get("notes")?,
        attachments,
    })
}
