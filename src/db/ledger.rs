//! The local ledger store: synchronized transaction legs, their group index, and the
//! mirrored attachment rows. Rows in these tables always carry remote journal ids.

use crate::db::{leg_from_row, Db};
use crate::model::{
    Amount, AttachmentRecord, DateRange, GroupEntry, KindFilter, NamedSum, TransactionLeg,
};
use crate::Result;
use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection};
use std::collections::BTreeMap;

/// One remote group ready to be stored: its id, title, and legs in group order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LedgerGroup {
    pub group_id: i64,
    pub title: String,
    pub legs: Vec<TransactionLeg>,
}

impl Db {
    /// Replaces the local slice matching `(range, kind)` with `groups`, in one atomic
    /// unit: a concurrent reader sees either the old slice or the new one, never a
    /// half-replaced window. An absent `range` replaces the entire mirror.
    pub(crate) async fn replace_slice(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        groups: &[LedgerGroup],
    ) -> Result<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .context("Failed to begin mirror replace")?;

        if range.is_none() && kind == KindFilter::All {
            sqlx::query("DELETE FROM group_index")
                .execute(&mut *tx)
                .await
                .context("Failed to clear group index")?;
            sqlx::query("DELETE FROM transactions")
                .execute(&mut *tx)
                .await
                .context("Failed to clear mirror")?;
        } else {
            let clause = window_where(range, kind);
            let sql = format!(
                "DELETE FROM group_index WHERE journal_id IN \
                 (SELECT journal_id FROM transactions WHERE {clause})"
            );
            bind_window(sqlx::query(&sql), range, kind)
                .execute(&mut *tx)
                .await
                .context("Failed to delete group index slice")?;
            let sql = format!("DELETE FROM transactions WHERE {clause}");
            bind_window(sqlx::query(&sql), range, kind)
                .execute(&mut *tx)
                .await
                .context("Failed to delete mirror slice")?;
        }

        for group in groups {
            insert_group(&mut tx, group).await?;
        }

        tx.commit().await.context("Failed to commit mirror replace")
    }

    /// Inserts or replaces one group and its legs. Used when reconciling a committed
    /// submission and when merging remote search results; a row with the same journal id
    /// collapses into the existing one.
    pub(crate) async fn upsert_group(&self, group: &LedgerGroup) -> Result<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .context("Failed to begin group upsert")?;
        insert_group(&mut tx, group).await?;
        tx.commit().await.context("Failed to commit group upsert")
    }

    /// Deletes one leg and its group-index row.
    pub(crate) async fn delete_journal(&self, journal_id: i64) -> Result<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .context("Failed to begin journal delete")?;
        sqlx::query("DELETE FROM group_index WHERE journal_id = ?")
            .bind(journal_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete group index row")?;
        sqlx::query("DELETE FROM transactions WHERE journal_id = ?")
            .bind(journal_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete transaction row")?;
        tx.commit().await.context("Failed to commit journal delete")
    }

    pub(crate) async fn leg_by_journal(&self, journal_id: i64) -> Result<Option<TransactionLeg>> {
        let row = sqlx::query("SELECT * FROM transactions WHERE journal_id = ?")
            .bind(journal_id)
            .fetch_optional(self.pool())
            .await
            .context("Failed to read transaction row")?;
        row.as_ref().map(leg_from_row).transpose()
    }

    pub(crate) async fn group_entry(&self, group_id: i64) -> Result<Option<GroupEntry>> {
        let rows = sqlx::query(
            "SELECT journal_id, group_title FROM group_index WHERE group_id = ? \
             ORDER BY position ASC",
        )
        .bind(group_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to read group index")?;
        if rows.is_empty() {
            return Ok(None);
        }
        let title: String = rows[0].try_get("group_title")?;
        let journal_ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("journal_id").map_err(Into::into))
            .collect::<Result<Vec<i64>>>()?;
        Ok(Some(GroupEntry {
            group_id,
            title,
            journal_ids,
        }))
    }

    /// The number of legs in the window.
    pub(crate) async fn count_in_window(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
    ) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) AS n FROM transactions WHERE {}",
            window_where(range, kind)
        );
        let row = bind_window(sqlx::query(&sql), range, kind)
            .fetch_one(self.pool())
            .await
            .context("Failed to count window")?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    /// Sums the legs of one currency in the window. Amounts are summed as decimals.
    pub(crate) async fn sum_for_currency(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        currency_code: &str,
    ) -> Result<Amount> {
        let sql = format!(
            "SELECT amount FROM transactions WHERE {} AND currency_code = ?",
            window_where(range, kind)
        );
        let rows = bind_window(sqlx::query(&sql), range, kind)
            .bind(currency_code)
            .fetch_all(self.pool())
            .await
            .context("Failed to sum window")?;
        sum_amount_rows(&rows)
    }

    /// Sums the legs carrying `tag` for one currency in the window.
    pub(crate) async fn sum_for_tag(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        currency_code: &str,
        tag: &str,
    ) -> Result<Amount> {
        // Tags are stored as a JSON array; match the quoted element.
        let pattern = format!("%{}%", serde_json::to_string(tag).unwrap_or_default());
        let sql = format!(
            "SELECT amount FROM transactions WHERE {} AND currency_code = ? AND tags LIKE ?",
            window_where(range, kind)
        );
        let rows = bind_window(sqlx::query(&sql), range, kind)
            .bind(currency_code)
            .bind(pattern)
            .fetch_all(self.pool())
            .await
            .context("Failed to sum tagged legs")?;
        sum_amount_rows(&rows)
    }

    /// Sums the legs assigned to `budget` for one currency in the window.
    pub(crate) async fn sum_for_budget(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        currency_code: &str,
        budget: &str,
    ) -> Result<Amount> {
        let sql = format!(
            "SELECT amount FROM transactions WHERE {} AND currency_code = ? AND budget_name = ?",
            window_where(range, kind)
        );
        let rows = bind_window(sqlx::query(&sql), range, kind)
            .bind(currency_code)
            .bind(budget)
            .fetch_all(self.pool())
            .await
            .context("Failed to sum budget legs")?;
        sum_amount_rows(&rows)
    }

    /// The distinct categories in the window with their summed amounts, for one currency.
    pub(crate) async fn categories_with_sums(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        currency_code: &str,
    ) -> Result<Vec<NamedSum>> {
        self.named_sums(range, kind, currency_code, "category_name")
            .await
    }

    /// The distinct budgets in the window with their summed amounts, for one currency.
    pub(crate) async fn budgets_with_sums(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        currency_code: &str,
    ) -> Result<Vec<NamedSum>> {
        self.named_sums(range, kind, currency_code, "budget_name")
            .await
    }

    async fn named_sums(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        currency_code: &str,
        column: &str,
    ) -> Result<Vec<NamedSum>> {
        let sql = format!(
            "SELECT {column} AS name, amount FROM transactions \
             WHERE {} AND currency_code = ? AND {column} IS NOT NULL",
            window_where(range, kind)
        );
        let rows = bind_window(sqlx::query(&sql), range, kind)
            .bind(currency_code)
            .fetch_all(self.pool())
            .await
            .context("Failed to read named sums")?;

        let mut sums: BTreeMap<String, Decimal> = BTreeMap::new();
        for row in &rows {
            let name: String = row.try_get("name")?;
            let amount: String = row.try_get("amount")?;
            let amount: Amount = amount
                .parse()
                .with_context(|| format!("Stored amount '{amount}' is malformed"))?;
            *sums.entry(name).or_default() += amount.value();
        }
        Ok(sums
            .into_iter()
            .map(|(name, total)| NamedSum {
                name,
                total: Amount::new(total),
            })
            .collect())
    }

    /// The distinct source and destination account names appearing in the window.
    pub(crate) async fn distinct_accounts(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
    ) -> Result<Vec<String>> {
        let clause = window_where(range, kind);
        let sql = format!(
            "SELECT destination_name AS name FROM transactions WHERE {clause} \
             UNION \
             SELECT source_name AS name FROM transactions \
             WHERE {clause} AND source_name IS NOT NULL \
             ORDER BY name ASC"
        );
        let q = bind_window(sqlx::query(&sql), range, kind);
        let rows = bind_window(q, range, kind)
            .fetch_all(self.pool())
            .await
            .context("Failed to read distinct accounts")?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
            .filter(|name| !matches!(name, Ok(n) if n.is_empty()))
            .collect()
    }

    /// Substring match over descriptions, newest first. Journal-id uniqueness collapses
    /// duplicate rows.
    pub(crate) async fn search_descriptions(&self, query: &str) -> Result<Vec<TransactionLeg>> {
        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE description LIKE ? ORDER BY date_epoch DESC",
        )
        .bind(format!("%{query}%"))
        .fetch_all(self.pool())
        .await
        .context("Failed to search descriptions")?;
        rows.iter().map(leg_from_row).collect()
    }

    /// Replaces the mirrored attachment rows for one journal id.
    pub(crate) async fn replace_attachments(
        &self,
        journal_id: i64,
        records: &[AttachmentRecord],
    ) -> Result<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .context("Failed to begin attachment replace")?;
        sqlx::query("DELETE FROM attachments WHERE journal_id = ?")
            .bind(journal_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete attachment rows")?;
        for record in records {
            sqlx::query(
                "INSERT OR REPLACE INTO attachments \
                 (attachment_id, journal_id, filename, download_url, size_bytes) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(record.attachment_id)
            .bind(record.journal_id)
            .bind(&record.filename)
            .bind(&record.download_url)
            .bind(record.size_bytes)
            .execute(&mut *tx)
            .await
            .context("Failed to insert attachment row")?;
        }
        tx.commit()
            .await
            .context("Failed to commit attachment replace")
    }

    /// The mirrored attachment rows for one journal id.
    pub(crate) async fn attachments_for_journal(
        &self,
        journal_id: i64,
    ) -> Result<Vec<AttachmentRecord>> {
        let rows = sqlx::query(
            "SELECT attachment_id, journal_id, filename, download_url, size_bytes \
             FROM attachments WHERE journal_id = ? ORDER BY attachment_id ASC",
        )
        .bind(journal_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to read attachment rows")?;
        rows.iter()
            .map(|row| {
                Ok(AttachmentRecord {
                    attachment_id: row.try_get("attachment_id")?,
                    journal_id: row.try_get("journal_id")?,
                    filename: row.try_get("filename")?,
                    download_url: row.try_get("download_url")?,
                    size_bytes: row.try_get("size_bytes")?,
                })
            })
            .collect()
    }
}

/// Inserts one group's legs and group-index rows within an open transaction.
async fn insert_group(tx: &mut SqliteConnection, group: &LedgerGroup) -> Result<()> {
    for (position, leg) in group.legs.iter().enumerate() {
        let tags = serde_json::to_string(&leg.tags).context("Unable to serialize tags")?;
        sqlx::query(
            "INSERT OR REPLACE INTO transactions \
             (journal_id, amount, kind, description, date_epoch, source_name, \
              destination_name, currency_code, category_name, budget_name, bill_name, \
              piggy_bank_name, tags, notes) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(leg.journal_id)
        .bind(leg.amount.to_string())
        .bind(leg.kind.to_string())
        .bind(&leg.description)
        .bind(leg.date.timestamp())
        .bind(&leg.source_name)
        .bind(&leg.destination_name)
        .bind(&leg.currency_code)
        .bind(&leg.category_name)
        .bind(&leg.budget_name)
        .bind(&leg.bill_name)
        .bind(&leg.piggy_bank_name)
        .bind(tags)
        .bind(&leg.notes)
        .execute(&mut *tx)
        .await
        .context("Failed to insert mirrored leg")?;

        sqlx::query(
            "INSERT OR REPLACE INTO group_index (group_id, journal_id, position, group_title) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(group.group_id)
        .bind(leg.journal_id)
        .bind(position as i64)
        .bind(&group.title)
        .execute(&mut *tx)
        .await
        .context("Failed to insert group index row")?;
    }
    Ok(())
}

/// Sums the `amount` column of the fetched rows as decimals.
fn sum_amount_rows(rows: &[SqliteRow]) -> Result<Amount> {
    let mut total = Decimal::ZERO;
    for row in rows {
        let amount: String = row.try_get("amount")?;
        let amount: Amount = amount
            .parse()
            .with_context(|| format!("Stored amount '{amount}' is malformed"))?;
        total += amount.value();
    }
    Ok(Amount::new(total))
}

/// Builds the window filter clause. Bind order: range bounds first, then kind; use
/// `bind_window` with the same arguments to supply them.
fn window_where(range: Option<&DateRange>, kind: KindFilter) -> String {
    let mut clauses = vec!["1 = 1".to_string()];
    if range.is_some() {
        clauses.push("date_epoch BETWEEN ? AND ?".to_string());
    }
    if kind.as_kind().is_some() {
        clauses.push("kind = ?".to_string());
    }
    clauses.join(" AND ")
}

fn bind_window<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    range: Option<&DateRange>,
    kind: KindFilter,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    if let Some(range) = range {
        query = query.bind(range.start_epoch()).bind(range.end_epoch());
    }
    if let Some(kind) = kind.as_kind() {
        query = query.bind(kind.to_string());
    }
    query
}
