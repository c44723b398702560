//! The draft store: transaction legs still being composed locally, grouped under a
//! client-generated master id, plus the pending-submission records handed to the retry
//! scheduler.
//!
//! Everything here is purely local and never fails due to network state.

use crate::db::{leg_from_row, Db};
use crate::model::{draft_journal_id, PendingSubmission, TransactionLeg};
use crate::Result;
use anyhow::Context;
use sqlx::Row;

impl Db {
    /// Persists a leg tagged with a freshly generated local-draft journal id and appends
    /// it to the draft group for `master_id`, creating the group if absent. Returns the
    /// generated journal id.
    pub(crate) async fn stage_leg(&self, master_id: i64, leg: &TransactionLeg) -> Result<i64> {
        let journal_id = draft_journal_id();
        let tags = serde_json::to_string(&leg.tags).context("Unable to serialize tags")?;
        let attachments =
            serde_json::to_string(&leg.attachments).context("Unable to serialize attachments")?;

        // Position allocation and the insert must be one atomic unit so that two stages
        // against the same master id cannot claim the same position.
        let mut tx = self
            .pool()
            .begin()
            .await
            .context("Failed to begin staging transaction")?;
        let row = sqlx::query(
            "SELECT COALESCE(MAX(position) + 1, 0) AS next FROM draft_transactions \
             WHERE master_id = ?",
        )
        .bind(master_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to allocate staging position")?;
        let position: i64 = row.try_get("next")?;

        sqlx::query(
            "INSERT INTO draft_transactions \
             (journal_id, master_id, position, amount, kind, description, date_epoch, \
              source_name, destination_name, currency_code, category_name, budget_name, \
              bill_name, piggy_bank_name, tags, notes, attachments) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(journal_id)
        .bind(master_id)
        .bind(position)
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
        .bind(attachments)
        .execute(&mut *tx)
        .await
        .context("Failed to stage draft leg")?;
        tx.commit()
            .await
            .context("Failed to commit staged draft leg")?;

        Ok(journal_id)
    }

    /// Returns the legs staged under `master_id`, in staging order. The order becomes
    /// leg order in the eventual submitted group.
    pub(crate) async fn legs_for_master(&self, master_id: i64) -> Result<Vec<TransactionLeg>> {
        let rows = sqlx::query(
            "SELECT * FROM draft_transactions WHERE master_id = ? ORDER BY position ASC",
        )
        .bind(master_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to read draft legs")?;
        rows.iter().map(leg_from_row).collect()
    }

    /// Deletes all legs for `master_id`. Deleting an absent master id is a no-op.
    pub(crate) async fn purge_master(&self, master_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM draft_transactions WHERE master_id = ?")
            .bind(master_id)
            .execute(self.pool())
            .await
            .context("Failed to purge draft group")?;
        Ok(())
    }

    /// Returns the staged attachment URIs for a draft journal id, used to re-associate
    /// uploads after a successful submission.
    pub(crate) async fn attachments_for(&self, journal_id: i64) -> Result<Vec<String>> {
        let row = sqlx::query("SELECT attachments FROM draft_transactions WHERE journal_id = ?")
            .bind(journal_id)
            .fetch_optional(self.pool())
            .await
            .context("Failed to read draft attachments")?;
        match row {
            Some(row) => {
                let json: String = row.try_get("attachments")?;
                serde_json::from_str(&json).context("Stored attachments are malformed")
            }
            None => Ok(Vec::new()),
        }
    }

    /// Returns the number of legs staged under `master_id`.
    pub(crate) async fn draft_count(&self, master_id: i64) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM draft_transactions WHERE master_id = ?")
            .bind(master_id)
            .fetch_one(self.pool())
            .await
            .context("Failed to count draft legs")?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    /// Persists a pending submission, replacing any previous record for the master id.
    pub(crate) async fn insert_pending(&self, pending: &PendingSubmission) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO pending_submissions (master_id, group_title, created_epoch) \
             VALUES (?, ?, ?)",
        )
        .bind(pending.master_id)
        .bind(&pending.group_title)
        .bind(pending.created_at)
        .execute(self.pool())
        .await
        .context("Failed to persist pending submission")?;
        Ok(())
    }

    /// Deletes the pending submission for `master_id`, if any.
    pub(crate) async fn delete_pending(&self, master_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM pending_submissions WHERE master_id = ?")
            .bind(master_id)
            .execute(self.pool())
            .await
            .context("Failed to delete pending submission")?;
        Ok(())
    }

    /// Returns all pending submissions, oldest first.
    pub(crate) async fn pending_submissions(&self) -> Result<Vec<PendingSubmission>> {
        let rows = sqlx::query(
            "SELECT master_id, group_title, created_epoch FROM pending_submissions \
             ORDER BY created_epoch ASC",
        )
        .fetch_all(self.pool())
        .await
        .context("Failed to read pending submissions")?;
        rows.iter()
            .map(|row| {
                Ok(PendingSubmission {
                    master_id: row.try_get("master_id")?,
                    group_title: row.try_get("group_title")?,
                    created_at: row.try_get("created_epoch")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, TransactionKind};
    use chrono::Utc;
    use std::str::FromStr;
    use tempfile::TempDir;

    async fn test_db() -> (TempDir, Db) {
        let dir = TempDir::new().unwrap();
        let db = Db::init(dir.path().join("test.sqlite")).await.unwrap();
        (dir, db)
    }

    fn leg(amount: &str, description: &str) -> TransactionLeg {
        TransactionLeg {
            amount: Amount::from_str(amount).unwrap(),
            kind: TransactionKind::Withdrawal,
            description: description.to_string(),
            date: Utc::now(),
            destination_name: "Checking".to_string(),
            currency_code: "USD".to_string(),
            ..TransactionLeg::default()
        }
    }

    #[tokio::test]
    async fn test_stage_preserves_order() {
        let (_dir, db) = test_db().await;
        db.stage_leg(7, &leg("10.00", "first")).await.unwrap();
        db.stage_leg(7, &leg("5.00", "second")).await.unwrap();
        db.stage_leg(7, &leg("2.50", "third")).await.unwrap();

        let legs = db.legs_for_master(7).await.unwrap();
        let descriptions: Vec<&str> = legs.iter().map(|l| l.description.as_str()).collect();
        assert_eq!(descriptions, vec!["first", "second", "third"]);
        assert!(legs.iter().all(|l| l.is_draft()));
    }

    #[tokio::test]
    async fn test_stage_isolated_by_master_id() {
        let (_dir, db) = test_db().await;
        db.stage_leg(1, &leg("10.00", "mine")).await.unwrap();
        db.stage_leg(2, &leg("20.00", "other")).await.unwrap();

        assert_eq!(db.draft_count(1).await.unwrap(), 1);
        assert_eq!(db.draft_count(2).await.unwrap(), 1);
        let legs = db.legs_for_master(1).await.unwrap();
        assert_eq!(legs[0].description, "mine");
    }

    #[tokio::test]
    async fn test_purge_master_is_idempotent() {
        let (_dir, db) = test_db().await;
        db.stage_leg(7, &leg("10.00", "a")).await.unwrap();
        db.purge_master(7).await.unwrap();
        assert_eq!(db.draft_count(7).await.unwrap(), 0);
        // Purging an absent master id is a no-op, not an error.
        db.purge_master(7).await.unwrap();
        db.purge_master(999).await.unwrap();
    }

    #[tokio::test]
    async fn test_attachments_round_trip() {
        let (_dir, db) = test_db().await;
        let mut with_files = leg("10.00", "receipted");
        with_files.attachments = vec!["file:///tmp/receipt.jpg".to_string()];
        let journal_id = db.stage_leg(3, &with_files).await.unwrap();

        let uris = db.attachments_for(journal_id).await.unwrap();
        assert_eq!(uris, vec!["file:///tmp/receipt.jpg".to_string()]);
        assert!(db.attachments_for(12345).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_submissions_round_trip() {
        let (_dir, db) = test_db().await;
        let pending = PendingSubmission {
            master_id: 7,
            group_title: "Groceries".to_string(),
            created_at: 1700000000,
        };
        db.insert_pending(&pending).await.unwrap();
        // Replacing the record for the same master id does not duplicate it.
        db.insert_pending(&pending).await.unwrap();

        let all = db.pending_submissions().await.unwrap();
        assert_eq!(all, vec![pending]);

        db.delete_pending(7).await.unwrap();
        assert!(db.pending_submissions().await.unwrap().is_empty());
        // Deleting an absent record is a no-op.
        db.delete_pending(7).await.unwrap();
    }
}
