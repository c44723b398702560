//! The transaction leg and group-index types at the heart of the local store.

use crate::model::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of a single transaction leg.
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    #[default]
    Withdrawal,
    Deposit,
    Transfer,
}

serde_plain::derive_display_from_serialize!(TransactionKind);
serde_plain::derive_fromstr_from_deserialize!(TransactionKind);

/// One leg of a (possibly multi-leg) transaction.
///
/// A leg lives in exactly one of two journal-id spaces: remote ids are positive and
/// assigned by the ledger server; local-draft ids are negative and generated here. A leg
/// is therefore either remote-identified (synchronized) or draft-identified (staged),
/// never both.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransactionLeg {
    pub journal_id: i64,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub description: String,
    pub date: DateTime<Utc>,
    pub source_name: Option<String>,
    pub destination_name: String,
    pub currency_code: String,
    pub category_name: Option<String>,
    pub budget_name: Option<String>,
    pub bill_name: Option<String>,
    pub piggy_bank_name: Option<String>,
    /// Free-text tags, in the order the user supplied them, without duplicates.
    pub tags: Vec<String>,
    pub notes: Option<String>,
    /// Locally-staged attachment URIs. Only meaningful while the leg is a draft; once
    /// committed, attachments are owned by the upload collaborator.
    pub attachments: Vec<String>,
}

impl TransactionLeg {
    /// True if this leg carries a local-draft journal id (not yet synchronized).
    pub fn is_draft(&self) -> bool {
        self.journal_id < 0
    }
}

/// Generates a fresh local-draft journal id.
///
/// Draft ids are random negative numbers, disjoint by sign from the server's id space.
pub fn draft_journal_id() -> i64 {
    let bits = (Uuid::new_v4().as_u128() & 0x7fff_ffff_ffff_ffff) as i64;
    -bits - 1
}

/// One group-index entry: a remote group id, its title, and its legs' journal ids in
/// group order.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupEntry {
    pub group_id: i64,
    pub title: String,
    pub journal_ids: Vec<i64>,
}

/// A name paired with the summed amount of the legs carrying it, e.g. one category or
/// budget within a mirror window.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NamedSum {
    pub name: String,
    pub total: Amount,
}

/// Normalizes a tag list: trims whitespace, drops empties, removes duplicates while
/// preserving first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !seen.iter().any(|t| t == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        assert_eq!(TransactionKind::Withdrawal.to_string(), "withdrawal");
        assert_eq!(
            "transfer".parse::<TransactionKind>().unwrap(),
            TransactionKind::Transfer
        );
        assert!("cash".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_draft_journal_id_is_negative() {
        for _ in 0..64 {
            assert!(draft_journal_id() < 0);
        }
    }

    #[test]
    fn test_is_draft() {
        let mut leg = TransactionLeg {
            journal_id: draft_journal_id(),
            ..TransactionLeg::default()
        };
        assert!(leg.is_draft());
        leg.journal_id = 42;
        assert!(!leg.is_draft());
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(["food", " food ", "", "travel", "food"]);
        assert_eq!(tags, vec!["food".to_string(), "travel".to_string()]);
    }
}
