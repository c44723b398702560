//! Wire types for the remote ledger's REST interface.
//!
//! Group create/update requests travel as a flat field-indexed form
//! (`transactions[0][amount]`, `transactions[0][description]`, one index per leg);
//! responses and listings are JSON envelopes. `GroupFields` builds the indexed form by
//! explicit serialization so the index bookkeeping stays auditable.

use crate::model::{Amount, TransactionKind, TransactionLeg};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One page of a paginated listing or search response.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RemotePage {
    pub data: Vec<RemoteGroup>,
    pub meta: Meta,
}

#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct Meta {
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
        }
    }
}

/// The envelope around a single group, as returned by create and update.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RemoteSingle {
    pub data: RemoteGroup,
}

/// One transaction group as the server reports it.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RemoteGroup {
    pub id: i64,
    pub attributes: GroupAttributes,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GroupAttributes {
    pub group_title: String,
    pub transactions: Vec<RemoteLeg>,
}

/// One leg of a group as the server reports it. Dates travel as RFC 3339 strings.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RemoteLeg {
    pub transaction_journal_id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Amount,
    pub description: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    pub destination_name: String,
    pub currency_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piggy_bank_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// The transient correlation marker: a draft journal id echoed back by the server so
    /// staged attachments can be linked to the server-assigned journal id. Cleared with a
    /// follow-up update once linking is done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_reference: Option<String>,
}

impl RemoteLeg {
    /// Converts a server-reported leg into the local model.
    pub(crate) fn to_leg(&self) -> Result<TransactionLeg> {
        let date = DateTime::parse_from_rfc3339(&self.date)
            .with_context(|| format!("Remote date '{}' is not RFC 3339", self.date))?
            .with_timezone(&Utc);
        Ok(TransactionLeg {
            journal_id: self.transaction_journal_id,
            amount: self.amount,
            kind: self.kind,
            description: self.description.clone(),
            date,
            source_name: self.source_name.clone(),
            destination_name: self.destination_name.clone(),
            currency_code: self.currency_code.clone(),
            category_name: self.category_name.clone(),
            budget_name: self.budget_name.clone(),
            bill_name: self.bill_name.clone(),
            piggy_bank_name: self.piggy_bank_name.clone(),
            tags: self.tags.clone(),
            notes: self.notes.clone(),
            attachments: Vec::new(),
        })
    }
}

/// A structured error body from the server. Field errors arrive as lists of messages
/// keyed by the offending field.
#[derive(Default, Debug, Clone, Eq, PartialEq, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<ErrorFields>,
}

#[derive(Default, Debug, Clone, Eq, PartialEq, Deserialize)]
pub(crate) struct ErrorFields {
    #[serde(default)]
    pub transactions_currency: Option<Vec<String>>,
    #[serde(default)]
    pub piggy_bank_name: Option<Vec<String>>,
    #[serde(default)]
    pub transactions_destination_name: Option<Vec<String>>,
    #[serde(default)]
    pub transactions_source_name: Option<Vec<String>>,
    #[serde(default)]
    pub transactions_source_id: Option<Vec<String>>,
    #[serde(default)]
    pub transaction_destination_id: Option<Vec<String>>,
    #[serde(default)]
    pub transaction_amount: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<Vec<String>>,
    #[serde(default)]
    pub transactions_budget_name: Option<Vec<String>>,
}

impl ErrorBody {
    /// Extracts the first available field-level message, checking the known fields in a
    /// fixed priority order and falling back to the body's top-level message.
    pub(crate) fn first_message(&self) -> Option<String> {
        if let Some(fields) = &self.errors {
            let prioritized = [
                &fields.transactions_currency,
                &fields.piggy_bank_name,
                &fields.transactions_destination_name,
                &fields.transactions_source_name,
                &fields.transactions_source_id,
                &fields.transaction_destination_id,
                &fields.transaction_amount,
                &fields.description,
                &fields.transactions_budget_name,
            ];
            for field in prioritized {
                if let Some(first) = field.as_ref().and_then(|msgs| msgs.first()) {
                    return Some(first.clone());
                }
            }
        }
        self.message.clone()
    }
}

/// The flat field-indexed form for a group create/update request, built by explicit
/// serialization. Optional fields are present only when non-null.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub(crate) struct GroupFields {
    pairs: Vec<(String, String)>,
}

impl GroupFields {
    /// Serializes the legs of a draft group, in staging order. A leg that carries staged
    /// attachments embeds its draft journal id as the `internal_reference` correlation
    /// marker, since the server assigns the final journal id.
    pub(crate) fn from_legs(legs: &[TransactionLeg]) -> Self {
        let mut fields = GroupFields::default();
        for (index, leg) in legs.iter().enumerate() {
            fields.push_leg(index, leg);
        }
        fields
    }

    /// Builds the form that clears the correlation marker on every leg of a committed
    /// group.
    pub(crate) fn marker_reset(legs: &[RemoteLeg]) -> Self {
        let mut fields = GroupFields::default();
        for (index, leg) in legs.iter().enumerate() {
            fields.push(
                index,
                "transaction_journal_id",
                leg.transaction_journal_id.to_string(),
            );
            fields.push(index, "internal_reference", String::new());
        }
        fields
    }

    fn push_leg(&mut self, index: usize, leg: &TransactionLeg) {
        self.push(index, "type", leg.kind.to_string());
        self.push(index, "description", leg.description.clone());
        self.push(
            index,
            "date",
            leg.date.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        self.push(index, "amount", leg.amount.to_string());
        if let Some(source) = &leg.source_name {
            self.push(index, "source_name", source.clone());
        }
        self.push(index, "destination_name", leg.destination_name.clone());
        self.push(index, "currency_code", leg.currency_code.clone());
        if let Some(category) = &leg.category_name {
            self.push(index, "category_name", category.clone());
        }
        if !leg.tags.is_empty() {
            self.push(index, "tags", leg.tags.join(","));
        }
        if let Some(budget) = &leg.budget_name {
            self.push(index, "budget_name", budget.clone());
        }
        if let Some(bill) = &leg.bill_name {
            self.push(index, "bill_name", bill.clone());
        }
        if let Some(piggy) = &leg.piggy_bank_name {
            self.push(index, "piggy_bank_name", piggy.clone());
        }
        if let Some(notes) = &leg.notes {
            if !notes.is_empty() {
                self.push(index, "notes", notes.clone());
            }
        }
        if !leg.attachments.is_empty() {
            self.push(index, "internal_reference", leg.journal_id.to_string());
        }
    }

    fn push(&mut self, index: usize, field: &str, value: String) {
        self.pairs
            .push((format!("transactions[{index}][{field}]"), value));
    }

    pub(crate) fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// The value of one indexed field, if present.
    pub(crate) fn get(&self, index: usize, field: &str) -> Option<&str> {
        let key = format!("transactions[{index}][{field}]");
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The number of legs encoded in the form.
    pub(crate) fn leg_count(&self) -> usize {
        let mut count = 0;
        while self.pairs.iter().any(|(k, _)| {
            k.starts_with(&format!("transactions[{count}]["))
        }) {
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::draft_journal_id;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn leg(amount: &str) -> TransactionLeg {
        TransactionLeg {
            journal_id: draft_journal_id(),
            amount: Amount::from_str(amount).unwrap(),
            kind: TransactionKind::Withdrawal,
            description: "Lunch".to_string(),
            date: Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap(),
            destination_name: "Cafe".to_string(),
            currency_code: "USD".to_string(),
            ..TransactionLeg::default()
        }
    }

    #[test]
    fn test_group_fields_indexing() {
        let legs = vec![leg("-10.00"), leg("-5.00")];
        let fields = GroupFields::from_legs(&legs);
        assert_eq!(fields.leg_count(), 2);
        assert_eq!(fields.get(0, "amount"), Some("-10.00"));
        assert_eq!(fields.get(1, "amount"), Some("-5.00"));
        assert_eq!(fields.get(0, "type"), Some("withdrawal"));
        assert_eq!(fields.get(0, "date"), Some("2024-03-05T12:00:00Z"));
        // Optional fields are present only when non-null.
        assert_eq!(fields.get(0, "category_name"), None);
        assert_eq!(fields.get(0, "internal_reference"), None);
    }

    #[test]
    fn test_group_fields_marker_for_attachments() {
        let mut with_files = leg("-10.00");
        with_files.attachments = vec!["file:///tmp/receipt.jpg".to_string()];
        let marker = with_files.journal_id.to_string();
        let fields = GroupFields::from_legs(std::slice::from_ref(&with_files));
        assert_eq!(fields.get(0, "internal_reference"), Some(marker.as_str()));
    }

    #[test]
    fn test_marker_reset() {
        let legs = vec![
            RemoteLeg {
                transaction_journal_id: 101,
                ..RemoteLeg::default()
            },
            RemoteLeg {
                transaction_journal_id: 102,
                ..RemoteLeg::default()
            },
        ];
        let fields = GroupFields::marker_reset(&legs);
        assert_eq!(fields.get(0, "transaction_journal_id"), Some("101"));
        assert_eq!(fields.get(0, "internal_reference"), Some(""));
        assert_eq!(fields.get(1, "transaction_journal_id"), Some("102"));
    }

    #[test]
    fn test_error_body_priority() {
        let json = r#"{
            "message": "The given data was invalid",
            "errors": {
                "transaction_amount": ["Amount must not be zero"],
                "transactions_currency": ["Unknown currency code"]
            }
        }"#;
        let body: ErrorBody = serde_json::from_str(json).unwrap();
        assert_eq!(
            body.first_message().unwrap(),
            "Unknown currency code",
            "currency outranks amount in the priority order"
        );
    }

    #[test]
    fn test_error_body_falls_back_to_top_level_message() {
        let json = r#"{"message": "The given data was invalid"}"#;
        let body: ErrorBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.first_message().unwrap(), "The given data was invalid");
    }

    #[test]
    fn test_error_body_empty() {
        let body: ErrorBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.first_message(), None);
    }

    #[test]
    fn test_remote_leg_to_leg() {
        let remote = RemoteLeg {
            transaction_journal_id: 101,
            kind: TransactionKind::Deposit,
            amount: Amount::from_str("100.00").unwrap(),
            description: "Paycheck".to_string(),
            date: "2024-03-05T12:00:00Z".to_string(),
            destination_name: "Checking".to_string(),
            currency_code: "USD".to_string(),
            ..RemoteLeg::default()
        };
        let leg = remote.to_leg().unwrap();
        assert_eq!(leg.journal_id, 101);
        assert_eq!(leg.kind, TransactionKind::Deposit);
        assert_eq!(leg.date.timestamp(), 1709640000);

        let bad = RemoteLeg {
            date: "yesterday".to_string(),
            ..remote
        };
        assert!(bad.to_leg().is_err());
    }
}
