//! Implements the `RemoteLedger` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run
//! the whole app, top-to-bottom, without a ledger server. State lives in a process-global
//! registry keyed by server URL; tests seed and inspect it with `get_state`/`set_state`.

use crate::api::{
    ApiResponse, GroupAttributes, GroupFields, Meta, Pagination, RemoteGroup, RemoteLedger,
    RemoteLeg, RemotePage, RemoteSingle,
};
use crate::model::{AttachmentRecord, DateRange, KindFilter};
use crate::Result;
use anyhow::{anyhow, Context};
use chrono::DateTime;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

static STATES: OnceLock<Mutex<HashMap<String, TestLedgerState>>> = OnceLock::new();

fn states() -> &'static Mutex<HashMap<String, TestLedgerState>> {
    STATES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// An implementation of the `RemoteLedger` trait that does not use a server. Each
/// instance addresses the state registered under its key.
pub(crate) struct TestLedger {
    key: String,
}

/// The full server-side state of one test ledger.
#[derive(Debug, Clone)]
pub(crate) struct TestLedgerState {
    /// The server's authoritative transaction groups.
    pub groups: Vec<RemoteGroup>,
    pub next_group_id: i64,
    pub next_journal_id: i64,
    /// Groups per listing page; 0 serves everything on page 1.
    pub page_size: usize,
    /// A failure injected into the next API call, consumed by that call.
    pub fail_next: Option<InjectedFailure>,
    /// The status code `delete_by_id` answers with.
    pub delete_status: u16,
    /// Attachment rows served per journal id.
    pub attachments: HashMap<i64, Vec<AttachmentRecord>>,
    /// Every API call made against this state, in order.
    pub calls: Vec<RecordedCall>,
}

impl Default for TestLedgerState {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            next_group_id: 1,
            next_journal_id: 101,
            page_size: 0,
            fail_next: None,
            delete_status: 204,
            attachments: HashMap::new(),
            calls: Vec::new(),
        }
    }
}

/// A failure injected into the next API call.
#[derive(Debug, Clone)]
pub(crate) enum InjectedFailure {
    /// No response obtained (connection refused, timeout).
    Network,
    /// A server-reported error with a status code and body.
    Status { status: u16, body: String },
}

/// A record of one API call, for test assertions.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum RecordedCall {
    CreateGroup { title: String },
    UpdateGroup { group_id: i64 },
    Delete { journal_id: i64 },
    ListPage { page: u32 },
    Search { query: String },
    Attachments { journal_id: i64 },
}

impl TestLedger {
    /// Creates a handle onto the state registered under `key` (the server URL).
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Returns a copy of the current state, default if none was registered yet.
    pub(crate) fn get_state(&self) -> TestLedgerState {
        let map = states().lock().unwrap_or_else(|poison| poison.into_inner());
        map.get(&self.key).cloned().unwrap_or_default()
    }

    /// Replaces the state.
    pub(crate) fn set_state(&self, state: TestLedgerState) {
        let mut map = states().lock().unwrap_or_else(|poison| poison.into_inner());
        map.insert(self.key.clone(), state);
    }

    /// Runs `f` against the registered state under the registry lock.
    fn update<T>(&self, f: impl FnOnce(&mut TestLedgerState) -> T) -> T {
        let mut map = states().lock().unwrap_or_else(|poison| poison.into_inner());
        f(map.entry(self.key.clone()).or_default())
    }
}

#[async_trait::async_trait]
impl RemoteLedger for TestLedger {
    async fn create_group(&self, title: &str, fields: &GroupFields) -> Result<ApiResponse> {
        self.update(|state| {
            state.calls.push(RecordedCall::CreateGroup {
                title: title.to_string(),
            });
            if let Some(failure) = state.fail_next.take() {
                return failure.into_response();
            }
            let mut legs = Vec::new();
            for index in 0..fields.leg_count() {
                let journal_id = state.next_journal_id;
                state.next_journal_id += 1;
                legs.push(leg_from_fields(fields, index, journal_id));
            }
            let group = RemoteGroup {
                id: state.next_group_id,
                attributes: GroupAttributes {
                    group_title: title.to_string(),
                    transactions: legs,
                },
            };
            state.next_group_id += 1;
            state.groups.push(group.clone());
            let body = serde_json::to_string(&RemoteSingle { data: group })
                .context("Failed to serialize test response")?;
            Ok(ApiResponse { status: 200, body })
        })
    }

    async fn update_group(
        &self,
        group_id: i64,
        _title: &str,
        fields: &GroupFields,
    ) -> Result<ApiResponse> {
        self.update(|state| {
            state.calls.push(RecordedCall::UpdateGroup { group_id });
            if let Some(failure) = state.fail_next.take() {
                return failure.into_response();
            }
            let group = state
                .groups
                .iter_mut()
                .find(|g| g.id == group_id)
                .ok_or_else(|| anyhow!("No such group {group_id}"))?;
            // The engine only ever updates the correlation marker.
            for (index, leg) in group.attributes.transactions.iter_mut().enumerate() {
                if let Some(marker) = fields.get(index, "internal_reference") {
                    leg.internal_reference = if marker.is_empty() {
                        None
                    } else {
                        Some(marker.to_string())
                    };
                }
            }
            let body = serde_json::to_string(&RemoteSingle {
                data: group.clone(),
            })
            .context("Failed to serialize test response")?;
            Ok(ApiResponse { status: 200, body })
        })
    }

    async fn delete_by_id(&self, journal_id: i64) -> Result<u16> {
        self.update(|state| {
            state.calls.push(RecordedCall::Delete { journal_id });
            if let Some(InjectedFailure::Network) = state.fail_next {
                state.fail_next = None;
                return Err(anyhow!("connection refused"));
            }
            let status = state.delete_status;
            // Some server versions report 500 on an otherwise successful delete, so the
            // test server deletes on 500 too.
            if status == 204 || status == 500 {
                for group in &mut state.groups {
                    group
                        .attributes
                        .transactions
                        .retain(|leg| leg.transaction_journal_id != journal_id);
                }
                state.groups.retain(|g| !g.attributes.transactions.is_empty());
            }
            Ok(status)
        })
    }

    async fn list_page(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        page: u32,
    ) -> Result<RemotePage> {
        self.update(|state| {
            state.calls.push(RecordedCall::ListPage { page });
            if let Some(failure) = state.fail_next.take() {
                if let Err(e) = failure.into_response() {
                    return Err(e);
                }
                return Err(anyhow!("listing request was refused"));
            }
            let matching: Vec<RemoteGroup> = state
                .groups
                .iter()
                .filter_map(|group| filter_group(group, range, kind))
                .collect();

            let page_size = if state.page_size == 0 {
                matching.len().max(1)
            } else {
                state.page_size
            };
            let total_pages = (matching.len().div_ceil(page_size)).max(1) as u32;
            let start = (page.saturating_sub(1) as usize) * page_size;
            let data: Vec<RemoteGroup> =
                matching.into_iter().skip(start).take(page_size).collect();
            Ok(RemotePage {
                data,
                meta: Meta {
                    pagination: Pagination {
                        current_page: page,
                        total_pages,
                    },
                },
            })
        })
    }

    async fn search_text(&self, query: &str) -> Result<RemotePage> {
        self.update(|state| {
            state.calls.push(RecordedCall::Search {
                query: query.to_string(),
            });
            if let Some(failure) = state.fail_next.take() {
                if let Err(e) = failure.into_response() {
                    return Err(e);
                }
                return Err(anyhow!("search request was refused"));
            }
            let needle = query.to_lowercase();
            let data: Vec<RemoteGroup> = state
                .groups
                .iter()
                .filter(|group| {
                    group
                        .attributes
                        .transactions
                        .iter()
                        .any(|leg| leg.description.to_lowercase().contains(&needle))
                })
                .cloned()
                .collect();
            Ok(RemotePage {
                data,
                meta: Meta::default(),
            })
        })
    }

    async fn attachments_for_journal(&self, journal_id: i64) -> Result<Vec<AttachmentRecord>> {
        self.update(|state| {
            state.calls.push(RecordedCall::Attachments { journal_id });
            if let Some(InjectedFailure::Network) = state.fail_next {
                state.fail_next = None;
                return Err(anyhow!("connection refused"));
            }
            Ok(state.attachments.get(&journal_id).cloned().unwrap_or_default())
        })
    }
}

impl InjectedFailure {
    fn into_response(self) -> Result<ApiResponse> {
        match self {
            InjectedFailure::Network => Err(anyhow!("connection refused")),
            InjectedFailure::Status { status, body } => Ok(ApiResponse { status, body }),
        }
    }
}

/// Reconstructs a server-side leg from the flat indexed form, assigning `journal_id`.
fn leg_from_fields(fields: &GroupFields, index: usize, journal_id: i64) -> RemoteLeg {
    let get = |field: &str| fields.get(index, field).map(str::to_string);
    RemoteLeg {
        transaction_journal_id: journal_id,
        kind: get("type")
            .and_then(|k| k.parse().ok())
            .unwrap_or_default(),
        amount: get("amount")
            .and_then(|a| a.parse().ok())
            .unwrap_or_default(),
        description: get("description").unwrap_or_default(),
        date: get("date").unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string()),
        source_name: get("source_name"),
        destination_name: get("destination_name").unwrap_or_default(),
        currency_code: get("currency_code").unwrap_or_default(),
        category_name: get("category_name"),
        budget_name: get("budget_name"),
        bill_name: get("bill_name"),
        piggy_bank_name: get("piggy_bank_name"),
        tags: get("tags")
            .map(|tags| tags.split(',').map(|t| t.trim().to_string()).collect())
            .unwrap_or_default(),
        notes: get("notes"),
        internal_reference: get("internal_reference"),
    }
}

/// Keeps the legs of `group` that fall inside the window; `None` when none do.
fn filter_group(
    group: &RemoteGroup,
    range: Option<&DateRange>,
    kind: KindFilter,
) -> Option<RemoteGroup> {
    let legs: Vec<RemoteLeg> = group
        .attributes
        .transactions
        .iter()
        .filter(|leg| {
            if let Some(want) = kind.as_kind() {
                if leg.kind != want {
                    return false;
                }
            }
            if let Some(range) = range {
                let epoch = DateTime::parse_from_rfc3339(&leg.date)
                    .map(|d| d.timestamp())
                    .unwrap_or(i64::MIN);
                if epoch < range.start_epoch() || epoch > range.end_epoch() {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect();
    if legs.is_empty() {
        return None;
    }
    Some(RemoteGroup {
        id: group.id,
        attributes: GroupAttributes {
            group_title: group.attributes.group_title.clone(),
            transactions: legs,
        },
    })
}
