//! The protocol boundary to the remote ledger service.
//!
//! `RemoteLedger` is the thin client contract this engine depends on. The production
//! implementation speaks HTTP; an in-memory implementation backs tests and the
//! `SPLITSYNC_IN_TEST_MODE` mode so the whole program can run without a server.

mod http;
mod test_client;
mod types;

use crate::model::{AttachmentRecord, DateRange, KindFilter};
use crate::{Config, Result};
use std::sync::Arc;

pub(crate) use test_client::{InjectedFailure, RecordedCall, TestLedger, TestLedgerState};
pub(crate) use types::{
    ErrorBody, GroupAttributes, GroupFields, Meta, Pagination, RemoteGroup, RemoteLeg, RemotePage,
    RemoteSingle,
};

/// A raw response obtained from the server: status code plus body text.
///
/// "No response obtained" (connection refused, timeout, or any other transport failure)
/// is the `Err` branch of the calling method instead, so callers can classify
/// network-unreachable separately from server-reported errors.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The remote ledger service contract consumed by the sync engine.
#[async_trait::async_trait]
pub(crate) trait RemoteLedger: Send + Sync {
    /// Creates one transaction group from a flat field-indexed form.
    async fn create_group(&self, title: &str, fields: &GroupFields) -> Result<ApiResponse>;

    /// Updates an existing transaction group.
    async fn update_group(
        &self,
        group_id: i64,
        title: &str,
        fields: &GroupFields,
    ) -> Result<ApiResponse>;

    /// Deletes one transaction by journal id, returning the HTTP status code.
    async fn delete_by_id(&self, journal_id: i64) -> Result<u16>;

    /// Fetches one page of the paginated listing for a window.
    async fn list_page(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        page: u32,
    ) -> Result<RemotePage>;

    /// Full-text search over transactions.
    async fn search_text(&self, query: &str) -> Result<RemotePage>;

    /// The attachment rows for one journal id.
    async fn attachments_for_journal(&self, journal_id: i64) -> Result<Vec<AttachmentRecord>>;
}

/// Determines whether API calls go to a real server or to the in-memory test ledger.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Remote,
    Test,
}

impl Mode {
    /// When `SPLITSYNC_IN_TEST_MODE` is set and non-empty, API calls are served by the
    /// in-memory test ledger instead of a real server.
    pub fn from_env() -> Mode {
        match std::env::var("SPLITSYNC_IN_TEST_MODE") {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Remote,
        }
    }
}

/// Creates the `RemoteLedger` implementation for `mode`.
pub(crate) async fn remote(config: &Config, mode: Mode) -> Result<Arc<dyn RemoteLedger>> {
    match mode {
        Mode::Remote => Ok(Arc::new(http::HttpLedger::new(config).await?)),
        Mode::Test => Ok(Arc::new(TestLedger::new(config.server_url()))),
    }
}
