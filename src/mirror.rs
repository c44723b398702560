//! The read side of the sync engine: pulls paginated remote data for a window, replaces
//! the matching local slice, and serves cached aggregate queries from the local ledger.
//!
//! The mirror is best-effort: a refresh that cannot reach the server is a no-op and the
//! previously cached slice is served. Failures are not discarded silently though; every
//! read-through reports whether it served fresh or stale data so callers and tests can
//! tell which branch was taken.

use crate::api::{RemoteGroup, RemoteLedger};
use crate::config::DeletePolicy;
use crate::db::{Db, LedgerGroup};
use crate::model::{
    Amount, AttachmentRecord, DateRange, KindFilter, NamedSum, TransactionLeg, WindowKey,
};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Whether a window operation served remote-fresh data or fell back to the cached slice.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum RefreshOutcome {
    Fresh { pages: u32, legs: usize },
    StaleFallback { error: String },
}

impl RefreshOutcome {
    pub(crate) fn is_fresh(&self) -> bool {
        matches!(self, RefreshOutcome::Fresh { .. })
    }
}

/// An aggregate query result plus the freshness of the window it was computed from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct Refreshed<T> {
    pub value: T,
    pub freshness: RefreshOutcome,
}

/// How a remote-authoritative delete ended.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum DeleteOutcome {
    /// The local copy was removed. `acknowledged` is false when the server's answer (or
    /// lack of one) was not a configured success status; the local row is still removed
    /// rather than left orphaned, accepting the small risk of a phantom remote record.
    Deleted {
        acknowledged: bool,
        status: Option<u16>,
    },
    /// The server's answer means the client cannot tell a revoked token from a real
    /// authorization failure; the local copy is deliberately left untouched.
    Retained { status: u16 },
}

/// The result of one remote search merge.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum SearchMerge {
    Merged { groups: usize },
    Failed { error: String },
}

/// A text search result: the local rows, served immediately, plus the handle of the
/// remote merge when one was issued. The merge lands asynchronously; re-querying after
/// it completes yields the merged rows, deduplicated by journal id. Dropping the handle
/// abandons nothing mid-write, since the merge applies one atomic upsert per group.
pub(crate) struct SearchResult {
    pub rows: Vec<TransactionLeg>,
    pub remote: Option<JoinHandle<SearchMerge>>,
}

pub(crate) struct Mirror {
    db: Db,
    remote: Arc<dyn RemoteLedger>,
    delete_policy: DeletePolicy,
    /// Per-window refresh locks: two refreshes of the same window must not interleave
    /// their delete/insert phases. Different windows refresh in parallel.
    windows: Mutex<HashMap<WindowKey, Arc<Mutex<()>>>>,
}

impl Mirror {
    pub(crate) fn new(db: Db, remote: Arc<dyn RemoteLedger>, delete_policy: DeletePolicy) -> Self {
        Self {
            db,
            remote,
            delete_policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches the remote listing for `(range, kind)` and replaces the matching local
    /// slice. Pagination is fetched sequentially; the replace itself is one atomic unit.
    /// An absent `range` replaces the entire mirror. On any remote failure the cached
    /// slice stays as-is.
    pub(crate) async fn refresh_window(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
    ) -> Result<RefreshOutcome> {
        let key = WindowKey::new(range.copied(), kind);
        let lock = self.window_lock(key).await;
        let _guard = lock.lock().await;

        let first = match self.remote.list_page(range, kind, 1).await {
            Ok(page) => page,
            Err(error) => return Ok(stale(error)),
        };
        let total_pages = first.meta.pagination.total_pages;
        let mut groups = first.data;
        for page in 2..=total_pages {
            match self.remote.list_page(range, kind, page).await {
                Ok(mut next) => groups.append(&mut next.data),
                Err(error) => return Ok(stale(error)),
            }
        }

        let mut stored = Vec::with_capacity(groups.len());
        for group in &groups {
            match to_ledger_group(group) {
                Ok(converted) => stored.push(converted),
                // Rows we cannot faithfully mirror invalidate the whole fetch; the
                // cached slice is better than a partial one.
                Err(error) => return Ok(stale(error)),
            }
        }
        let legs = stored.iter().map(|g| g.legs.len()).sum();
        self.db.replace_slice(range, kind, &stored).await?;
        Ok(RefreshOutcome::Fresh {
            pages: total_pages,
            legs,
        })
    }

    /// The number of legs in the window, read-through refreshed.
    pub(crate) async fn count(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
    ) -> Result<Refreshed<u64>> {
        let freshness = self.refresh_for_read(range, kind).await?;
        let value = self.db.count_in_window(range, kind).await?;
        Ok(Refreshed { value, freshness })
    }

    /// The sum of one currency's legs in the window, read-through refreshed.
    pub(crate) async fn sum_by_currency(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        currency_code: &str,
    ) -> Result<Refreshed<Amount>> {
        let freshness = self.refresh_for_read(range, kind).await?;
        let value = self.db.sum_for_currency(range, kind, currency_code).await?;
        Ok(Refreshed { value, freshness })
    }

    /// The sum of the legs carrying a tag, read-through refreshed.
    pub(crate) async fn sum_by_tag(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        currency_code: &str,
        tag: &str,
    ) -> Result<Refreshed<Amount>> {
        let freshness = self.refresh_for_read(range, kind).await?;
        let value = self.db.sum_for_tag(range, kind, currency_code, tag).await?;
        Ok(Refreshed { value, freshness })
    }

    /// The sum of the legs assigned to a budget, read-through refreshed.
    pub(crate) async fn sum_by_budget(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        currency_code: &str,
        budget: &str,
    ) -> Result<Refreshed<Amount>> {
        let freshness = self.refresh_for_read(range, kind).await?;
        let value = self
            .db
            .sum_for_budget(range, kind, currency_code, budget)
            .await?;
        Ok(Refreshed { value, freshness })
    }

    /// The distinct categories in the window with their sums, read-through refreshed.
    pub(crate) async fn categories(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        currency_code: &str,
    ) -> Result<Refreshed<Vec<NamedSum>>> {
        let freshness = self.refresh_for_read(range, kind).await?;
        let value = self
            .db
            .categories_with_sums(range, kind, currency_code)
            .await?;
        Ok(Refreshed { value, freshness })
    }

    /// The distinct budgets in the window with their sums, read-through refreshed.
    pub(crate) async fn budgets(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
        currency_code: &str,
    ) -> Result<Refreshed<Vec<NamedSum>>> {
        let freshness = self.refresh_for_read(range, kind).await?;
        let value = self.db.budgets_with_sums(range, kind, currency_code).await?;
        Ok(Refreshed { value, freshness })
    }

    /// The distinct account names in the window, read-through refreshed.
    pub(crate) async fn accounts(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
    ) -> Result<Refreshed<Vec<String>>> {
        let freshness = self.refresh_for_read(range, kind).await?;
        let value = self.db.distinct_accounts(range, kind).await?;
        Ok(Refreshed { value, freshness })
    }

    /// Deletes a transaction remotely and reconciles the local copy according to the
    /// configured status policy.
    pub(crate) async fn delete_by_id(&self, journal_id: i64) -> Result<DeleteOutcome> {
        match self.remote.delete_by_id(journal_id).await {
            Ok(status) if self.delete_policy.retains_local(status) => {
                debug!("Delete of {journal_id} answered {status}; local copy retained");
                Ok(DeleteOutcome::Retained { status })
            }
            Ok(status) => {
                self.db.delete_journal(journal_id).await?;
                Ok(DeleteOutcome::Deleted {
                    acknowledged: self.delete_policy.is_success(status),
                    status: Some(status),
                })
            }
            Err(error) => {
                // No response obtained. Deleting the local copy anyway avoids orphaned
                // local rows at the cost of a possible phantom remote record.
                debug!("Delete of {journal_id} got no response: {error:#}");
                self.db.delete_journal(journal_id).await?;
                Ok(DeleteOutcome::Deleted {
                    acknowledged: false,
                    status: None,
                })
            }
        }
    }

    /// Substring search over the local mirror. Queries longer than three characters also
    /// issue a remote search whose results merge into the mirror as they arrive; the
    /// local rows are returned immediately either way. Remote failures are swallowed and
    /// the local result stands.
    pub(crate) async fn search(&self, query: &str) -> Result<SearchResult> {
        let rows = self.db.search_descriptions(query).await?;
        let remote = if query.chars().count() > 3 {
            let db = self.db.clone();
            let remote = self.remote.clone();
            let query = query.to_string();
            Some(tokio::spawn(merge_remote_search(db, remote, query)))
        } else {
            None
        };
        Ok(SearchResult { rows, remote })
    }

    /// The local substring matches only, with no remote interaction. Useful after a
    /// merge has landed.
    pub(crate) async fn local_matches(&self, query: &str) -> Result<Vec<TransactionLeg>> {
        self.db.search_descriptions(query).await
    }

    /// The attachment rows for one journal id, read-through refreshed: a reachable
    /// server replaces the cached rows, an unreachable one leaves them standing.
    pub(crate) async fn attachments(&self, journal_id: i64) -> Result<Vec<AttachmentRecord>> {
        match self.remote.attachments_for_journal(journal_id).await {
            Ok(records) => self.db.replace_attachments(journal_id, &records).await?,
            Err(error) => {
                debug!("Attachment refresh failed; serving cached rows: {error:#}")
            }
        }
        self.db.attachments_for_journal(journal_id).await
    }

    /// The implicit refresh in front of every aggregate read.
    async fn refresh_for_read(
        &self,
        range: Option<&DateRange>,
        kind: KindFilter,
    ) -> Result<RefreshOutcome> {
        let freshness = self.refresh_window(range, kind).await?;
        if let RefreshOutcome::StaleFallback { error } = &freshness {
            debug!("Serving cached slice; refresh failed: {error}");
        }
        Ok(freshness)
    }

    async fn window_lock(&self, key: WindowKey) -> Arc<Mutex<()>> {
        let mut map = self.windows.lock().await;
        map.entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn stale(error: crate::Error) -> RefreshOutcome {
    debug!("Mirror refresh failed; cached slice stands: {error:#}");
    RefreshOutcome::StaleFallback {
        error: format!("{error:#}"),
    }
}

fn to_ledger_group(group: &RemoteGroup) -> Result<LedgerGroup> {
    let legs = group
        .attributes
        .transactions
        .iter()
        .map(|leg| leg.to_leg())
        .collect::<Result<Vec<TransactionLeg>>>()?;
    Ok(LedgerGroup {
        group_id: group.id,
        title: group.attributes.group_title.clone(),
        legs,
    })
}

/// The asynchronous half of a text search: merge matching remote groups into the local
/// mirror as they arrive. Duplicate journal ids collapse via upsert.
async fn merge_remote_search(
    db: Db,
    remote: Arc<dyn RemoteLedger>,
    query: String,
) -> SearchMerge {
    let page = match remote.search_text(&query).await {
        Ok(page) => page,
        Err(error) => {
            debug!("Remote search failed; local result stands: {error:#}");
            return SearchMerge::Failed {
                error: format!("{error:#}"),
            };
        }
    };
    let mut merged = 0;
    for group in &page.data {
        let stored = match to_ledger_group(group) {
            Ok(stored) => stored,
            Err(error) => {
                debug!("Skipping unparseable search result: {error:#}");
                continue;
            }
        };
        match db.upsert_group(&stored).await {
            Ok(()) => merged += 1,
            Err(error) => {
                return SearchMerge::Failed {
                    error: format!("{error:#}"),
                }
            }
        }
    }
    SearchMerge::Merged { groups: merged }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{GroupAttributes, InjectedFailure, RecordedCall, RemoteLeg, TestLedger};
    use crate::model::TransactionKind;
    use std::str::FromStr;
    use tempfile::TempDir;
    use uuid::Uuid;

    struct Rig {
        _dir: TempDir,
        db: Db,
        ledger: TestLedger,
        mirror: Mirror,
    }

    async fn rig() -> Rig {
        let dir = TempDir::new().unwrap();
        let db = Db::init(dir.path().join("test.sqlite")).await.unwrap();
        let key = format!("https://ledger-{}.example.com", Uuid::new_v4());
        let ledger = TestLedger::new(&key);
        ledger.set_state(Default::default());
        let mirror = Mirror::new(
            db.clone(),
            Arc::new(TestLedger::new(&key)),
            DeletePolicy::default(),
        );
        Rig {
            _dir: dir,
            db,
            ledger,
            mirror,
        }
    }

    fn remote_leg(journal_id: i64, date: &str, description: &str) -> RemoteLeg {
        RemoteLeg {
            transaction_journal_id: journal_id,
            kind: TransactionKind::Withdrawal,
            amount: Amount::from_str("-10.00").unwrap(),
            description: description.to_string(),
            date: date.to_string(),
            destination_name: "Grocer".to_string(),
            currency_code: "USD".to_string(),
            ..RemoteLeg::default()
        }
    }

    fn remote_group(id: i64, title: &str, legs: Vec<RemoteLeg>) -> RemoteGroup {
        RemoteGroup {
            id,
            attributes: GroupAttributes {
                group_title: title.to_string(),
                transactions: legs,
            },
        }
    }

    fn march() -> DateRange {
        DateRange::new("2024-03-01".parse().unwrap(), "2024-03-31".parse().unwrap())
    }

    fn april() -> DateRange {
        DateRange::new("2024-04-01".parse().unwrap(), "2024-04-30".parse().unwrap())
    }

    #[tokio::test]
    async fn test_refresh_replaces_slice() {
        let rig = rig().await;
        let mut state = rig.ledger.get_state();
        state.groups = vec![remote_group(
            1,
            "Groceries",
            vec![remote_leg(101, "2024-03-05T12:00:00Z", "Whole Foods")],
        )];
        rig.ledger.set_state(state);

        let outcome = rig
            .mirror
            .refresh_window(Some(&march()), KindFilter::All)
            .await
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::Fresh { pages: 1, legs: 1 });
        assert!(rig.db.leg_by_journal(101).await.unwrap().is_some());

        // The server forgets the row; the next refresh removes the local copy too.
        let mut state = rig.ledger.get_state();
        state.groups.clear();
        rig.ledger.set_state(state);
        rig.mirror
            .refresh_window(Some(&march()), KindFilter::All)
            .await
            .unwrap();
        assert!(rig.db.leg_by_journal(101).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_fetches_all_pages_sequentially() {
        let rig = rig().await;
        let mut state = rig.ledger.get_state();
        state.page_size = 1;
        state.groups = vec![
            remote_group(
                1,
                "A",
                vec![remote_leg(101, "2024-03-05T12:00:00Z", "one")],
            ),
            remote_group(
                2,
                "B",
                vec![remote_leg(102, "2024-03-06T12:00:00Z", "two")],
            ),
            remote_group(
                3,
                "C",
                vec![remote_leg(103, "2024-03-07T12:00:00Z", "three")],
            ),
        ];
        rig.ledger.set_state(state);

        let outcome = rig
            .mirror
            .refresh_window(Some(&march()), KindFilter::All)
            .await
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::Fresh { pages: 3, legs: 3 });
        for journal_id in [101, 102, 103] {
            assert!(rig.db.leg_by_journal(journal_id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_refresh_failure_serves_stale_slice() {
        let rig = rig().await;
        let mut state = rig.ledger.get_state();
        state.groups = vec![remote_group(
            1,
            "Groceries",
            vec![remote_leg(101, "2024-03-05T12:00:00Z", "Whole Foods")],
        )];
        rig.ledger.set_state(state);
        rig.mirror
            .refresh_window(Some(&march()), KindFilter::All)
            .await
            .unwrap();

        let mut state = rig.ledger.get_state();
        state.fail_next = Some(InjectedFailure::Network);
        rig.ledger.set_state(state);

        let outcome = rig
            .mirror
            .refresh_window(Some(&march()), KindFilter::All)
            .await
            .unwrap();
        assert!(matches!(outcome, RefreshOutcome::StaleFallback { .. }));
        // The previously cached slice stands.
        assert!(rig.db.leg_by_journal(101).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_disjoint_windows_refresh_concurrently() {
        let rig = rig().await;
        let mut state = rig.ledger.get_state();
        state.groups = vec![
            remote_group(
                1,
                "March",
                vec![remote_leg(101, "2024-03-05T12:00:00Z", "march spend")],
            ),
            remote_group(
                2,
                "April",
                vec![remote_leg(201, "2024-04-05T12:00:00Z", "april spend")],
            ),
        ];
        rig.ledger.set_state(state);

        let march_range = march();
        let april_range = april();
        let (first, second) = tokio::join!(
            rig.mirror.refresh_window(Some(&march_range), KindFilter::All),
            rig.mirror.refresh_window(Some(&april_range), KindFilter::All),
        );
        assert!(first.unwrap().is_fresh());
        assert!(second.unwrap().is_fresh());

        // Neither window's rows leaked into the other slice.
        let march_leg = rig.db.leg_by_journal(101).await.unwrap().unwrap();
        assert_eq!(march_leg.description, "march spend");
        let april_leg = rig.db.leg_by_journal(201).await.unwrap().unwrap();
        assert_eq!(april_leg.description, "april spend");
        assert_eq!(
            rig.db
                .count_in_window(Some(&march()), KindFilter::All)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            rig.db
                .count_in_window(Some(&april()), KindFilter::All)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_aggregates_read_through() {
        let rig = rig().await;
        let mut state = rig.ledger.get_state();
        let mut tagged = remote_leg(101, "2024-03-05T12:00:00Z", "Whole Foods");
        tagged.tags = vec!["groceries".to_string()];
        tagged.category_name = Some("Food".to_string());
        tagged.budget_name = Some("Monthly".to_string());
        state.groups = vec![remote_group(1, "Groceries", vec![tagged])];
        rig.ledger.set_state(state);

        // No explicit refresh call: the aggregate refreshes its own window.
        let count = rig.mirror.count(Some(&march()), KindFilter::All).await.unwrap();
        assert_eq!(count.value, 1);
        assert!(count.freshness.is_fresh());

        let sum = rig
            .mirror
            .sum_by_currency(Some(&march()), KindFilter::All, "USD")
            .await
            .unwrap();
        assert_eq!(sum.value.to_string(), "-10.00");

        let tagged_sum = rig
            .mirror
            .sum_by_tag(Some(&march()), KindFilter::All, "USD", "groceries")
            .await
            .unwrap();
        assert_eq!(tagged_sum.value.to_string(), "-10.00");

        let categories = rig
            .mirror
            .categories(Some(&march()), KindFilter::All, "USD")
            .await
            .unwrap();
        assert_eq!(categories.value.len(), 1);
        assert_eq!(categories.value[0].name, "Food");

        // With the server down, the same query serves the cached slice.
        let mut state = rig.ledger.get_state();
        state.fail_next = Some(InjectedFailure::Network);
        rig.ledger.set_state(state);
        let cached = rig.mirror.count(Some(&march()), KindFilter::All).await.unwrap();
        assert_eq!(cached.value, 1);
        assert!(!cached.freshness.is_fresh());
    }

    async fn seed_one_local_row(rig: &Rig) {
        let mut state = rig.ledger.get_state();
        state.groups = vec![remote_group(
            1,
            "Groceries",
            vec![remote_leg(101, "2024-03-05T12:00:00Z", "Whole Foods")],
        )];
        rig.ledger.set_state(state);
        rig.mirror
            .refresh_window(Some(&march()), KindFilter::All)
            .await
            .unwrap();
        assert!(rig.db.leg_by_journal(101).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_status_matrix() {
        for status in [204u16, 404, 500] {
            let rig = rig().await;
            seed_one_local_row(&rig).await;
            let mut state = rig.ledger.get_state();
            state.delete_status = status;
            rig.ledger.set_state(state);

            let outcome = rig.mirror.delete_by_id(101).await.unwrap();
            assert_eq!(
                outcome,
                DeleteOutcome::Deleted {
                    acknowledged: true,
                    status: Some(status),
                },
                "status {status} must delete the local copy"
            );
            assert!(rig.db.leg_by_journal(101).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_delete_unauthorized_retains_local_copy() {
        let rig = rig().await;
        seed_one_local_row(&rig).await;
        let mut state = rig.ledger.get_state();
        state.delete_status = 401;
        rig.ledger.set_state(state);

        let outcome = rig.mirror.delete_by_id(101).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Retained { status: 401 });
        assert!(rig.db.leg_by_journal(101).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_unknown_status_and_transport_failure() {
        let rig1 = rig().await;
        seed_one_local_row(&rig1).await;
        let mut state = rig1.ledger.get_state();
        state.delete_status = 418;
        rig1.ledger.set_state(state);
        let outcome = rig1.mirror.delete_by_id(101).await.unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome::Deleted {
                acknowledged: false,
                status: Some(418),
            }
        );
        assert!(rig1.db.leg_by_journal(101).await.unwrap().is_none());

        let rig2 = rig().await;
        seed_one_local_row(&rig2).await;
        let mut state = rig2.ledger.get_state();
        state.fail_next = Some(InjectedFailure::Network);
        rig2.ledger.set_state(state);
        let outcome = rig2.mirror.delete_by_id(101).await.unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome::Deleted {
                acknowledged: false,
                status: None,
            }
        );
        assert!(rig2.db.leg_by_journal(101).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_query_never_issues_remote_call() {
        let rig = rig().await;
        seed_one_local_row(&rig).await;

        let result = rig.mirror.search("ods").await.unwrap();
        assert!(result.remote.is_none());
        assert_eq!(result.rows.len(), 1);
        let state = rig.ledger.get_state();
        assert!(!state
            .calls
            .iter()
            .any(|call| matches!(call, RecordedCall::Search { .. })));
    }

    #[tokio::test]
    async fn test_long_query_merges_without_duplicates() {
        let rig = rig().await;
        seed_one_local_row(&rig).await;
        // The server knows one more matching group, plus the one already mirrored.
        let mut state = rig.ledger.get_state();
        state.groups.push(remote_group(
            2,
            "More food",
            vec![remote_leg(102, "2024-03-09T12:00:00Z", "Foods Galore")],
        ));
        rig.ledger.set_state(state);

        let result = rig.mirror.search("foods").await.unwrap();
        // The local page is served immediately.
        assert_eq!(result.rows.len(), 1);
        let merge = result.remote.unwrap().await.unwrap();
        assert_eq!(merge, SearchMerge::Merged { groups: 2 });

        // After the merge lands, re-querying yields both rows, with no duplicate for
        // journal id 101.
        let rows = rig.db.search_descriptions("oods").await.unwrap();
        let mut journal_ids: Vec<i64> = rows.iter().map(|leg| leg.journal_id).collect();
        journal_ids.sort_unstable();
        assert_eq!(journal_ids, vec![101, 102]);
    }

    #[tokio::test]
    async fn test_remote_search_failure_is_swallowed() {
        let rig = rig().await;
        seed_one_local_row(&rig).await;
        let mut state = rig.ledger.get_state();
        state.fail_next = Some(InjectedFailure::Network);
        rig.ledger.set_state(state);

        let result = rig.mirror.search("foods").await.unwrap();
        assert_eq!(result.rows.len(), 1);
        let merge = result.remote.unwrap().await.unwrap();
        assert!(matches!(merge, SearchMerge::Failed { .. }));
        // The local result stands.
        assert!(rig.db.leg_by_journal(101).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_attachment_read_through() {
        let rig = rig().await;
        let record = AttachmentRecord {
            attachment_id: 11,
            journal_id: 101,
            filename: "receipt.jpg".to_string(),
            download_url: None,
            size_bytes: Some(2048),
        };
        let mut state = rig.ledger.get_state();
        state.attachments.insert(101, vec![record.clone()]);
        rig.ledger.set_state(state);

        let rows = rig.mirror.attachments(101).await.unwrap();
        assert_eq!(rows, vec![record.clone()]);

        // Server unreachable: the cached rows are served.
        let mut state = rig.ledger.get_state();
        state.attachments.clear();
        state.fail_next = Some(InjectedFailure::Network);
        rig.ledger.set_state(state);
        let rows = rig.mirror.attachments(101).await.unwrap();
        assert_eq!(rows, vec![record]);
    }
}
