//! The submission side of the sync engine: assembles a draft group into one grouped
//! remote write, classifies the result, links uploaded attachments back to the
//! server-assigned journal ids, and purges consumed drafts.
//!
//! Per master id the submission runs `Drafting -> Submitting` and lands in exactly one
//! of `Committed`, `PendingRetry` or `Rejected`.

use crate::api::{ApiResponse, ErrorBody, GroupFields, RemoteGroup, RemoteLedger, RemoteSingle};
use crate::db::{Db, LedgerGroup};
use crate::model::{AttachableKind, PendingSubmission, TransactionLeg};
use crate::Result;
use anyhow::bail;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Receives the staged attachment URIs of a committed leg, re-targeted to the
/// server-assigned journal id. The byte-upload transport lives behind this trait.
pub trait AttachmentSink: Send + Sync {
    fn enqueue(&self, uris: Vec<String>, journal_id: i64, kind: AttachableKind);
}

/// The default sink: records the handoff in the log. A real deployment wires in an
/// upload worker here.
pub struct LogAttachmentSink;

impl AttachmentSink for LogAttachmentSink {
    fn enqueue(&self, uris: Vec<String>, journal_id: i64, kind: AttachableKind) {
        info!(
            "{} attachment(s) queued for upload to {kind} journal {journal_id}",
            uris.len()
        );
    }
}

/// How one submission attempt ended.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum SubmitOutcome {
    /// The server accepted the group. The draft was purged and the local ledger updated.
    Committed {
        group_id: i64,
        journal_ids: Vec<i64>,
    },
    /// The server was unreachable. The draft is untouched and a pending submission was
    /// persisted for the retry scheduler; the caller should treat this as "saved, will
    /// sync later".
    PendingRetry,
    /// The server rejected the group with a field error. The draft is retained so the
    /// user can correct and resubmit; purging is the caller's decision.
    Rejected { message: String },
}

pub(crate) struct Outbox {
    db: Db,
    remote: Arc<dyn RemoteLedger>,
    attachments: Arc<dyn AttachmentSink>,
    /// Per-master-id submission locks. Submitting the same master id twice concurrently
    /// would double-create the group; different master ids proceed in parallel.
    in_flight: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl Outbox {
    pub(crate) fn new(
        db: Db,
        remote: Arc<dyn RemoteLedger>,
        attachments: Arc<dyn AttachmentSink>,
    ) -> Self {
        Self {
            db,
            remote,
            attachments,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Submits the draft group staged under `master_id` as one remote write.
    ///
    /// Fails only on an empty group or a local storage error; every remote condition is
    /// classified into a `SubmitOutcome`.
    pub(crate) async fn submit_group(
        &self,
        master_id: i64,
        group_title: &str,
    ) -> Result<SubmitOutcome> {
        let lock = self.master_lock(master_id).await;
        let _guard = lock.lock().await;

        let legs = self.db.legs_for_master(master_id).await?;
        if legs.is_empty() {
            bail!("No staged legs for master id {master_id}");
        }
        let fields = GroupFields::from_legs(&legs);

        match self.remote.create_group(group_title, &fields).await {
            Ok(response) if response.is_success() => {
                match serde_json::from_str::<RemoteSingle>(&response.body) {
                    Ok(single) => self.commit(master_id, &legs, single.data).await,
                    Err(error) => {
                        // A 2xx we cannot parse leaves the remote state unknown. Fail
                        // safe toward retry rather than silent data loss.
                        debug!("Unparseable success body: {error:#}");
                        self.defer(master_id, group_title).await
                    }
                }
            }
            Ok(response) => {
                let message = reject_message(&response);
                // A non-network failure consumes any pending record for this master id.
                self.db.delete_pending(master_id).await?;
                Ok(SubmitOutcome::Rejected { message })
            }
            Err(error) => {
                debug!("Ledger server unreachable: {error:#}");
                self.defer(master_id, group_title).await
            }
        }
    }

    /// Re-attempts a deferred submission. Invoked by the retry scheduler once
    /// connectivity is presumed restored.
    ///
    /// Safe to call even if a previous attempt partially succeeded remotely, provided
    /// the server's group create is idempotent per master id and title; that is an
    /// external contract requirement, not something this engine can guarantee.
    pub(crate) async fn resume_submission(
        &self,
        pending: &PendingSubmission,
    ) -> Result<SubmitOutcome> {
        self.submit_group(pending.master_id, &pending.group_title)
            .await
    }

    /// Clears the transient correlation marker from a committed group via a follow-up
    /// update, so it is not retained as permanent data on the remote record. Cleanup is
    /// best-effort; a failure here never un-commits the submission.
    pub(crate) async fn remove_internal_marker(&self, group: &RemoteGroup) {
        let fields = GroupFields::marker_reset(&group.attributes.transactions);
        match self
            .remote
            .update_group(group.id, &group.attributes.group_title, &fields)
            .await
        {
            Ok(response) if response.is_success() => {}
            Ok(response) => debug!("Marker cleanup rejected with status {}", response.status),
            Err(error) => debug!("Marker cleanup skipped: {error:#}"),
        }
    }

    async fn commit(
        &self,
        master_id: i64,
        staged: &[TransactionLeg],
        group: RemoteGroup,
    ) -> Result<SubmitOutcome> {
        // Hand staged attachments to the upload collaborator, re-targeted from the
        // draft journal id (echoed in the marker) to the server-assigned one.
        let mut had_marker = false;
        for leg in &group.attributes.transactions {
            let Some(marker) = leg.internal_reference.as_deref().filter(|m| !m.is_empty())
            else {
                continue;
            };
            had_marker = true;
            if let Ok(draft_id) = marker.parse::<i64>() {
                let uris = self.db.attachments_for(draft_id).await?;
                if !uris.is_empty() {
                    self.attachments.enqueue(
                        uris,
                        leg.transaction_journal_id,
                        AttachableKind::Transaction,
                    );
                }
            }
        }

        let legs = group
            .attributes
            .transactions
            .iter()
            .map(|leg| leg.to_leg())
            .collect::<Result<Vec<TransactionLeg>>>()?;
        let journal_ids: Vec<i64> = legs.iter().map(|leg| leg.journal_id).collect();
        self.db
            .upsert_group(&LedgerGroup {
                group_id: group.id,
                title: group.attributes.group_title.clone(),
                legs,
            })
            .await?;
        self.db.purge_master(master_id).await?;
        self.db.delete_pending(master_id).await?;

        if had_marker {
            self.remove_internal_marker(&group).await;
        }

        info!(
            "Committed {} leg(s) as remote group {}",
            staged.len(),
            group.id
        );
        Ok(SubmitOutcome::Committed {
            group_id: group.id,
            journal_ids,
        })
    }

    async fn defer(&self, master_id: i64, group_title: &str) -> Result<SubmitOutcome> {
        self.db
            .insert_pending(&PendingSubmission {
                master_id,
                group_title: group_title.to_string(),
                created_at: Utc::now().timestamp(),
            })
            .await?;
        info!("Submission of '{group_title}' deferred until the server is reachable");
        Ok(SubmitOutcome::PendingRetry)
    }

    async fn master_lock(&self, master_id: i64) -> Arc<Mutex<()>> {
        let mut map = self.in_flight.lock().await;
        map.entry(master_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Extracts the user-facing message from a structured rejection.
fn reject_message(response: &ApiResponse) -> String {
    match serde_json::from_str::<ErrorBody>(&response.body) {
        Ok(body) => body
            .first_message()
            .unwrap_or_else(|| "The given data was invalid".to_string()),
        Err(_) => "Error occurred while saving transactions".to_string(),
    }
}
