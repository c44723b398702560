//! The `submit`, `retry` and `pending` commands: push staged groups to the server.

use crate::api::Mode;
use crate::args::SubmitArgs;
use crate::commands::{outbox, Out};
use crate::model::PendingSubmission;
use crate::outbox::SubmitOutcome;
use crate::{Config, Result};
use anyhow::bail;
use serde::Serialize;
use tracing::warn;

/// Structured output of a submission that reached a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitSummary {
    pub master_id: i64,
    /// The server-assigned group id, absent when the submission was deferred.
    pub group_id: Option<i64>,
    /// The server-assigned journal ids, in staging order.
    pub journal_ids: Vec<i64>,
    pub deferred: bool,
}

pub async fn submit(config: Config, mode: Mode, args: SubmitArgs) -> Result<Out<SubmitSummary>> {
    let outbox = outbox(&config, mode).await?;
    let master_id = args.master_id();
    match outbox.submit_group(master_id, args.title()).await? {
        SubmitOutcome::Committed {
            group_id,
            journal_ids,
        } => {
            let message = format!(
                "Transaction '{}' added as group {group_id} ({} legs)",
                args.title(),
                journal_ids.len()
            );
            Ok(Out::new(
                message,
                SubmitSummary {
                    master_id,
                    group_id: Some(group_id),
                    journal_ids,
                    deferred: false,
                },
            ))
        }
        // Deferred is success from the user's point of view: the data is saved locally
        // and will sync when the server is reachable again.
        SubmitOutcome::PendingRetry => Ok(Out::new(
            format!(
                "'{}' saved; it will sync when the server is reachable",
                args.title()
            ),
            SubmitSummary {
                master_id,
                group_id: None,
                journal_ids: Vec::new(),
                deferred: true,
            },
        )),
        SubmitOutcome::Rejected { message } => bail!("{message}"),
    }
}

/// Structured output of one `retry` run.
#[derive(Debug, Clone, Serialize)]
pub struct RetrySummary {
    pub committed: Vec<i64>,
    pub rejected: Vec<i64>,
    pub still_pending: Vec<i64>,
}

/// Re-attempts every persisted pending submission through the coordinator. This command
/// is the CLI stand-in for the external retry scheduler.
pub async fn retry(config: Config, mode: Mode) -> Result<Out<RetrySummary>> {
    let outbox = outbox(&config, mode).await?;
    let pending = config.db().pending_submissions().await?;
    if pending.is_empty() {
        return Ok(Out::new_message("Nothing is queued for retry"));
    }

    let mut summary = RetrySummary {
        committed: Vec::new(),
        rejected: Vec::new(),
        still_pending: Vec::new(),
    };
    for submission in &pending {
        match outbox.resume_submission(submission).await? {
            SubmitOutcome::Committed { .. } => summary.committed.push(submission.master_id),
            SubmitOutcome::PendingRetry => summary.still_pending.push(submission.master_id),
            SubmitOutcome::Rejected { message } => {
                warn!(
                    "'{}' was rejected by the server: {message}",
                    submission.group_title
                );
                summary.rejected.push(submission.master_id);
            }
        }
    }

    let message = format!(
        "Retried {} submission{}: {} committed, {} rejected, {} still pending",
        pending.len(),
        if pending.len() == 1 { "" } else { "s" },
        summary.committed.len(),
        summary.rejected.len(),
        summary.still_pending.len()
    );
    Ok(Out::new(message, summary))
}

/// Lists the submissions queued for retry.
pub async fn pending(config: Config) -> Result<Out<Vec<PendingSubmission>>> {
    let pending = config.db().pending_submissions().await?;
    let message = match pending.len() {
        0 => "Nothing is queued for retry".to_string(),
        1 => "1 submission is queued for retry".to_string(),
        n => format!("{n} submissions are queued for retry"),
    };
    Ok(Out::new(message, pending))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InjectedFailure;
    use crate::commands::stage;
    use crate::model::{Amount, TransactionKind};
    use crate::test::TestEnv;
    use std::str::FromStr;

    async fn stage_two_legs(env: &TestEnv, master_id: i64) {
        for amount in ["-10.00", "-5.00"] {
            let args = crate::args::StageArgs::new(
                master_id,
                TransactionKind::Withdrawal,
                Amount::from_str(amount).unwrap(),
                "Groceries run",
                "2026-08-05".parse().unwrap(),
                "Grocer",
                "USD",
            );
            stage(env.config(), args).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_submit_success() {
        let env = TestEnv::new().await;
        stage_two_legs(&env, 7).await;

        let out = submit(env.config(), Mode::Test, SubmitArgs::new(7, "Groceries"))
            .await
            .unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.journal_ids, vec![101, 102]);
        assert!(!summary.deferred);
        assert_eq!(env.config().db().draft_count(7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_submit_offline_reports_deferred_success() {
        let env = TestEnv::new().await;
        stage_two_legs(&env, 7).await;
        let mut state = env.ledger().get_state();
        state.fail_next = Some(InjectedFailure::Network);
        env.ledger().set_state(state);

        let out = submit(env.config(), Mode::Test, SubmitArgs::new(7, "Groceries"))
            .await
            .unwrap();
        assert!(out.structure().unwrap().deferred);
        assert!(out.message().contains("saved"));

        let listed = pending(env.config()).await.unwrap();
        assert_eq!(listed.structure().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_rejection_is_an_error() {
        let env = TestEnv::new().await;
        stage_two_legs(&env, 7).await;
        let mut state = env.ledger().get_state();
        state.fail_next = Some(InjectedFailure::Status {
            status: 422,
            body: r#"{"errors":{"transactions_destination_name":["Unknown account"]}}"#
                .to_string(),
        });
        env.ledger().set_state(state);

        let result = submit(env.config(), Mode::Test, SubmitArgs::new(7, "Groceries")).await;
        let error = result.unwrap_err();
        assert_eq!(error.to_string(), "Unknown account");
        // The draft survives rejection so the user can correct and resubmit.
        assert_eq!(env.config().db().draft_count(7).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_retry_drains_the_queue() {
        let env = TestEnv::new().await;
        stage_two_legs(&env, 7).await;
        let mut state = env.ledger().get_state();
        state.fail_next = Some(InjectedFailure::Network);
        env.ledger().set_state(state);
        submit(env.config(), Mode::Test, SubmitArgs::new(7, "Groceries"))
            .await
            .unwrap();

        // Connectivity is back.
        let out = retry(env.config(), Mode::Test).await.unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.committed, vec![7]);
        assert!(summary.still_pending.is_empty());
        assert!(pending(env.config())
            .await
            .unwrap()
            .structure()
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_retry_with_empty_queue() {
        let env = TestEnv::new().await;
        let out = retry(env.config(), Mode::Test).await.unwrap();
        assert!(out.message().contains("Nothing"));
    }
}
