//! The `delete` command: remote-authoritative delete with local reconciliation.

use crate::api::Mode;
use crate::args::DeleteArgs;
use crate::commands::{mirror, Out};
use crate::mirror::DeleteOutcome;
use crate::{Config, Result};
use anyhow::bail;
use serde::Serialize;

/// Structured output of a delete that removed the local copy.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteSummary {
    pub journal_id: i64,
    pub acknowledged: bool,
    pub status: Option<u16>,
}

pub async fn delete(config: Config, mode: Mode, args: DeleteArgs) -> Result<Out<DeleteSummary>> {
    let mirror = mirror(&config, mode).await?;
    let journal_id = args.id();
    match mirror.delete_by_id(journal_id).await? {
        DeleteOutcome::Deleted {
            acknowledged,
            status,
        } => {
            let message = match (acknowledged, status) {
                (true, _) => format!("Transaction {journal_id} deleted"),
                (false, Some(status)) => format!(
                    "Transaction {journal_id} deleted locally; the server answered {status}"
                ),
                (false, None) => format!(
                    "Transaction {journal_id} deleted locally; the server did not respond"
                ),
            };
            Ok(Out::new(
                message,
                DeleteSummary {
                    journal_id,
                    acknowledged,
                    status,
                },
            ))
        }
        // The client cannot tell a revoked token from a real authorization failure, so
        // nothing was touched locally.
        DeleteOutcome::Retained { status } => bail!(
            "The server answered {status} for transaction {journal_id}; \
             the local copy was left untouched"
        ),
    }
}
