//! The `search` command: local-first text search with conditional remote merge.

use crate::api::Mode;
use crate::args::SearchArgs;
use crate::commands::{mirror, Out};
use crate::mirror::SearchMerge;
use crate::model::TransactionLeg;
use crate::{Config, Result};
use tracing::debug;

pub async fn search(
    config: Config,
    mode: Mode,
    args: SearchArgs,
) -> Result<Out<Vec<TransactionLeg>>> {
    let mirror = mirror(&config, mode).await?;
    let result = mirror.search(args.query()).await?;

    // The engine returns the local page immediately and merges remote matches in the
    // background. The CLI is a one-shot caller, so it waits for the merge and then
    // re-queries to show the final, deduplicated rows.
    let mut rows = result.rows;
    if let Some(handle) = result.remote {
        match handle.await {
            Ok(SearchMerge::Merged { groups }) if groups > 0 => {
                rows = mirror.local_matches(args.query()).await?;
            }
            Ok(SearchMerge::Merged { .. }) => {}
            Ok(SearchMerge::Failed { error }) => {
                debug!("Remote search unavailable; showing local matches only: {error}")
            }
            Err(join_error) => debug!("Remote search task failed: {join_error}"),
        }
    }

    let message = match rows.len() {
        0 => format!("No transactions match '{}'", args.query()),
        1 => format!("1 transaction matches '{}'", args.query()),
        n => format!("{n} transactions match '{}'", args.query()),
    };
    Ok(Out::new(message, rows))
}
