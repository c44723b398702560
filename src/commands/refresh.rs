//! The `refresh` command: pull a window of remote data into the local mirror.

use crate::api::Mode;
use crate::args::RefreshArgs;
use crate::commands::{mirror, Out};
use crate::mirror::RefreshOutcome;
use crate::{Config, Result};
use serde::Serialize;
use tracing::debug;

/// Structured output of one refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub fresh: bool,
    pub pages: u32,
    pub legs: usize,
    pub error: Option<String>,
}

pub async fn refresh(config: Config, mode: Mode, args: RefreshArgs) -> Result<Out<RefreshSummary>> {
    let range = args.window().range()?;
    let kind = args.window().kind();

    // An unscoped refresh replaces the entire mirror; snapshot the database first.
    if range.is_none() {
        let backup_path = config.backup().copy_sqlite().await?;
        debug!("Saved database backup to {}", backup_path.display());
    }

    let mirror = mirror(&config, mode).await?;
    match mirror.refresh_window(range.as_ref(), kind).await? {
        RefreshOutcome::Fresh { pages, legs } => Ok(Out::new(
            format!("Mirrored {legs} transaction leg(s) across {pages} page(s)"),
            RefreshSummary {
                fresh: true,
                pages,
                legs,
                error: None,
            },
        )),
        RefreshOutcome::StaleFallback { error } => Ok(Out::new(
            "Server unreachable; the previously mirrored data is still available".to_string(),
            RefreshSummary {
                fresh: false,
                pages: 0,
                legs: 0,
                error: Some(error),
            },
        )),
    }
}
