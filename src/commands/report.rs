//! The `report` command: aggregate queries over the mirrored transactions.
//!
//! Every report refreshes its own window read-through first, so it serves remote-fresh
//! numbers when the server is reachable and the last-known numbers otherwise.

use crate::api::Mode;
use crate::args::{ReportArgs, ReportSubcommand};
use crate::commands::{mirror, Out};
use crate::mirror::{RefreshOutcome, Refreshed};
use crate::{Config, Result};
use serde::Serialize;
use std::fmt::Debug;

pub async fn report(
    config: Config,
    mode: Mode,
    args: ReportArgs,
) -> Result<Out<serde_json::Value>> {
    let mirror = mirror(&config, mode).await?;
    match args.report() {
        ReportSubcommand::Count { window } => {
            let result = mirror.count(window.range()?.as_ref(), window.kind()).await?;
            out("transactions", result)
        }
        ReportSubcommand::SumCurrency { window, currency } => {
            let result = mirror
                .sum_by_currency(window.range()?.as_ref(), window.kind(), currency)
                .await?;
            out(&format!("{currency} total"), result)
        }
        ReportSubcommand::SumTag {
            window,
            currency,
            tag,
        } => {
            let result = mirror
                .sum_by_tag(window.range()?.as_ref(), window.kind(), currency, tag)
                .await?;
            out(&format!("{currency} total for tag '{tag}'"), result)
        }
        ReportSubcommand::SumBudget {
            window,
            currency,
            budget,
        } => {
            let result = mirror
                .sum_by_budget(window.range()?.as_ref(), window.kind(), currency, budget)
                .await?;
            out(&format!("{currency} total for budget '{budget}'"), result)
        }
        ReportSubcommand::Categories { window, currency } => {
            let result = mirror
                .categories(window.range()?.as_ref(), window.kind(), currency)
                .await?;
            out("categories", result)
        }
        ReportSubcommand::Budgets { window, currency } => {
            let result = mirror
                .budgets(window.range()?.as_ref(), window.kind(), currency)
                .await?;
            out("budgets", result)
        }
        ReportSubcommand::Accounts { window } => {
            let result = mirror.accounts(window.range()?.as_ref(), window.kind()).await?;
            out("accounts", result)
        }
    }
}

fn out<T>(label: &str, result: Refreshed<T>) -> Result<Out<serde_json::Value>>
where
    T: Serialize + Clone + Debug,
{
    let staleness = match &result.freshness {
        RefreshOutcome::Fresh { .. } => "",
        RefreshOutcome::StaleFallback { .. } => " (cached; server unreachable)",
    };
    let value = serde_json::to_value(&result.value)?;
    let message = format!("{label}: {}{staleness}", render(&value));
    Ok(Out::new(message, value))
}

fn render(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(render)
            .collect::<Vec<String>>()
            .join(", "),
        serde_json::Value::Object(map) => match (map.get("name"), map.get("total")) {
            (Some(name), Some(total)) => format!("{} {}", render(name), render(total)),
            _ => value.to_string(),
        },
        other => other.to_string(),
    }
}
