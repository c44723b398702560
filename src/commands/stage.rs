//! The `stage` command: persist one draft leg in the local draft area.

use crate::args::StageArgs;
use crate::commands::Out;
use crate::model::{normalize_tags, TransactionLeg};
use crate::{Config, Result};
use anyhow::Context;
use chrono::{NaiveTime, TimeZone, Utc};
use serde::Serialize;

/// Structured output of a successful stage.
#[derive(Debug, Clone, Serialize)]
pub struct StagedLeg {
    pub master_id: i64,
    pub journal_id: i64,
    pub legs_staged: u64,
}

pub async fn stage(config: Config, args: StageArgs) -> Result<Out<StagedLeg>> {
    let time = match args.time() {
        Some(time) => parse_time(time)?,
        None => NaiveTime::MIN,
    };
    let date = Utc
        .from_utc_datetime(&args.date().and_time(time));

    let leg = TransactionLeg {
        journal_id: 0, // assigned by the draft store
        amount: args.amount(),
        kind: args.kind(),
        description: args.description().to_string(),
        date,
        source_name: args.source().map(str::to_string),
        destination_name: args.destination().to_string(),
        currency_code: args.currency().to_string(),
        category_name: args.category().map(str::to_string),
        budget_name: args.budget().map(str::to_string),
        bill_name: args.bill().map(str::to_string),
        piggy_bank_name: args.piggy_bank().map(str::to_string),
        tags: normalize_tags(args.tags().unwrap_or_default().split(',')),
        notes: args.notes().map(str::to_string),
        attachments: args.attachments().to_vec(),
    };

    let master_id = args.master_id();
    let journal_id = config.db().stage_leg(master_id, &leg).await?;
    let legs_staged = config.db().draft_count(master_id).await?;
    let message = format!(
        "Staged leg {} of group {master_id} ({legs_staged} leg{} staged)",
        legs_staged,
        if legs_staged == 1 { "" } else { "s" }
    );
    Ok(Out::new(
        message,
        StagedLeg {
            master_id,
            journal_id,
            legs_staged,
        },
    ))
}

fn parse_time(time: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .with_context(|| format!("Invalid time '{time}', expected HH:MM"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, TransactionKind};
    use crate::test::TestEnv;
    use std::str::FromStr;

    fn stage_args(master_id: i64, amount: &str) -> StageArgs {
        StageArgs::new(
            master_id,
            TransactionKind::Withdrawal,
            Amount::from_str(amount).unwrap(),
            "Lunch",
            "2026-08-05".parse().unwrap(),
            "Cafe",
            "USD",
        )
    }

    #[tokio::test]
    async fn test_stage_is_purely_local() {
        let env = TestEnv::new().await;
        let out = stage(env.config(), stage_args(7, "-12.50")).await.unwrap();
        let staged = out.structure().unwrap();
        assert_eq!(staged.master_id, 7);
        assert!(staged.journal_id < 0, "drafts get a draft-space journal id");
        assert_eq!(staged.legs_staged, 1);

        // No API call of any kind was made.
        assert!(env.ledger().get_state().calls.is_empty());
    }

    #[tokio::test]
    async fn test_stage_appends_to_group() {
        let env = TestEnv::new().await;
        stage(env.config(), stage_args(7, "-10.00")).await.unwrap();
        let out = stage(env.config(), stage_args(7, "-5.00")).await.unwrap();
        assert_eq!(out.structure().unwrap().legs_staged, 2);

        let legs = env.config().db().legs_for_master(7).await.unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].amount.to_string(), "-10.00");
        assert_eq!(legs[1].amount.to_string(), "-5.00");
    }

    #[tokio::test]
    async fn test_stage_with_time_and_tags() {
        let env = TestEnv::new().await;
        let args = stage_args(3, "-1.00")
            .with_time("14:30")
            .with_tags("food, lunch, food");
        stage(env.config(), args).await.unwrap();

        let legs = env.config().db().legs_for_master(3).await.unwrap();
        assert_eq!(legs[0].tags, vec!["food".to_string(), "lunch".to_string()]);
        assert_eq!(legs[0].date.to_rfc3339(), "2026-08-05T14:30:00+00:00");
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert!(parse_time("14:30").is_ok());
        assert!(parse_time("14:30:15").is_ok());
        assert!(parse_time("half past two").is_err());
    }
}
