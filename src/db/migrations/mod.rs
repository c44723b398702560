//! Versioned schema migrations, embedded in the binary.
//!
//! Each schema version `NN` ships a pair of SQL files in this directory,
//! `migration_NN_up.sql` and `migration_NN_down.sql`. The runner walks the version gap
//! one step at a time; a step's SQL and its `schema_version` update commit together.

use crate::Result;
use anyhow::Context;
use sqlx::{Executor, SqlitePool};
use tracing::debug;

/// The schema version this build of the program expects.
pub(crate) const CURRENT_VERSION: i32 = 1;

/// The up/down SQL pair for one schema version.
struct Step {
    version: i32,
    up: &'static str,
    down: &'static str,
}

const STEPS: &[Step] = &[Step {
    version: 1,
    up: include_str!("migration_01_up.sql"),
    down: include_str!("migration_01_down.sql"),
}];

/// Walks the schema from version `from` to version `to`, upgrading or downgrading as
/// needed. A no-op when the versions already match.
///
/// The whole plan is resolved before anything runs, so a gap in the embedded steps
/// surfaces as an error up front instead of a half-migrated database.
pub(crate) async fn run(pool: &SqlitePool, from: i32, to: i32) -> Result<()> {
    for (sql, lands_at) in plan(from, to)? {
        debug!("Migrating schema to version {lands_at}");
        apply(pool, sql, lands_at).await?;
    }
    Ok(())
}

/// Resolves the ordered `(sql, resulting version)` steps between two schema versions.
fn plan(from: i32, to: i32) -> Result<Vec<(&'static str, i32)>> {
    let step_for = |version: i32| {
        STEPS
            .iter()
            .find(|step| step.version == version)
            .with_context(|| format!("No migration step for schema version {version}"))
    };
    if from <= to {
        (from + 1..=to).map(|v| Ok((step_for(v)?.up, v))).collect()
    } else {
        (to + 1..=from)
            .rev()
            .map(|v| Ok((step_for(v)?.down, v - 1)))
            .collect()
    }
}

/// Runs one step's SQL and the `schema_version` update in a single transaction.
async fn apply(pool: &SqlitePool, sql: &str, lands_at: i32) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin migration")?;
    tx.execute(sql).await.context("Migration SQL failed")?;
    sqlx::query("UPDATE schema_version SET version = ?")
        .bind(lands_at)
        .execute(&mut *tx)
        .await
        .context("Failed to record the schema version")?;
    tx.commit().await.context("Failed to commit migration")
}
