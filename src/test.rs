//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::{GroupAttributes, RemoteGroup, RemoteLeg, TestLedger};
use crate::mirror::Mirror;
use crate::model::{Amount, KindFilter, TransactionKind};
use crate::Config;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Test environment that sets up a splitsync home directory with Config and database,
/// wired against an isolated in-memory ledger. Holds TempDir to keep the directory alive
/// for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    /// Creates a test environment with Config, an initialized database, and a fresh
    /// in-memory ledger state keyed by a unique server URL.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("splitsync");
        let token_path = temp_dir.path().join("token");
        std::fs::write(&token_path, "test-token").unwrap();

        let rand = Uuid::new_v4().to_string().replace('-', "");
        let server_url = format!("https://ledger-{rand}.example.com");
        let config = Config::create(&root, &token_path, &server_url).await.unwrap();

        let env = Self {
            _temp_dir: temp_dir,
            config,
        };
        env.ledger().set_state(Default::default());
        env
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// A handle onto the in-memory ledger state associated with this environment.
    pub fn ledger(&self) -> TestLedger {
        TestLedger::new(self.config.server_url())
    }

    /// Adds one group to the in-memory ledger's authoritative data. Legs are given as
    /// `(date, amount, description)` tuples and receive sequential journal ids.
    pub fn seed_remote_group(&self, id: i64, title: &str, legs: &[(&str, &str, &str)]) {
        let ledger = self.ledger();
        let mut state = ledger.get_state();
        let transactions = legs
            .iter()
            .map(|(date, amount, description)| {
                let journal_id = state.next_journal_id;
                state.next_journal_id += 1;
                RemoteLeg {
                    transaction_journal_id: journal_id,
                    kind: TransactionKind::Withdrawal,
                    amount: Amount::from_str(amount).unwrap(),
                    description: description.to_string(),
                    date: format!("{date}T12:00:00Z"),
                    destination_name: "Grocer".to_string(),
                    currency_code: "USD".to_string(),
                    ..RemoteLeg::default()
                }
            })
            .collect();
        state.groups.push(RemoteGroup {
            id,
            attributes: GroupAttributes {
                group_title: title.to_string(),
                transactions,
            },
        });
        ledger.set_state(state);
    }

    /// Pulls everything the in-memory ledger knows into the local mirror.
    pub async fn mirror_all(&self) {
        let mirror = Mirror::new(
            self.config.db().clone(),
            Arc::new(self.ledger()),
            Default::default(),
        );
        let outcome = mirror.refresh_window(None, KindFilter::All).await.unwrap();
        assert!(outcome.is_fresh(), "test mirror seed must not fall back");
    }
}
