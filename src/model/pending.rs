//! The durable record handed to the retry scheduler when a submission cannot reach the
//! network.

use serde::{Deserialize, Serialize};

/// Records that a master id's draft group failed to reach the remote ledger due to
/// connectivity loss and must be retried.
///
/// Created only on network-unreachable submission failure, never on validation failure.
/// Consumed exactly once a retry either succeeds or fails with a non-network error.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PendingSubmission {
    pub master_id: i64,
    pub group_title: String,
    /// Epoch seconds at which the failed submission was recorded.
    pub created_at: i64,
}
