//! Date ranges and mirror-window keys.

use crate::model::TransactionKind;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// An inclusive date range. Epoch bounds cover the whole first and last day.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Epoch seconds at the start of the first day (UTC).
    pub fn start_epoch(&self) -> i64 {
        self.start.and_time(NaiveTime::MIN).and_utc().timestamp()
    }

    /// Epoch seconds at the last second of the last day (UTC).
    pub fn end_epoch(&self) -> i64 {
        match self.end.succ_opt() {
            Some(next) => next.and_time(NaiveTime::MIN).and_utc().timestamp() - 1,
            None => i64::MAX,
        }
    }
}

/// The kind filter applied to a mirror window: either every leg, or one kind.
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindFilter {
    #[default]
    All,
    Withdrawal,
    Deposit,
    Transfer,
}

serde_plain::derive_display_from_serialize!(KindFilter);
serde_plain::derive_fromstr_from_deserialize!(KindFilter);

impl KindFilter {
    /// The single kind this filter selects, or `None` for `All`.
    pub fn as_kind(&self) -> Option<TransactionKind> {
        match self {
            KindFilter::All => None,
            KindFilter::Withdrawal => Some(TransactionKind::Withdrawal),
            KindFilter::Deposit => Some(TransactionKind::Deposit),
            KindFilter::Transfer => Some(TransactionKind::Transfer),
        }
    }
}

/// The local cache's claim of freshness is tracked per `(date range, kind)` slice; this
/// key identifies one such slice. `range: None` is the unscoped, whole-mirror window.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct WindowKey {
    pub range: Option<DateRange>,
    pub kind: KindFilter,
}

impl WindowKey {
    pub fn new(range: Option<DateRange>, kind: KindFilter) -> Self {
        Self { range, kind }
    }
}
