//! Types that represent the core data model, such as `TransactionLeg` and `DateRange`.
mod amount;
mod attachment;
mod pending;
mod range;
mod transaction;

pub use amount::{Amount, AmountError};
pub use attachment::{AttachableKind, AttachmentRecord};
pub use pending::PendingSubmission;
pub use range::{DateRange, KindFilter, WindowKey};
pub use transaction::{
    draft_journal_id, normalize_tags, GroupEntry, NamedSum, TransactionKind, TransactionLeg,
};
