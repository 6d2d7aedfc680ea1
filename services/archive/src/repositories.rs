//! Repositories for archive records
//!
//! Both repositories delete logically: a record is tombstoned by setting
//! `deleted_at` and is from then on invisible to every read path. Read paths
//! must start from [`live`] so that no query can forget the tombstone clause.

use chrono::{DateTime, SubsecRound, Utc};
use common::store::Filter;

use crate::models::DELETED_AT;

pub mod message;
pub mod token;

pub use message::MessageRepository;
pub use token::TokenRepository;

/// Filter matching records that have not been tombstoned
pub fn live() -> Filter {
    Filter::new().missing(DELETED_AT)
}

/// Current time at the millisecond precision the store keeps
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
