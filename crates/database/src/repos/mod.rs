//! Database repository implementations

pub mod message_repository;
pub mod user_repository;

pub use message_repository::MessageRepository;
pub use user_repository::UserRepository;

use chrono::{SecondsFormat, Utc};
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

pub(crate) fn new_public_id() -> String {
    CUID.create_id()
}

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
pub(crate) fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
