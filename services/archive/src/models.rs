//! Archive models for stored records and request payloads

pub mod message;
pub mod token;

pub use message::{MESSAGES, Message, NewMessage, SearchCriteria};
pub use token::{CreateTokenRequest, TOKENS, Token};

/// Store-assigned creation time, shared by every collection
pub const CREATED_AT: &str = "created_at";
/// Store-assigned modification time, shared by every collection
pub const UPDATED_AT: &str = "updated_at";
/// Tombstone; set once a record is logically deleted
pub const DELETED_AT: &str = "deleted_at";
