//! Bearer token models and the `tokens` collection layout

use chrono::{DateTime, Utc};
use common::store::{CollectionSchema, FieldKind, ID_FIELD, IndexSpec, SortOrder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CREATED_AT, DELETED_AT, UPDATED_AT};

pub const TOKEN: &str = "token";
pub const NAME: &str = "name";
pub const EXPIRES_AT: &str = "expires_at";

/// Layout of the `tokens` collection
pub static TOKENS: CollectionSchema = CollectionSchema {
    name: "tokens",
    fields: &[
        (ID_FIELD, FieldKind::Id),
        (TOKEN, FieldKind::Text),
        (NAME, FieldKind::Text),
        (EXPIRES_AT, FieldKind::Timestamp),
        (CREATED_AT, FieldKind::Timestamp),
        (UPDATED_AT, FieldKind::Timestamp),
        (DELETED_AT, FieldKind::Timestamp),
    ],
    indexes: &[
        IndexSpec {
            name: "tokens_token_live",
            keys: &[(TOKEN, SortOrder::Ascending)],
            unique: true,
            only_where_missing: Some(DELETED_AT),
        },
        IndexSpec {
            name: "tokens_expires_at_deleted_at",
            keys: &[
                (EXPIRES_AT, SortOrder::Ascending),
                (DELETED_AT, SortOrder::Ascending),
            ],
            unique: false,
            only_where_missing: None,
        },
        IndexSpec {
            name: "tokens_created_at_deleted_at",
            keys: &[
                (CREATED_AT, SortOrder::Descending),
                (DELETED_AT, SortOrder::Ascending),
            ],
            unique: false,
            only_where_missing: None,
        },
    ],
};

/// Issued bearer credential
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: Uuid,
    pub token: String,
    pub name: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Request for token issuance
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    pub name: String,
    /// Lifetime in seconds; the configured default applies when absent
    pub expires_in: Option<i64>,
}
