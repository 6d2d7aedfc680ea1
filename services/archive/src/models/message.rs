//! Message models and the `messages` collection layout

use chrono::{DateTime, Utc};
use common::store::{CollectionSchema, FieldKind, ID_FIELD, IndexSpec, SortOrder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CREATED_AT, DELETED_AT, UPDATED_AT};

pub const UID: &str = "uid";
pub const CHANNEL_ID: &str = "channel_id";
pub const SENDER: &str = "sender";
pub const CONTENT: &str = "content";
pub const SENT_AT: &str = "sent_at";

/// Layout of the `messages` collection
///
/// `uid` is unique among live messages only, so a uid can be submitted again
/// once the earlier message carrying it has been deleted.
pub static MESSAGES: CollectionSchema = CollectionSchema {
    name: "messages",
    fields: &[
        (ID_FIELD, FieldKind::Id),
        (UID, FieldKind::Text),
        (CHANNEL_ID, FieldKind::Text),
        (SENDER, FieldKind::Text),
        (CONTENT, FieldKind::Text),
        (SENT_AT, FieldKind::Timestamp),
        (CREATED_AT, FieldKind::Timestamp),
        (UPDATED_AT, FieldKind::Timestamp),
        (DELETED_AT, FieldKind::Timestamp),
    ],
    indexes: &[
        IndexSpec {
            name: "messages_uid_live",
            keys: &[(UID, SortOrder::Ascending)],
            unique: true,
            only_where_missing: Some(DELETED_AT),
        },
        IndexSpec {
            name: "messages_channel_id_deleted_at",
            keys: &[
                (CHANNEL_ID, SortOrder::Ascending),
                (DELETED_AT, SortOrder::Ascending),
            ],
            unique: false,
            only_where_missing: None,
        },
        IndexSpec {
            name: "messages_sender_deleted_at",
            keys: &[
                (SENDER, SortOrder::Ascending),
                (DELETED_AT, SortOrder::Ascending),
            ],
            unique: false,
            only_where_missing: None,
        },
        IndexSpec {
            name: "messages_sent_at_deleted_at",
            keys: &[
                (SENT_AT, SortOrder::Descending),
                (DELETED_AT, SortOrder::Ascending),
            ],
            unique: false,
            only_where_missing: None,
        },
    ],
};

/// Archived chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(skip)]
    pub id: Uuid,
    pub uid: String,
    pub channel_id: String,
    pub sender: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Message submission payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub uid: String,
    #[serde(alias = "channelID")]
    pub channel_id: String,
    pub sender: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

/// Search filter; every unset field leaves that dimension unconstrained
///
/// `from_date` and `to_date` bound `sent_at` inclusively.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    #[serde(alias = "channelID")]
    pub channel_id: Option<String>,
    pub sender: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_message_accepts_both_channel_spellings() {
        let camel: NewMessage = serde_json::from_str(
            r#"{"uid":"m-1","channelId":"general","sender":"alice","content":"hi","sentAt":"2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        let upper: NewMessage = serde_json::from_str(
            r#"{"uid":"m-1","channelID":"general","sender":"alice","content":"hi","sentAt":"2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(camel, upper);
        assert_eq!(
            camel.sent_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn message_serializes_without_store_id_or_live_tombstone() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let message = Message {
            id: Uuid::new_v4(),
            uid: "m-1".to_string(),
            channel_id: "general".to_string(),
            sender: "alice".to_string(),
            content: "hi".to_string(),
            sent_at: at,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["channelId"], "general");
        assert!(json.get("id").is_none());
        assert!(json.get("deletedAt").is_none());
    }
}
