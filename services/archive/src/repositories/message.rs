//! Message repository for store operations

use std::sync::Arc;

use chrono::SubsecRound;
use common::error::StoreResult;
use common::store::{Collection, Document, Filter, FindOptions, SortOrder, Update};
use futures::TryStreamExt;
use tracing::{debug, info};

use super::{live, now};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::message::{CHANNEL_ID, CONTENT, SENDER, SENT_AT, UID};
use crate::models::{CREATED_AT, DELETED_AT, Message, NewMessage, SearchCriteria, UPDATED_AT};

/// Message repository
#[derive(Clone)]
pub struct MessageRepository {
    collection: Arc<dyn Collection>,
}

fn message_from_document(document: &Document) -> StoreResult<Message> {
    Ok(Message {
        id: document.id()?,
        uid: document.text(UID)?,
        channel_id: document.text(CHANNEL_ID)?,
        sender: document.text(SENDER)?,
        content: document.text(CONTENT)?,
        sent_at: document.timestamp(SENT_AT)?,
        created_at: document.timestamp(CREATED_AT)?,
        updated_at: document.timestamp(UPDATED_AT)?,
        deleted_at: document.optional_timestamp(DELETED_AT)?,
    })
}

/// Conjunctive filter for a search; always restricted to live messages
fn search_filter(criteria: &SearchCriteria) -> Filter {
    let mut filter = live();

    if let Some(channel_id) = &criteria.channel_id {
        filter = filter.eq(CHANNEL_ID, channel_id.as_str());
    }
    if let Some(sender) = &criteria.sender {
        filter = filter.eq(SENDER, sender.as_str());
    }
    if let Some(from_date) = criteria.from_date {
        filter = filter.gte(SENT_AT, from_date);
    }
    if let Some(to_date) = criteria.to_date {
        filter = filter.lte(SENT_AT, to_date);
    }

    filter
}

impl MessageRepository {
    /// Create a new message repository
    pub fn new(collection: Arc<dyn Collection>) -> Self {
        Self { collection }
    }

    /// Store a new message, stamping `created_at` and `updated_at`
    ///
    /// `sent_at` is kept at millisecond precision, like the stamps.
    ///
    /// Fails with [`RepositoryError::Conflict`] when a live message already
    /// carries the same `uid`. Field contents are not validated here.
    pub async fn create(&self, new_message: NewMessage) -> RepositoryResult<Message> {
        let now = now();
        let sent_at = new_message.sent_at.trunc_subsecs(3);
        let document = Document::new()
            .with(UID, new_message.uid.as_str())
            .with(CHANNEL_ID, new_message.channel_id.as_str())
            .with(SENDER, new_message.sender.as_str())
            .with(CONTENT, new_message.content.as_str())
            .with(SENT_AT, sent_at)
            .with(CREATED_AT, now)
            .with(UPDATED_AT, now);

        let id = self.collection.insert_one(document).await.map_err(|e| {
            if e.is_duplicate() {
                RepositoryError::Conflict(format!(
                    "Message with uid {} already exists",
                    new_message.uid
                ))
            } else {
                e.into()
            }
        })?;
        info!("Stored message {} in channel {}", new_message.uid, new_message.channel_id);

        Ok(Message {
            id,
            uid: new_message.uid,
            channel_id: new_message.channel_id,
            sender: new_message.sender,
            content: new_message.content,
            sent_at,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Live messages matching `criteria`, most recently sent first
    ///
    /// No limit is applied; an empty result is not an error.
    pub async fn search(&self, criteria: &SearchCriteria) -> RepositoryResult<Vec<Message>> {
        let filter = search_filter(criteria);
        let options = FindOptions::sorted_by(SENT_AT, SortOrder::Descending);

        let documents: Vec<Document> = self
            .collection
            .find(&filter, &options)
            .await?
            .try_collect()
            .await?;
        debug!("Search matched {} messages", documents.len());

        let messages = documents
            .iter()
            .map(message_from_document)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(messages)
    }

    /// Tombstone the live message with `uid`
    ///
    /// Not idempotent: deleting a uid that is already deleted, or never
    /// existed, fails with [`RepositoryError::NotFound`] either way.
    pub async fn delete(&self, uid: &str) -> RepositoryResult<()> {
        let now = now();
        let filter = live().eq(UID, uid);
        let update = Update::new().set(DELETED_AT, now).set(UPDATED_AT, now);

        let result = self.collection.update_one(&filter, &update).await?;
        if result.matched == 0 {
            return Err(RepositoryError::NotFound("Message"));
        }
        info!("Deleted message {}", uid);

        Ok(())
    }

    /// The live message with `uid`, if any
    pub async fn find_by_uid(&self, uid: &str) -> RepositoryResult<Option<Message>> {
        let document = self.collection.find_one(&live().eq(UID, uid)).await?;

        Ok(document
            .as_ref()
            .map(message_from_document)
            .transpose()?)
    }
}
