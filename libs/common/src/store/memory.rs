//! In-process document store
//!
//! Keeps every collection in memory behind a `tokio` lock. Unique indexes
//! declared on the schema are enforced on insert and update with the same
//! partial-index semantics the PostgreSQL backend gets from its DDL.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    Collection, CollectionSchema, Cursor, Document, Filter, FindOptions, ID_FIELD, SortOrder,
    Update, UpdateResult,
};
use crate::error::{StoreError, StoreResult};

type Documents = Arc<RwLock<Vec<Document>>>;

/// Set of in-memory collections sharing one lifetime
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<HashMap<&'static str, Documents>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or create) the collection described by `schema`
    pub fn collection(&self, schema: &'static CollectionSchema) -> MemoryCollection {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let documents = collections.entry(schema.name).or_default().clone();

        MemoryCollection { schema, documents }
    }
}

/// One in-memory collection
#[derive(Clone)]
pub struct MemoryCollection {
    schema: &'static CollectionSchema,
    documents: Documents,
}

impl MemoryCollection {
    fn duplicate(&self, index: &str) -> StoreError {
        StoreError::Duplicate {
            collection: self.schema.name,
            index: index.to_string(),
        }
    }
}

fn compare_field(a: &Document, b: &Document, field: &str) -> Ordering {
    a.get(field)
        .partial_cmp(&b.get(field))
        .unwrap_or(Ordering::Equal)
}

#[async_trait]
impl Collection for MemoryCollection {
    fn schema(&self) -> &'static CollectionSchema {
        self.schema
    }

    async fn insert_one(&self, mut document: Document) -> StoreResult<Uuid> {
        self.schema.check_document(&document)?;

        let id = Uuid::new_v4();
        document.set(ID_FIELD, id);

        let mut documents = self.documents.write().await;
        if let Some(index) = self.schema.unique_violation(&document, documents.iter()) {
            return Err(self.duplicate(index));
        }
        documents.push(document);
        debug!("Inserted document {} into {}", id, self.schema.name);

        Ok(id)
    }

    async fn update_one(&self, filter: &Filter, update: &Update) -> StoreResult<UpdateResult> {
        self.schema.check_filter(filter)?;
        self.schema.check_update(update)?;

        let mut documents = self.documents.write().await;
        let Some(position) = documents.iter().position(|doc| filter.matches(doc)) else {
            return Ok(UpdateResult { matched: 0 });
        };

        let mut updated = documents[position].clone();
        update.apply(&mut updated);

        let others = documents
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != position)
            .map(|(_, doc)| doc);
        if let Some(index) = self.schema.unique_violation(&updated, others) {
            return Err(self.duplicate(index));
        }
        documents[position] = updated;

        Ok(UpdateResult { matched: 1 })
    }

    async fn find(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Cursor> {
        self.schema.check_filter(filter)?;
        self.schema.check_options(options)?;

        let mut matched: Vec<Document> = self
            .documents
            .read()
            .await
            .iter()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect();

        if let Some((field, order)) = options.sort {
            matched.sort_by(|a, b| match order {
                SortOrder::Ascending => compare_field(a, b, field),
                SortOrder::Descending => compare_field(b, a, field),
            });
        }

        Ok(stream::iter(matched.into_iter().map(Ok)).boxed())
    }

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>> {
        self.schema.check_filter(filter)?;

        Ok(self
            .documents
            .read()
            .await
            .iter()
            .find(|doc| filter.matches(doc))
            .cloned())
    }
}
