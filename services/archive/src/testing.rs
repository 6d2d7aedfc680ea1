//! Store doubles for exercising failure paths

use async_trait::async_trait;
use common::error::{StoreError, StoreResult};
use common::store::{
    Collection, CollectionSchema, Cursor, Document, Filter, FindOptions, Update, UpdateResult,
};
use futures::{StreamExt, stream};
use uuid::Uuid;

fn backend_failure() -> StoreError {
    StoreError::Backend(sqlx::Error::PoolTimedOut)
}

/// Collection whose backend is unreachable
pub struct FailingCollection {
    schema: &'static CollectionSchema,
    /// Open cursors successfully and fail while reading them
    fail_mid_stream: bool,
}

impl FailingCollection {
    pub fn new(schema: &'static CollectionSchema) -> Self {
        Self {
            schema,
            fail_mid_stream: false,
        }
    }

    pub fn failing_mid_stream(schema: &'static CollectionSchema) -> Self {
        Self {
            schema,
            fail_mid_stream: true,
        }
    }
}

#[async_trait]
impl Collection for FailingCollection {
    fn schema(&self) -> &'static CollectionSchema {
        self.schema
    }

    async fn insert_one(&self, _document: Document) -> StoreResult<Uuid> {
        Err(backend_failure())
    }

    async fn update_one(&self, _filter: &Filter, _update: &Update) -> StoreResult<UpdateResult> {
        Err(backend_failure())
    }

    async fn find(&self, _filter: &Filter, _options: &FindOptions) -> StoreResult<Cursor> {
        if self.fail_mid_stream {
            return Ok(stream::iter(vec![Err(backend_failure())]).boxed());
        }
        Err(backend_failure())
    }

    async fn find_one(&self, _filter: &Filter) -> StoreResult<Option<Document>> {
        Err(backend_failure())
    }
}
