//! PostgreSQL-backed document store
//!
//! Each collection maps to a table named after it with one column per
//! declared field. Filters are rendered into parameterised SQL; field names
//! only ever come from the static schema, never from caller input.

use async_stream::try_stream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{Stream, TryStreamExt};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;
use uuid::Uuid;

use super::{
    Collection, CollectionSchema, Condition, Cursor, Document, FieldKind, Filter, FindOptions,
    ID_FIELD, SortOrder, Update, UpdateResult, Value,
};
use crate::error::{StoreError, StoreResult};

/// Handle to the PostgreSQL database holding the collections
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn collection(&self, schema: &'static CollectionSchema) -> PgCollection {
        PgCollection {
            pool: self.pool.clone(),
            schema,
        }
    }
}

/// One table-backed collection
#[derive(Clone)]
pub struct PgCollection {
    pool: PgPool,
    schema: &'static CollectionSchema,
}

fn push_value(builder: &mut QueryBuilder<'static, Postgres>, value: &Value) {
    match value {
        Value::Null => {
            builder.push("NULL");
        }
        Value::Id(id) => {
            builder.push_bind(*id);
        }
        Value::Text(text) => {
            builder.push_bind(text.clone());
        }
        Value::Timestamp(at) => {
            builder.push_bind(*at);
        }
    }
}

fn push_where(builder: &mut QueryBuilder<'static, Postgres>, filter: &Filter) {
    builder.push(" WHERE TRUE");
    for (field, condition) in filter.clauses() {
        builder.push(" AND ").push(*field);
        match condition {
            Condition::Missing | Condition::Eq(Value::Null) => {
                builder.push(" IS NULL");
            }
            Condition::Eq(value) => {
                builder.push(" = ");
                push_value(builder, value);
            }
            Condition::Gt(value) => {
                builder.push(" > ");
                push_value(builder, value);
            }
            Condition::Gte(value) => {
                builder.push(" >= ");
                push_value(builder, value);
            }
            Condition::Lte(value) => {
                builder.push(" <= ");
                push_value(builder, value);
            }
        }
    }
}

fn column_list(schema: &CollectionSchema) -> String {
    schema
        .fields
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode_row(schema: &CollectionSchema, row: &PgRow) -> StoreResult<Document> {
    let mut document = Document::new();
    for (field, kind) in schema.fields {
        let value = match kind {
            FieldKind::Id => Value::from(row.try_get::<Option<Uuid>, _>(*field)?),
            FieldKind::Text => Value::from(row.try_get::<Option<String>, _>(*field)?),
            FieldKind::Timestamp => Value::from(row.try_get::<Option<DateTime<Utc>>, _>(*field)?),
        };
        document.set(field, value);
    }
    Ok(document)
}

/// Lazily runs `builder` and decodes rows as they arrive
fn stream_rows(
    pool: PgPool,
    schema: &'static CollectionSchema,
    mut builder: QueryBuilder<'static, Postgres>,
) -> impl Stream<Item = StoreResult<Document>> + Send + 'static {
    try_stream! {
        let mut rows = builder.build().fetch(&pool);
        while let Some(row) = rows.try_next().await? {
            yield decode_row(schema, &row)?;
        }
    }
}

impl PgCollection {
    fn select(&self, filter: &Filter) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {} FROM {}",
            column_list(self.schema),
            self.schema.name
        ));
        push_where(&mut builder, filter);
        builder
    }

    fn map_write_error(&self, error: sqlx::Error) -> StoreError {
        if let Some(db_error) = error.as_database_error() {
            if db_error.is_unique_violation() {
                return StoreError::Duplicate {
                    collection: self.schema.name,
                    index: db_error.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        StoreError::Backend(error)
    }
}

#[async_trait]
impl Collection for PgCollection {
    fn schema(&self) -> &'static CollectionSchema {
        self.schema
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Uuid> {
        self.schema.check_document(&document)?;

        let id = Uuid::new_v4();
        let fields: Vec<(&str, &Value)> = document
            .fields()
            .filter(|(field, _)| *field != ID_FIELD)
            .collect();

        let mut builder = QueryBuilder::new(format!("INSERT INTO {} ({}", self.schema.name, ID_FIELD));
        for (field, _) in &fields {
            builder.push(", ").push(*field);
        }
        builder.push(") VALUES (").push_bind(id);
        for (_, value) in &fields {
            builder.push(", ");
            push_value(&mut builder, value);
        }
        builder.push(")");

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| self.map_write_error(e))?;
        debug!("Inserted document {} into {}", id, self.schema.name);

        Ok(id)
    }

    async fn update_one(&self, filter: &Filter, update: &Update) -> StoreResult<UpdateResult> {
        self.schema.check_filter(filter)?;
        self.schema.check_update(update)?;

        let mut builder = QueryBuilder::new(format!("UPDATE {} SET ", self.schema.name));
        let mut assignments = builder.separated(", ");
        for (field, value) in update.assignments() {
            assignments.push(*field).push_unseparated(" = ");
            match value {
                Value::Null => assignments.push_unseparated("NULL"),
                Value::Id(id) => assignments.push_bind_unseparated(*id),
                Value::Text(text) => assignments.push_bind_unseparated(text.clone()),
                Value::Timestamp(at) => assignments.push_bind_unseparated(*at),
            };
        }
        builder.push(format!(
            " WHERE {id} = (SELECT {id} FROM {table}",
            id = ID_FIELD,
            table = self.schema.name
        ));
        push_where(&mut builder, filter);
        builder.push(" LIMIT 1 FOR UPDATE)");

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| self.map_write_error(e))?;

        Ok(UpdateResult {
            matched: result.rows_affected(),
        })
    }

    async fn find(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Cursor> {
        self.schema.check_filter(filter)?;
        self.schema.check_options(options)?;

        let mut builder = self.select(filter);
        if let Some((field, order)) = options.sort {
            builder.push(" ORDER BY ").push(field).push(match order {
                SortOrder::Ascending => " ASC",
                SortOrder::Descending => " DESC",
            });
        }

        Ok(Box::pin(stream_rows(self.pool.clone(), self.schema, builder)))
    }

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>> {
        self.schema.check_filter(filter)?;

        let mut builder = self.select(filter);
        builder.push(" LIMIT 1");

        let row = builder.build().fetch_optional(&self.pool).await?;
        row.map(|row| decode_row(self.schema, &row)).transpose()
    }
}
