//! Document store adapter
//!
//! A narrow capability surface over a collection of documents: insert,
//! conditional update, predicate-based find and find-one. Callers describe
//! what they want with [`Filter`], [`Update`] and [`FindOptions`] values and
//! never see the backend's native query language.
//!
//! Two backends implement [`Collection`]:
//! - [`postgres::PgCollection`] keeps every collection in its own table
//! - [`memory::MemoryCollection`] keeps documents in process, for tests and
//!   ephemeral deployments

use std::collections::BTreeMap;
use std::mem::discriminant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

pub mod memory;
pub mod postgres;

/// Name of the store-assigned identifier field present in every collection
pub const ID_FIELD: &str = "id";

/// A single field value
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    Null,
    Id(Uuid),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn same_kind(&self, other: &Value) -> bool {
        discriminant(self) == discriminant(other)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Id(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Storage type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Id,
    Text,
    Timestamp,
}

/// Sort direction for finds and index keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Secondary index declared on a collection
#[derive(Debug)]
pub struct IndexSpec {
    pub name: &'static str,
    pub keys: &'static [(&'static str, SortOrder)],
    pub unique: bool,
    /// Restricts the index to documents where this field is absent or null
    pub only_where_missing: Option<&'static str>,
}

impl IndexSpec {
    /// Whether a document participates in this index
    pub fn covers(&self, document: &Document) -> bool {
        match self.only_where_missing {
            Some(field) => Condition::Missing.matches(document.get(field)),
            None => true,
        }
    }

    fn key_of(&self, document: &Document) -> Vec<Value> {
        self.keys
            .iter()
            .map(|(field, _)| document.get(field).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// Static description of a collection: its fields and indexes
#[derive(Debug)]
pub struct CollectionSchema {
    pub name: &'static str,
    pub fields: &'static [(&'static str, FieldKind)],
    pub indexes: &'static [IndexSpec],
}

impl CollectionSchema {
    /// Look up a declared field
    pub fn field_kind(&self, field: &str) -> StoreResult<FieldKind> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| StoreError::UnknownField {
                collection: self.name,
                field: field.to_string(),
            })
    }

    pub fn check_filter(&self, filter: &Filter) -> StoreResult<()> {
        for (field, _) in filter.clauses() {
            self.field_kind(field)?;
        }
        Ok(())
    }

    pub fn check_update(&self, update: &Update) -> StoreResult<()> {
        for (field, _) in update.assignments() {
            self.field_kind(field)?;
        }
        Ok(())
    }

    pub fn check_document(&self, document: &Document) -> StoreResult<()> {
        for field in document.fields.keys() {
            self.field_kind(field)?;
        }
        Ok(())
    }

    pub fn check_options(&self, options: &FindOptions) -> StoreResult<()> {
        if let Some((field, _)) = options.sort {
            self.field_kind(field)?;
        }
        Ok(())
    }

    /// Returns the name of the first unique index `candidate` collides on
    ///
    /// `others` must not contain the candidate itself.
    pub fn unique_violation<'a>(
        &self,
        candidate: &Document,
        others: impl Iterator<Item = &'a Document> + Clone,
    ) -> Option<&'static str> {
        self.indexes
            .iter()
            .filter(|index| index.unique && index.covers(candidate))
            .find(|index| {
                let key = index.key_of(candidate);
                others
                    .clone()
                    .any(|other| index.covers(other) && index.key_of(other) == key)
            })
            .map(|index| index.name)
    }
}

/// Predicate applied to one field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field is absent or null
    Missing,
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lte(Value),
}

impl Condition {
    /// Evaluate against a field value; `None` means the field is absent
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = value.filter(|v| !v.is_null());
        match self {
            Condition::Missing => value.is_none(),
            Condition::Eq(Value::Null) => value.is_none(),
            Condition::Eq(expected) => value == Some(expected),
            Condition::Gt(bound) => Self::compare(value, bound, |v| v > bound),
            Condition::Gte(bound) => Self::compare(value, bound, |v| v >= bound),
            Condition::Lte(bound) => Self::compare(value, bound, |v| v <= bound),
        }
    }

    fn compare(value: Option<&Value>, bound: &Value, check: impl Fn(&Value) -> bool) -> bool {
        match value {
            Some(v) => v.same_kind(bound) && check(v),
            None => false,
        }
    }
}

/// Conjunction of field conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(&'static str, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing(self, field: &'static str) -> Self {
        self.with(field, Condition::Missing)
    }

    pub fn eq(self, field: &'static str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    pub fn gt(self, field: &'static str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Gt(value.into()))
    }

    pub fn gte(self, field: &'static str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Gte(value.into()))
    }

    pub fn lte(self, field: &'static str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Lte(value.into()))
    }

    pub fn with(mut self, field: &'static str, condition: Condition) -> Self {
        self.clauses.push((field, condition));
        self
    }

    pub fn clauses(&self) -> &[(&'static str, Condition)] {
        &self.clauses
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, condition)| condition.matches(document.get(field)))
    }
}

/// Field assignments applied by [`Collection::update_one`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    assignments: Vec<(&'static str, Value)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.assignments.push((field, value.into()));
        self
    }

    pub fn assignments(&self) -> &[(&'static str, Value)] {
        &self.assignments
    }

    pub fn apply(&self, document: &mut Document) {
        for (field, value) in &self.assignments {
            document.set(field, value.clone());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<(&'static str, SortOrder)>,
}

impl FindOptions {
    pub fn sorted_by(field: &'static str, order: SortOrder) -> Self {
        Self {
            sort: Some((field, order)),
        }
    }
}

/// Outcome of a conditional update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
}

/// A stored record as a map of field name to value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn id(&self) -> StoreResult<Uuid> {
        match self.get(ID_FIELD) {
            Some(Value::Id(id)) => Ok(*id),
            other => Err(Self::mismatch(ID_FIELD, "id", other)),
        }
    }

    pub fn text(&self, field: &str) -> StoreResult<String> {
        match self.get(field) {
            Some(Value::Text(text)) => Ok(text.clone()),
            other => Err(Self::mismatch(field, "text", other)),
        }
    }

    pub fn timestamp(&self, field: &str) -> StoreResult<DateTime<Utc>> {
        match self.get(field) {
            Some(Value::Timestamp(at)) => Ok(*at),
            other => Err(Self::mismatch(field, "timestamp", other)),
        }
    }

    pub fn optional_timestamp(&self, field: &str) -> StoreResult<Option<DateTime<Utc>>> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Timestamp(at)) => Ok(Some(*at)),
            other => Err(Self::mismatch(field, "timestamp or null", other)),
        }
    }

    fn mismatch(field: &str, expected: &str, found: Option<&Value>) -> StoreError {
        StoreError::Decode {
            field: field.to_string(),
            reason: format!("expected {}, found {:?}", expected, found),
        }
    }
}

/// Results of a find, yielded one document at a time
///
/// Dropping the cursor releases whatever the backend holds for the query.
pub type Cursor = BoxStream<'static, StoreResult<Document>>;

/// Capability surface over one document collection
#[async_trait]
pub trait Collection: Send + Sync {
    fn schema(&self) -> &'static CollectionSchema;

    /// Insert a document, returning the store-assigned id
    async fn insert_one(&self, document: Document) -> StoreResult<Uuid>;

    /// Apply `update` to at most one document matching `filter`
    async fn update_one(&self, filter: &Filter, update: &Update) -> StoreResult<UpdateResult>;

    async fn find(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Cursor>;

    /// First document matching `filter`, or `None`
    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>>;
}
