//! Common library for the message archive
//!
//! This crate provides the persistence plumbing shared by services: the
//! document store adapter with its PostgreSQL and in-memory backends,
//! database connectivity, and the associated error types.

pub mod database;
pub mod error;
pub mod store;

/// Example usage of the store adapter
///
/// ```rust,no_run
/// use common::database::{DatabaseConfig, health_check, init_pool};
/// use common::store::{Collection, Filter, postgres::PgStore};
/// # use common::store::{CollectionSchema, FieldKind, ID_FIELD};
/// # static NOTES: CollectionSchema = CollectionSchema {
/// #     name: "notes",
/// #     fields: &[(ID_FIELD, FieldKind::Id), ("deleted_at", FieldKind::Timestamp)],
/// #     indexes: &[],
/// # };
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::from_env()?;
///     let pool = init_pool(&config).await?;
///     println!("Database health check: {}", health_check(&pool).await?);
///
///     let notes = PgStore::new(pool).collection(&NOTES);
///     let live = notes.find_one(&Filter::new().missing("deleted_at")).await?;
///     println!("First live note: {:?}", live);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
