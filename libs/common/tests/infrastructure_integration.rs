//! Integration tests for the infrastructure components
//!
//! These tests verify that the PostgreSQL database is reachable and that the
//! table-backed collections honour the same contract as the in-memory ones.
//! They need a running database and are skipped when `DATABASE_URL` is unset.

use chrono::{Duration, SubsecRound, Utc};
use common::{
    database::{DatabaseConfig, ensure_schema, health_check, init_pool},
    store::{
        Collection, CollectionSchema, Document, FieldKind, Filter, FindOptions, ID_FIELD,
        IndexSpec, SortOrder, Update, postgres::PgStore,
    },
};
use futures::TryStreamExt;
use uuid::Uuid;

static PROBES: CollectionSchema = CollectionSchema {
    name: "integration_probes",
    fields: &[
        (ID_FIELD, FieldKind::Id),
        ("key", FieldKind::Text),
        ("run", FieldKind::Text),
        ("seen_at", FieldKind::Timestamp),
        ("deleted_at", FieldKind::Timestamp),
    ],
    indexes: &[IndexSpec {
        name: "integration_probes_key_live",
        keys: &[("key", SortOrder::Ascending)],
        unique: true,
        only_where_missing: Some("deleted_at"),
    }],
};

/// Test that verifies PostgreSQL is accessible and the store adapter can
/// insert, find, update and enforce live uniqueness
#[tokio::test]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL integration test");
        return Ok(());
    }

    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    assert!(health_check(&pool).await?, "Database health check failed");

    ensure_schema(&pool, &[&PROBES]).await?;
    // Running it twice must be harmless
    ensure_schema(&pool, &[&PROBES]).await?;

    let probes = PgStore::new(pool).collection(&PROBES);
    let run = Uuid::new_v4().to_string();
    let key = format!("probe-{}", run);
    let now = Utc::now().trunc_subsecs(3);

    let first = Document::new()
        .with("key", key.as_str())
        .with("run", run.as_str())
        .with("seen_at", now - Duration::minutes(1));
    let id = probes.insert_one(first).await?;

    let stored = probes
        .find_one(&Filter::new().eq(ID_FIELD, id))
        .await?
        .expect("inserted probe is readable");
    assert_eq!(stored.text("key")?, key);
    assert_eq!(stored.timestamp("seen_at")?, now - Duration::minutes(1));
    assert_eq!(stored.optional_timestamp("deleted_at")?, None);

    let duplicate = Document::new()
        .with("key", key.as_str())
        .with("run", run.as_str())
        .with("seen_at", now);
    let err = probes
        .insert_one(duplicate.clone())
        .await
        .expect_err("live key must be unique");
    assert!(err.is_duplicate());

    let tombstone = Update::new().set("deleted_at", now);
    let live = Filter::new().eq("key", key.as_str()).missing("deleted_at");
    assert_eq!(probes.update_one(&live, &tombstone).await?.matched, 1);
    assert_eq!(probes.update_one(&live, &tombstone).await?.matched, 0);

    probes.insert_one(duplicate).await?;

    let found: Vec<Document> = probes
        .find(
            &Filter::new().eq("run", run.as_str()),
            &FindOptions::sorted_by("seen_at", SortOrder::Descending),
        )
        .await?
        .try_collect()
        .await?;
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].timestamp("seen_at")?, now);
    assert_eq!(found[1].optional_timestamp("deleted_at")?, Some(now));

    Ok(())
}
