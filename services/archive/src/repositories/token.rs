//! Token repository: issuance, expiry-aware lookup and revocation
//!
//! Expiry is enforced at lookup time. A token whose `expires_at` has passed
//! disappears from [`TokenRepository::list`] and [`TokenRepository::find_by_token`]
//! without any write; nothing sweeps expired tokens in the background.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use chrono::TimeDelta;
use common::error::StoreResult;
use common::store::{Collection, Document, FindOptions, ID_FIELD, SortOrder, Update};
use futures::TryStreamExt;
use rand::{RngCore, rngs::OsRng};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{live, now};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::token::{EXPIRES_AT, NAME, TOKEN};
use crate::models::{CREATED_AT, DELETED_AT, Token, UPDATED_AT};

/// Lifetime of a token issued without an explicit one: 30 days
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 2_592_000;

/// Number of random bytes behind every token string
pub const TOKEN_BYTES: usize = 32;

/// Source of the secret material in issued tokens
pub trait RandomSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error>;
}

/// Operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        OsRng.try_fill_bytes(dest)
    }
}

/// Token repository
#[derive(Clone)]
pub struct TokenRepository {
    collection: Arc<dyn Collection>,
    random: Arc<dyn RandomSource>,
    default_ttl_seconds: i64,
}

fn token_from_document(document: &Document) -> StoreResult<Token> {
    Ok(Token {
        id: document.id()?,
        token: document.text(TOKEN)?,
        name: document.text(NAME)?,
        expires_at: document.timestamp(EXPIRES_AT)?,
        created_at: document.timestamp(CREATED_AT)?,
        updated_at: document.timestamp(UPDATED_AT)?,
        deleted_at: document.optional_timestamp(DELETED_AT)?,
    })
}

impl TokenRepository {
    /// Create a token repository drawing from the OS random source
    pub fn new(collection: Arc<dyn Collection>) -> Self {
        Self {
            collection,
            random: Arc::new(OsRandom),
            default_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }

    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn with_default_ttl(mut self, seconds: i64) -> Self {
        self.default_ttl_seconds = seconds;
        self
    }

    fn generate_secret(&self) -> RepositoryResult<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.random.fill(&mut bytes)?;
        Ok(URL_SAFE.encode(bytes))
    }

    /// Issue a new token named `name`, valid for `ttl_seconds`
    ///
    /// Without a ttl the repository default applies. A ttl that is not
    /// strictly positive is rejected with [`RepositoryError::Validation`].
    pub async fn create(&self, name: &str, ttl_seconds: Option<i64>) -> RepositoryResult<Token> {
        let ttl = ttl_seconds.unwrap_or(self.default_ttl_seconds);
        if ttl <= 0 {
            return Err(RepositoryError::Validation(
                "expiresIn must be a positive number of seconds".to_string(),
            ));
        }

        let now = now();
        let expires_at = TimeDelta::try_seconds(ttl)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| RepositoryError::Validation("expiresIn is too large".to_string()))?;
        let secret = self.generate_secret()?;

        let document = Document::new()
            .with(TOKEN, secret.as_str())
            .with(NAME, name)
            .with(EXPIRES_AT, expires_at)
            .with(CREATED_AT, now)
            .with(UPDATED_AT, now);

        let id = self.collection.insert_one(document).await.map_err(|e| {
            if e.is_duplicate() {
                warn!("Generated token collided with a live token");
                RepositoryError::Conflict("Token already exists".to_string())
            } else {
                e.into()
            }
        })?;
        info!("Issued token {} ({}) expiring at {}", id, name, expires_at);

        Ok(Token {
            id,
            token: secret,
            name: name.to_string(),
            expires_at,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Live, unexpired tokens, newest first
    pub async fn list(&self) -> RepositoryResult<Vec<Token>> {
        let filter = live().gt(EXPIRES_AT, now());
        let options = FindOptions::sorted_by(CREATED_AT, SortOrder::Descending);

        let documents: Vec<Document> = self
            .collection
            .find(&filter, &options)
            .await?
            .try_collect()
            .await?;

        Ok(documents
            .iter()
            .map(token_from_document)
            .collect::<StoreResult<Vec<_>>>()?)
    }

    /// Revoke the live token with store id `id`
    ///
    /// A malformed id and an id matching no live token both fail with
    /// [`RepositoryError::NotFound`]; callers cannot tell them apart.
    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        let Ok(id) = Uuid::parse_str(id) else {
            debug!("Rejecting token deletion for malformed id {:?}", id);
            return Err(RepositoryError::NotFound("Token"));
        };

        let now = now();
        let filter = live().eq(ID_FIELD, id);
        let update = Update::new().set(DELETED_AT, now).set(UPDATED_AT, now);

        let result = self.collection.update_one(&filter, &update).await?;
        if result.matched == 0 {
            return Err(RepositoryError::NotFound("Token"));
        }
        info!("Revoked token {}", id);

        Ok(())
    }

    /// The non-deleted token with store id `id`, expired or not
    ///
    /// A malformed id finds nothing.
    pub async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Token>> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(None);
        };

        let document = self.collection.find_one(&live().eq(ID_FIELD, id)).await?;
        Ok(document.as_ref().map(token_from_document).transpose()?)
    }

    /// Resolve a bearer credential to its live, unexpired token
    pub async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<Token>> {
        let filter = live().eq(TOKEN, token).gt(EXPIRES_AT, now());

        let document = self.collection.find_one(&filter).await?;
        Ok(document.as_ref().map(token_from_document).transpose()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TOKENS;
    use chrono::{Duration, Utc};
    use common::store::memory::{MemoryCollection, MemoryStore};
    use std::sync::atomic::{AtomicU8, Ordering};
    use tokio_test::{assert_err, assert_ok};

    /// Fills every buffer with one byte value, bumped after each call
    struct CountingRandom(AtomicU8);

    impl RandomSource for CountingRandom {
        fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
            dest.fill(self.0.fetch_add(1, Ordering::SeqCst));
            Ok(())
        }
    }

    /// Always returns the same bytes
    struct StuckRandom;

    impl RandomSource for StuckRandom {
        fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
            dest.fill(0xAB);
            Ok(())
        }
    }

    struct BrokenRandom;

    impl RandomSource for BrokenRandom {
        fn fill(&self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::other("entropy exhausted")))
        }
    }

    fn collection() -> MemoryCollection {
        MemoryStore::new().collection(&TOKENS)
    }

    fn repository() -> TokenRepository {
        TokenRepository::new(Arc::new(collection()))
            .with_random_source(Arc::new(CountingRandom(AtomicU8::new(0))))
    }

    /// Store a token document directly, bypassing the ttl check
    async fn insert_raw(collection: &MemoryCollection, secret: &str, expires_in: Duration) -> Uuid {
        let now = now();
        collection
            .insert_one(
                Document::new()
                    .with(TOKEN, secret)
                    .with(NAME, "raw")
                    .with(EXPIRES_AT, now + expires_in)
                    .with(CREATED_AT, now)
                    .with(UPDATED_AT, now),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_encodes_32_random_bytes_url_safe() {
        let repo = TokenRepository::new(Arc::new(collection()))
            .with_random_source(Arc::new(StuckRandom));

        let token = repo.create("ci", None).await.unwrap();
        assert_eq!(token.token, URL_SAFE.encode([0xABu8; TOKEN_BYTES]));
        assert_eq!(token.token.len(), 44);
        assert!(!token.token.contains('+') && !token.token.contains('/'));
    }

    #[tokio::test]
    async fn create_applies_default_ttl() {
        let repo = repository();
        let token = repo.create("ci", None).await.unwrap();

        assert_eq!(
            token.expires_at - token.created_at,
            Duration::seconds(DEFAULT_TOKEN_TTL_SECONDS)
        );
        assert_eq!(token.created_at, token.updated_at);

        let custom = repository().with_default_ttl(60);
        let token = custom.create("short", None).await.unwrap();
        assert_eq!(token.expires_at - token.created_at, Duration::seconds(60));
    }

    #[tokio::test]
    async fn create_reads_back_the_store_assigned_id() {
        let repo = repository();
        let token = repo.create("deploy", Some(3600)).await.unwrap();

        let found = repo.find_by_id(&token.id.to_string()).await.unwrap().unwrap();
        assert_eq!(found, token);
        assert_eq!(found.expires_at - found.created_at, Duration::seconds(3600));
    }

    #[tokio::test]
    async fn create_rejects_non_positive_ttl() {
        let repo = repository();
        for ttl in [0, -1, -3600] {
            let err = assert_err!(repo.create("bad", Some(ttl)).await);
            assert!(matches!(err, RepositoryError::Validation(_)));
        }
        let err = assert_err!(repo.create("huge", Some(i64::MAX)).await);
        assert!(matches!(err, RepositoryError::Validation(_)));
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_surfaces_random_source_failure() {
        let repo = TokenRepository::new(Arc::new(collection()))
            .with_random_source(Arc::new(BrokenRandom));
        let err = assert_err!(repo.create("ci", None).await);
        assert!(matches!(err, RepositoryError::Randomness(_)));
    }

    #[tokio::test]
    async fn colliding_secret_is_a_conflict() {
        let repo = TokenRepository::new(Arc::new(collection()))
            .with_random_source(Arc::new(StuckRandom));
        assert_ok!(repo.create("first", None).await);
        let err = assert_err!(repo.create("second", None).await);
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_returns_live_tokens_newest_first() {
        let repo = repository();
        let first = repo.create("first", None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = repo.create("second", None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let third = repo.create("third", None).await.unwrap();

        repo.delete(&second.id.to_string()).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec![third.name, first.name]);
    }

    #[tokio::test]
    async fn list_drops_tokens_once_they_expire() {
        let repo = repository();
        let token = repo.create("short-lived", Some(1)).await.unwrap();
        assert_eq!(repo.list().await.unwrap().len(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        assert!(repo.list().await.unwrap().is_empty());
        // Expired but never deleted
        let stored = repo.find_by_id(&token.id.to_string()).await.unwrap().unwrap();
        assert!(stored.deleted_at.is_none());
    }

    #[tokio::test]
    async fn find_by_token_ignores_expired_and_revoked_tokens() {
        let collection = collection();
        let repo = TokenRepository::new(Arc::new(collection.clone()));

        insert_raw(&collection, "expired", Duration::seconds(-5)).await;
        let live_id = insert_raw(&collection, "live", Duration::hours(1)).await;

        assert!(repo.find_by_token("expired").await.unwrap().is_none());
        assert_eq!(
            repo.find_by_token("live").await.unwrap().map(|t| t.id),
            Some(live_id)
        );

        repo.delete(&live_id.to_string()).await.unwrap();
        assert!(repo.find_by_token("live").await.unwrap().is_none());
        assert!(repo.find_by_token("never-issued").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_collapses_malformed_and_unknown_ids() {
        let repo = repository();
        let token = repo.create("ci", None).await.unwrap();

        let unknown = Uuid::new_v4().to_string();
        for id in ["not-a-uuid", "", unknown.as_str()] {
            assert!(matches!(
                repo.delete(id).await,
                Err(RepositoryError::NotFound("Token"))
            ));
        }

        assert_ok!(repo.delete(&token.id.to_string()).await);
        assert!(matches!(
            repo.delete(&token.id.to_string()).await,
            Err(RepositoryError::NotFound("Token"))
        ));
        assert!(repo.find_by_id(&token.id.to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_id_treats_malformed_id_as_absent() {
        let repo = repository();
        assert!(repo.find_by_id("zzz").await.unwrap().is_none());
    }

    #[test]
    fn os_random_fills_the_buffer() {
        let mut first = [0u8; TOKEN_BYTES];
        let mut second = [0u8; TOKEN_BYTES];
        OsRandom.fill(&mut first).unwrap();
        OsRandom.fill(&mut second).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn created_and_now_share_precision() {
        let stamp = now();
        assert_eq!(stamp.timestamp_subsec_nanos() % 1_000_000, 0);
        assert!(Utc::now() >= stamp);
    }

    #[tokio::test]
    async fn store_failures_surface_from_every_path() {
        use crate::testing::FailingCollection;

        let repo = TokenRepository::new(Arc::new(FailingCollection::new(&TOKENS)));
        let id = Uuid::new_v4().to_string();

        assert!(matches!(repo.create("ci", None).await, Err(RepositoryError::Store(_))));
        assert!(matches!(repo.list().await, Err(RepositoryError::Store(_))));
        assert!(matches!(repo.delete(&id).await, Err(RepositoryError::Store(_))));
        assert!(matches!(repo.find_by_id(&id).await, Err(RepositoryError::Store(_))));
        assert!(matches!(
            repo.find_by_token("secret").await,
            Err(RepositoryError::Store(_))
        ));
    }

    #[tokio::test]
    async fn list_reports_cursor_failures() {
        use crate::testing::FailingCollection;

        let repo = TokenRepository::new(Arc::new(FailingCollection::failing_mid_stream(&TOKENS)));
        assert!(matches!(repo.list().await, Err(RepositoryError::Store(_))));
    }
}
