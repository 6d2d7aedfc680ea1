//! Application state shared across handlers

use std::sync::Arc;
use std::time::Duration;

use common::store::Collection;
use common::store::memory::MemoryStore;

use crate::config::AppConfig;
use crate::models::{MESSAGES, TOKENS};
use crate::repositories::{MessageRepository, TokenRepository};
use crate::services::{MessageService, TokenService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub message_service: MessageService,
    pub token_service: TokenService,
    /// Used directly by the authentication gate
    pub token_repository: TokenRepository,
    pub request_timeout: Duration,
}

impl AppState {
    /// Wire repositories and services over the given collections
    pub fn new(
        messages: Arc<dyn Collection>,
        tokens: Arc<dyn Collection>,
        config: &AppConfig,
    ) -> Self {
        let message_repository = MessageRepository::new(messages);
        let token_repository =
            TokenRepository::new(tokens).with_default_ttl(config.token_default_ttl_seconds);

        Self {
            message_service: MessageService::new(message_repository),
            token_service: TokenService::new(token_repository.clone()),
            token_repository,
            request_timeout: config.request_timeout(),
        }
    }

    /// State backed by a fresh in-memory store
    pub fn in_memory(config: &AppConfig) -> Self {
        let store = MemoryStore::new();
        Self::new(
            Arc::new(store.collection(&MESSAGES)),
            Arc::new(store.collection(&TOKENS)),
            config,
        )
    }
}
