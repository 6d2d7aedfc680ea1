//! Application services
//!
//! Request-level validation lives here; repositories persist whatever they
//! are handed.

use tracing::{error, info};

use crate::error::{RepositoryError, RepositoryResult};
use crate::models::{CreateTokenRequest, Message, NewMessage, SearchCriteria, Token};
use crate::repositories::{MessageRepository, TokenRepository};

fn require(value: &str, field: &str) -> RepositoryResult<()> {
    if value.trim().is_empty() {
        return Err(RepositoryError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn log_failure<T>(action: &str, result: RepositoryResult<T>) -> RepositoryResult<T> {
    if let Err(e) = &result {
        match e {
            RepositoryError::Store(_) | RepositoryError::Randomness(_) => {
                error!("Failed to {}: {}", action, e)
            }
            _ => info!("Refused to {}: {}", action, e),
        }
    }
    result
}

/// Message submission, search and deletion
#[derive(Clone)]
pub struct MessageService {
    repository: MessageRepository,
}

impl MessageService {
    pub fn new(repository: MessageRepository) -> Self {
        Self { repository }
    }

    pub async fn create(&self, new_message: NewMessage) -> RepositoryResult<Message> {
        require(&new_message.uid, "uid")?;
        require(&new_message.channel_id, "channelId")?;
        require(&new_message.sender, "sender")?;
        require(&new_message.content, "content")?;

        log_failure("create message", self.repository.create(new_message).await)
    }

    pub async fn search(&self, criteria: &SearchCriteria) -> RepositoryResult<Vec<Message>> {
        if let (Some(from), Some(to)) = (criteria.from_date, criteria.to_date) {
            if from > to {
                return Err(RepositoryError::Validation(
                    "fromDate must not be after toDate".to_string(),
                ));
            }
        }

        log_failure("search messages", self.repository.search(criteria).await)
    }

    pub async fn delete(&self, uid: &str) -> RepositoryResult<()> {
        log_failure("delete message", self.repository.delete(uid).await)
    }
}

/// Token issuance, listing and revocation
#[derive(Clone)]
pub struct TokenService {
    repository: TokenRepository,
}

impl TokenService {
    pub fn new(repository: TokenRepository) -> Self {
        Self { repository }
    }

    pub async fn create(&self, request: &CreateTokenRequest) -> RepositoryResult<Token> {
        require(&request.name, "name")?;

        log_failure(
            "issue token",
            self.repository.create(&request.name, request.expires_in).await,
        )
    }

    pub async fn list(&self) -> RepositoryResult<Vec<Token>> {
        log_failure("list tokens", self.repository.list().await)
    }

    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        log_failure("revoke token", self.repository.delete(id).await)
    }
}
