//! Bearer token authentication gate

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use crate::{error::AuthError, models::Token, state::AppState};

/// Path of the only route reachable without a credential
pub const TOKEN_ISSUANCE_PATH: &str = "/tokens";

/// Token resolved by the gate, available to handlers as an extension
#[derive(Debug, Clone)]
pub struct AuthenticatedToken {
    pub token: Token,
    pub token_id: String,
}

fn is_token_issuance<B>(req: &Request<B>) -> bool {
    req.method() == Method::POST && req.uri().path() == TOKEN_ISSUANCE_PATH
}

/// Extract the credential from an `Authorization: Bearer <value>` header
///
/// The header must split on single spaces into exactly two parts, the first
/// being the literal `Bearer`.
fn parse_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = match headers.get(AUTHORIZATION) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthError::MissingCredentials),
    };
    let value = value.to_str().map_err(|_| AuthError::InvalidFormat)?;

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", credential] => Ok(*credential),
        _ => Err(AuthError::InvalidFormat),
    }
}

/// Authentication middleware
///
/// Token issuance passes straight through; every other request must carry a
/// bearer credential matching a live, unexpired token.
pub async fn auth_gate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    if is_token_issuance(&req) {
        return Ok(next.run(req).await);
    }

    let credential = parse_bearer(req.headers())?.to_owned();

    let token = state
        .token_repository
        .find_by_token(&credential)
        .await
        .map_err(|e| {
            error!("Failed to validate token: {}", e);
            AuthError::Lookup(e)
        })?
        .ok_or(AuthError::InvalidToken)?;

    debug!("Authenticated request with token {}", token.id);
    let token_id = token.id.to_string();
    req.extensions_mut()
        .insert(AuthenticatedToken { token, token_id });

    Ok(next.run(req).await)
}
