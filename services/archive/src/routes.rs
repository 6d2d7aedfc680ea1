//! Archive service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::extract::WithRejection;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::debug;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{AuthenticatedToken, TOKEN_ISSUANCE_PATH, auth_gate},
    models::{CreateTokenRequest, NewMessage, SearchCriteria},
    state::AppState,
};

/// Create the router for the archive service
///
/// Every route sits behind the authentication gate, which lets token
/// issuance through on its own.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/messages", post(create_message))
        .route("/messages/search", get(search_messages))
        .route("/messages/:uid", delete(delete_message))
        .route(TOKEN_ISSUANCE_PATH, get(list_tokens).post(create_token))
        .route("/tokens/:id", delete(delete_token))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_gate))
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Archive a new message
pub async fn create_message(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<NewMessage>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let message = state.message_service.create(payload).await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Search live messages, most recently sent first
pub async fn search_messages(
    State(state): State<AppState>,
    WithRejection(Query(criteria), _): WithRejection<Query<SearchCriteria>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let messages = state.message_service.search(&criteria).await?;

    Ok(Json(messages))
}

/// Delete a message by uid
pub async fn delete_message(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.message_service.delete(&uid).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// List live tokens
pub async fn list_tokens(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedToken>,
) -> ApiResult<impl IntoResponse> {
    debug!("Token {} listing tokens", caller.token_id);
    let tokens = state.token_service.list().await?;

    Ok(Json(tokens))
}

/// Issue a new token
pub async fn create_token(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateTokenRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let token = state.token_service.create(&payload).await?;

    Ok((StatusCode::CREATED, Json(token)))
}

/// Revoke a token by id
pub async fn delete_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.token_service.delete(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}
