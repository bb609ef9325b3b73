//! Bearer-token authentication for the HTTP routes.

use crate::auth::verify_token;
use crate::AppState;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use likoo_store::{ChatStore, User};
use std::sync::Arc;

/// The authenticated user, stored in request extensions.
#[derive(Clone, Debug)]
pub struct IdentityContext(pub User);

/// Authenticates a request via `Authorization: Bearer <token>`.
///
/// The token must verify against the shared secret and name a user that
/// still exists. Any failure is a `401`.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get("Authorization")
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let user_id = verify_token(&token, &state.token_key).map_err(|e| {
        tracing::debug!("bearer token rejected: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    let user = tokio::task::spawn_blocking(move || state.store.find_user(&user_id))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!("failed to load authenticated user: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(IdentityContext(user));

    Ok(next.run(req).await)
}
