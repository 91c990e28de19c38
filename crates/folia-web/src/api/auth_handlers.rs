use std::time::Instant;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::auth::jwt;
use crate::auth::middleware::bearer_token;
use crate::dto::{LoginRequest, LoginResponse};
use crate::error::AppError;
use crate::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let username = body.username.unwrap_or_else(|| "user".to_string());

    if state.config.has_auth() {
        let hash = state.config.auth.password_hash.clone();
        let password = body.password;

        let valid = tokio::task::spawn_blocking(move || {
            crate::auth::password::verify_password(&hash, &password)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

        if !valid {
            tracing::warn!("Failed login attempt: invalid password");
            return Err(AppError::Auth("Invalid credentials".to_string()));
        }
        tracing::info!("Password verified successfully for user: {username}");
    }

    let (token, expires_at) = jwt::create_token(
        &state.config.auth.jwt_secret,
        state.config.auth.jwt_ttl_hours,
        &username,
    )?;

    Ok(Json(LoginResponse { token, expires_at }))
}

/// Revokes the bearer token, if a valid one was presented.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    if let Some(token) = bearer_token(&headers) {
        if let Ok(claims) = jwt::verify_token(&state.config.auth.jwt_secret, token) {
            state.revoked_tokens.insert(claims.jti.clone(), Instant::now());
            tracing::info!("Token revoked for user: {} (jti: {})", claims.sub, claims.jti);
        }
    }

    Json(serde_json::json!({ "ok": true }))
}
