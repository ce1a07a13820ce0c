use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use taskdesk_core::user::{LoginInput, RegisterInput};
use tracing::{info, warn};

use super::{
    core_error, current_user, forbidden, internal_error, json_body, not_found, unauthorized,
    RouteError,
};
use crate::{
    auth::{hash_password, verify_password},
    state::{AppState, UserProfile},
};

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    user: UserProfile,
}

async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), RouteError> {
    let registration = json_body(body)?.validate().map_err(core_error)?;

    let password_hash = hash_password(&registration.password);
    let user = state
        .users()
        .create(&registration.email, &password_hash, &registration.full_name)
        .await
        .map_err(core_error)?;
    info!("Registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully",
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<LoginResponse>, RouteError> {
    let (email, password) = json_body(body)?.validate().map_err(core_error)?;

    let Some(user) = state.users().find_by_email(&email).await.map_err(core_error)? else {
        warn!("Login failed: unknown email");
        return Err(unauthorized("Invalid credentials"));
    };
    if !user.active {
        return Err(forbidden("Account is inactive"));
    }
    if !verify_password(&user.password_hash, &password) {
        warn!("Login failed for user {}", user.id);
        return Err(unauthorized("Invalid credentials"));
    }

    let token = state
        .tokens()
        .issue(user.id, &user.email, &user.full_name)
        .map_err(internal_error)?;

    Ok(Json(LoginResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, RouteError> {
    let user_id = current_user(&state, &headers)?;

    if let Some(profile) = state.profiles().get(&user_id).await {
        return Ok(Json(profile));
    }

    let user = state
        .users()
        .find_by_id(user_id)
        .await
        .map_err(core_error)?
        .ok_or_else(|| not_found("User not found"))?;
    if !user.active {
        return Err(forbidden("Account is inactive"));
    }

    let profile = UserProfile::from(&user);
    state.profiles().insert(user_id, profile.clone()).await;
    Ok(Json(profile))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}
