//! Bearer-token authentication and password hashing.

mod jwt;
mod password;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use thiserror::Error;

pub use jwt::TokenIssuer;
pub use password::{hash_password, verify_password};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication token missing")]
    MissingToken,
    #[error("Invalid or expired token: {0}")]
    InvalidToken(String),
    #[error("Invalid token: missing user ID")]
    MissingSubject,
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// The token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Id of the user a request's bearer token was issued to.
pub fn authenticate(issuer: &TokenIssuer, headers: &HeaderMap) -> Result<i64, AuthError> {
    let token = bearer_token(headers)?;
    issuer.verify(token)?.user_id()
}
