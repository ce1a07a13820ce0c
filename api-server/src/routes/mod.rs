//! Route handlers

pub mod analytics;
pub mod auth;
pub mod comment;
pub mod file;
pub mod health;
pub mod task;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query,
    },
    http::{HeaderMap, StatusCode},
    middleware, Json, Router,
};
use serde::Serialize;
use taskdesk_core::{task::parse_positive, Error, FieldError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::{rate_limit, state::AppState};

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
            errors: None,
        }
    }
}

pub type RouteError = (StatusCode, Json<ErrorResponse>);

pub fn route_error(status: StatusCode, message: impl Into<String>) -> RouteError {
    (status, Json(ErrorResponse::new(message)))
}

pub fn bad_request(message: impl Into<String>) -> RouteError {
    route_error(StatusCode::BAD_REQUEST, message)
}

pub fn unauthorized(message: impl Into<String>) -> RouteError {
    route_error(StatusCode::UNAUTHORIZED, message)
}

pub fn forbidden(message: impl Into<String>) -> RouteError {
    route_error(StatusCode::FORBIDDEN, message)
}

pub fn not_found(message: impl Into<String>) -> RouteError {
    route_error(StatusCode::NOT_FOUND, message)
}

pub fn internal_error(detail: impl std::fmt::Display) -> RouteError {
    let detail = detail.to_string();
    error!("Request failed: {}", detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            message: "Internal server error".to_string(),
            detail: Some(detail),
            errors: None,
        }),
    )
}

/// Map a core error onto its HTTP status and body.
pub fn core_error(err: Error) -> RouteError {
    match err {
        Error::Validation(errors) => {
            warn!("Validation failed: {}", errors);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    message: "Validation failed".to_string(),
                    detail: None,
                    errors: Some(errors.fields().to_vec()),
                }),
            )
        }
        Error::TaskNotFound(_) => not_found("Task not found"),
        Error::CommentNotFound(_) => not_found("Comment not found"),
        Error::FileNotFound(_) => not_found("File not found"),
        Error::Upload(message) => bad_request(message),
        Error::NotFound(message) => not_found(message),
        Error::NoOpUpdate => bad_request("No valid updates provided"),
        Error::Reference(message) | Error::Conflict(message) => {
            route_error(StatusCode::CONFLICT, message)
        }
        err @ (Error::Storage(_) | Error::Serialization(_)) => internal_error(err),
    }
}

/// Unwrap a JSON body, answering malformed ones with a 400 in the usual error shape.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, RouteError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, RouteError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

/// Parse a numeric path segment.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, RouteError> {
    parse_positive(raw).ok_or_else(|| bad_request(format!("Invalid {} ID", what)))
}

/// Id of the caller, from the bearer token.
pub fn current_user(state: &AppState, headers: &HeaderMap) -> Result<i64, RouteError> {
    crate::auth::authenticate(state.tokens(), headers).map_err(|err| {
        warn!("Rejected request: {}", err);
        unauthorized(err.to_string())
    })
}

/// 404 unless an active task has this id.
pub async fn require_task(state: &AppState, task_id: i64) -> Result<(), RouteError> {
    match state.tasks().find_by_id(task_id).await.map_err(core_error)? {
        Some(_) => Ok(()),
        None => Err(not_found("Task not found")),
    }
}

/// The full REST application with rate limits, CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let auth_routes = auth::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit::limit_auth,
    ));
    let task_routes = task::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit::limit_task_creation,
    ));
    let file_routes = file::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit::limit_file_upload,
    ));
    let analytics_routes = analytics::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit::limit_analytics,
    ));

    Router::new()
        .merge(health::router())
        .merge(auth_routes)
        .merge(task_routes)
        .merge(comment::router())
        .merge(file_routes)
        .merge(analytics_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_general,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::net::SocketAddr;

    use axum::{
        body::{to_bytes, Body},
        extract::ConnectInfo,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::{config::ServerConfig, state::AppState};

    pub const LOCAL_PEER: &str = "127.0.0.1:40000";

    pub struct TestApp {
        pub state: AppState,
        pub router: Router,
        _temp_dir: TempDir,
    }

    pub fn build_app() -> TestApp {
        let temp_dir = TempDir::new().unwrap();
        let config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            jwt_secret: "test-secret".to_string(),
            ..Default::default()
        };
        let state = AppState::open(&config).unwrap();
        TestApp {
            router: super::app(state.clone()),
            state,
            _temp_dir: temp_dir,
        }
    }

    fn json_request(
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    fn decode(bytes: &[u8]) -> Value {
        if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(bytes).unwrap()
        }
    }

    impl TestApp {
        pub async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            self.send_from(LOCAL_PEER, method, uri, token, body).await
        }

        /// Like [`TestApp::send`], as seen from the client at `peer`.
        pub async fn send_from(
            &self,
            peer: &str,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let (status, bytes) = self
                .dispatch_from(peer, json_request(method, uri, token, body))
                .await;
            (status, decode(&bytes))
        }

        /// POST a `multipart/form-data` body built by the caller.
        pub async fn send_multipart(
            &self,
            uri: &str,
            token: &str,
            boundary: &str,
            body: Vec<u8>,
        ) -> (StatusCode, Value) {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap();
            let (status, bytes) = self.dispatch(request).await;
            (status, decode(&bytes))
        }

        pub async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
            self.dispatch_from(LOCAL_PEER, request).await
        }

        async fn dispatch_from(
            &self,
            peer: &str,
            mut request: Request<Body>,
        ) -> (StatusCode, Vec<u8>) {
            let peer: SocketAddr = peer.parse().unwrap();
            request.extensions_mut().insert(ConnectInfo(peer));

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, bytes.to_vec())
        }

        /// Register a user and log in, returning the token and the user id.
        pub async fn sign_up(&self, email: &str, full_name: &str) -> (String, i64) {
            let (status, _) = self
                .send(
                    "POST",
                    "/api/auth/register",
                    None,
                    Some(json!({
                        "email": email,
                        "password": "Secret1!",
                        "fullName": full_name
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);

            let (status, payload) = self
                .send(
                    "POST",
                    "/api/auth/login",
                    None,
                    Some(json!({ "email": email, "password": "Secret1!" })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            (
                payload["token"].as_str().unwrap().to_string(),
                payload["user"]["id"].as_i64().unwrap(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdesk_core::ValidationErrors;

    #[test]
    fn validation_errors_list_fields() {
        let mut errors = ValidationErrors::new();
        errors.push("title", "Title is required");
        let (status, Json(body)) = core_error(Error::Validation(errors));

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "Validation failed");
        assert_eq!(body.errors.unwrap()[0].field, "title");
    }

    #[test]
    fn core_errors_map_to_statuses() {
        assert_eq!(core_error(Error::TaskNotFound(3)).0, StatusCode::NOT_FOUND);
        assert_eq!(core_error(Error::NoOpUpdate).0, StatusCode::BAD_REQUEST);
        assert_eq!(core_error(Error::FileNotFound(2)).0, StatusCode::NOT_FOUND);
        let (status, Json(body)) = core_error(Error::Upload("No files provided".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "No files provided");
        assert_eq!(
            core_error(Error::Reference("Assigned user(s) not found: 9".into())).0,
            StatusCode::CONFLICT
        );

        let (status, Json(body)) = core_error(Error::Storage("disk full".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.detail.as_deref(), Some("Storage error: disk full"));
    }

    #[test]
    fn ids_must_be_positive() {
        assert_eq!(parse_id("12", "task").unwrap(), 12);
        let (status, Json(body)) = parse_id("abc", "task").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "Invalid task ID");
    }
}
