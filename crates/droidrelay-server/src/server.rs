//! HTTP routes and request handling.
//!
//! The server exposes one command endpoint and a health probe:
//!
//! - `POST /api/adb/navigate` runs a single `command` or a `sequence` of
//!   commands against `device_id` and reports per-command results.
//! - `GET /health` reports that the server is up and which backend it uses.
//!
//! All per-command failures come back inside a `200` response as
//! `success: false`. Only a request that is unauthorised, unparsable or
//! carries neither `command` nor `sequence` gets an error status.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use droidrelay_core::command::CommandDescriptor;
use droidrelay_core::executor::{CommandExecutor, ExecutionResult, ResultPayload};

pub const NAVIGATE_PATH: &str = "/api/adb/navigate";
pub const HEALTH_PATH: &str = "/health";

/// Shared, read-only state handed to every request.
pub struct ServerState {
    pub executor: CommandExecutor,
    pub default_device_id: String,
    pub auth_token: Option<String>,
}

impl ServerState {
    pub fn new(executor: CommandExecutor, default_device_id: impl Into<String>) -> Self {
        Self {
            executor,
            default_device_id: default_device_id.into(),
            auth_token: None,
        }
    }

    /// Requires callers to present `Authorization: Bearer <token>`.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.auth_token else {
            return true;
        };
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .is_some_and(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()))
    }

    fn device_for<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(id) if !id.is_empty() => id,
            _ => &self.default_device_id,
        }
    }
}

/// Extracts the credentials of a `Bearer` authorization header. The scheme
/// name is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim_start().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|token| !token.is_empty())
}

/// Compares without stopping at the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

/// Body of `POST /api/adb/navigate`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NavigateRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub command: Option<CommandDescriptor>,
    #[serde(default)]
    pub sequence: Option<Vec<CommandDescriptor>>,
}

/// Response in single-command mode. `result` and `error` serialize as
/// `null` when absent.
#[derive(Debug, Deserialize, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub result: Option<ResultPayload>,
    pub error: Option<String>,
}

impl From<ExecutionResult> for CommandResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            success: result.success,
            result: result.result,
            error: result.error,
        }
    }
}

/// Response in sequence mode.
#[derive(Debug, Deserialize, Serialize)]
pub struct SequenceResponse {
    pub success: bool,
    pub results: Vec<ExecutionResult>,
    pub executed: usize,
}

/// Error body for requests rejected before any command runs.
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        success: false,
        error: message.into(),
    };
    (status, Json(body)).into_response()
}

/// Builds the application router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(NAVIGATE_PATH, post(navigate))
        .route(HEALTH_PATH, get(health))
        .with_state(state)
}

async fn health(State(state): State<Arc<ServerState>>) -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "backend": state.executor.driver().name(),
    }))
    .into_response()
}

async fn navigate(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Result<Json<NavigateRequest>, JsonRejection>,
) -> Response {
    let span = info_span!("request", id = %Uuid::new_v4());
    async move {
        if !state.is_authorized(&headers) {
            warn!("rejected request without valid bearer token");
            return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
        }

        let Json(request) = match body {
            Ok(body) => body,
            Err(rejection) => {
                debug!(error = %rejection.body_text(), "malformed request body");
                return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
            }
        };

        let device_id = state.device_for(request.device_id.as_deref());

        // A sequence wins when both fields are present.
        if let Some(sequence) = request.sequence {
            info!(device = %device_id, commands = sequence.len(), "executing sequence");
            let outcome = state.executor.execute_all(device_id, &sequence).await;
            let response = SequenceResponse {
                success: outcome.success,
                executed: outcome.results.len(),
                results: outcome.results,
            };
            return Json(response).into_response();
        }

        if let Some(command) = request.command {
            info!(device = %device_id, command = %command.kind, "executing command");
            let result = state.executor.execute(device_id, &command).await;
            return Json(CommandResponse::from(result)).into_response();
        }

        error_response(StatusCode::BAD_REQUEST, "No command or sequence provided")
    }
    .instrument(span)
    .await
}
