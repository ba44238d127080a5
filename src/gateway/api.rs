//! REST handlers for sessions and chat.
//!
//! Errors are returned as `{"detail": "..."}` with the status code from
//! [`SessionError::status_code`].

use super::AppState;
use crate::sessions::SessionError;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

// ── Request bodies ───────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionBody {
    pub session_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    pub session_id: Option<String>,
}

// ── Error mapping ────────────────────────────────────────────────

/// A [`SessionError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    error: SessionError,
    /// Chat failures are reported as "Error processing request: ...".
    chat: bool,
}

impl ApiError {
    fn chat(error: SessionError) -> Self {
        Self { error, chat: true }
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        Self { error, chat: false }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let detail = match &self.error {
            SessionError::Upstream(_) | SessionError::Timeout(_) | SessionError::Internal(_)
                if self.chat =>
            {
                format!("Error processing request: {}", self.error)
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Parse a JSON body. An empty body is treated as `{}`.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &body[..]
    };
    serde_json::from_slice(raw)
        .map_err(|e| SessionError::Validation(format!("Invalid request body: {e}")).into())
}

// ── Handlers ─────────────────────────────────────────────────────

/// `GET /`: liveness
pub async fn handle_root() -> impl IntoResponse {
    Json(json!({
        "message": "IT Support Agent API is running",
        "status": "healthy",
    }))
}

/// `GET /health`: liveness plus session count
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let agent_status = if state.gate.in_flight() > 0 { "busy" } else { "ready" };
    Json(json!({
        "status": "healthy",
        "active_sessions": state.store.len(),
        "agent_status": agent_status,
        "agent": state.gate.agent_name(),
    }))
}

/// `POST /sessions`: create a session
pub async fn handle_create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: CreateSessionBody = parse_body(&body)?;
    let created = state.store.create_session(body.session_name.as_deref()).await?;
    Ok(Json(created))
}

/// `GET /sessions`: all live sessions
pub async fn handle_list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.list_sessions().await)
}

/// `GET /sessions/{id}/messages`: a session's transcript
pub async fn handle_get_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.store.get_messages(&session_id).await?;
    Ok(Json(json!({ "messages": messages })))
}

/// DELETE /sessions/{id}
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete_session(&session_id).await?;
    Ok(Json(json!({ "message": "Session deleted successfully" })))
}

/// `POST /chat`: one turn, creating a session when needed
pub async fn handle_chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: ChatBody = parse_body(&body)?;
    let reply = state
        .store
        .chat(body.session_id.as_deref(), &body.message)
        .await
        .map_err(ApiError::chat)?;
    Ok((StatusCode::OK, Json(reply)))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn empty_body_parses_as_defaults() {
        let parsed: CreateSessionBody = parse_body(&Bytes::from_static(b"  ")).unwrap();
        assert!(parsed.session_name.is_none());
    }

    #[test]
    fn chat_body_requires_message() {
        let err = parse_body::<ChatBody>(&Bytes::from_static(b"{}")).unwrap_err();
        assert!(matches!(err.error, SessionError::Validation(_)));
    }

    #[tokio::test]
    async fn not_found_maps_to_404_detail() {
        let response = ApiError::from(SessionError::NotFound("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["detail"], "Session not found");
    }

    #[tokio::test]
    async fn chat_failures_are_prefixed() {
        let response = ApiError::chat(SessionError::Upstream("model down".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["detail"],
            "Error processing request: model down"
        );

        let response = ApiError::chat(SessionError::Timeout(30)).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn chat_validation_is_not_prefixed() {
        let error = SessionError::Validation("message must not be empty".into());
        let response = ApiError::chat(error).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["detail"], "message must not be empty");
    }
}
