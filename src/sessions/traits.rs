//! Session storage traits and types.

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Failures surfaced by the session store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    /// The agent or the hosted model failed. Message is already sanitised.
    #[error("{0}")]
    Upstream(String),
    /// The turn did not finish in time; safe to retry.
    #[error("agent did not respond within {0}s")]
    Timeout(u64),
    #[error("{0}")]
    Internal(String),
}

impl SessionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Upstream(_))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Public descriptor of a live session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    pub session_name: String,
    pub message_count: usize,
}

/// Answer to one chat turn and the session it was recorded in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
}

/// Live conversations, each with its own transcript and memory.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session seeded with the greeting. `None` uses the default name.
    async fn create_session(&self, name: Option<&str>) -> Result<SessionSummary, SessionError>;

    /// All live sessions in creation order.
    async fn list_sessions(&self) -> Vec<SessionSummary>;

    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>, SessionError>;

    /// Remove a session and its memory. Deleting twice fails with `NotFound`.
    async fn delete_session(&self, session_id: &str) -> Result<(), SessionError>;

    /// Run one turn. An absent, empty or unknown id creates a new session.
    async fn chat(
        &self,
        session_id: Option<&str>,
        utterance: &str,
    ) -> Result<ChatReply, SessionError>;

    /// Number of live sessions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The name of this session store implementation.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(SessionError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            SessionError::Validation("empty".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(SessionError::Timeout(5).status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            SessionError::Upstream("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(SessionError::Timeout(5).is_retryable());
        assert!(!SessionError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn message_serializes_lowercase_role() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
    }
}
