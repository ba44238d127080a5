//! In-memory session store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::traits::{ChatReply, Message, SessionError, SessionStore, SessionSummary};
use crate::agent::AgentGate;
use crate::config::SessionsConfig;
use crate::memory::ChatMemory;

struct Session {
    id: String,
    name: String,
    seq: u64,
    created_at: DateTime<Utc>,
    last_activity: Mutex<DateTime<Utc>>,
    messages: Mutex<Vec<Message>>,
    /// Held for a whole chat turn, which also orders turns within the session.
    memory: tokio::sync::Mutex<ChatMemory>,
}

impl Session {
    fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            session_name: self.name.clone(),
            message_count: self.messages.lock().len(),
        }
    }

    fn push(&self, message: Message) {
        self.messages.lock().push(message);
        *self.last_activity.lock() = Utc::now();
    }
}

/// An in-memory session store backed by a mutex-protected hash map.
///
/// The map lock is only held for lookups and inserts. Each chat turn holds
/// its session's memory lock across the agent call, and the shared
/// [`AgentGate`] bounds how many turns reach the agent at once.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    next_seq: AtomicU64,
    gate: Arc<AgentGate>,
    settings: SessionsConfig,
    memory_token_limit: usize,
}

impl InMemorySessionStore {
    pub fn new(gate: Arc<AgentGate>, settings: SessionsConfig, memory_token_limit: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            gate,
            settings,
            memory_token_limit,
        }
    }

    pub fn from_config(gate: Arc<AgentGate>, config: &crate::config::Config) -> Self {
        Self::new(gate, config.sessions.clone(), config.agent.memory_token_limit)
    }

    fn lookup(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().get(session_id).cloned()
    }

    fn insert_new(&self, name: &str) -> Arc<Session> {
        let now = Utc::now();
        let session = Arc::new(Session {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            created_at: now,
            last_activity: Mutex::new(now),
            messages: Mutex::new(vec![Message::assistant(self.settings.greeting.clone())]),
            memory: tokio::sync::Mutex::new(ChatMemory::new(self.memory_token_limit)),
        });

        let mut sessions = self.sessions.lock();
        if self.settings.max_sessions > 0 && sessions.len() >= self.settings.max_sessions {
            let oldest = sessions
                .values()
                .min_by_key(|s| *s.last_activity.lock())
                .map(|s| s.id.clone());
            if let Some(evicted) = oldest {
                sessions.remove(&evicted);
                warn!(
                    session_id = %evicted,
                    max_sessions = self.settings.max_sessions,
                    "session capacity reached, evicted least recently active session"
                );
            }
        }
        sessions.insert(session.id.clone(), session.clone());
        drop(sessions);

        info!(session_id = %session.id, name = %session.name, "session created");
        session
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, name: Option<&str>) -> Result<SessionSummary, SessionError> {
        let name = name.unwrap_or(&self.settings.default_name);
        Ok(self.insert_new(name).summary())
    }

    async fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<Arc<Session>> = self.sessions.lock().values().cloned().collect();
        sessions.sort_by_key(|s| s.seq);
        sessions.iter().map(|s| s.summary()).collect()
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>, SessionError> {
        let session = self
            .lookup(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        let messages = session.messages.lock().clone();
        Ok(messages)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        let removed = self.sessions.lock().remove(session_id);
        match removed {
            Some(session) => {
                let age_secs = (Utc::now() - session.created_at).num_seconds();
                info!(session_id, age_secs, "session deleted");
                Ok(())
            }
            None => Err(SessionError::NotFound(session_id.to_string())),
        }
    }

    async fn chat(
        &self,
        session_id: Option<&str>,
        utterance: &str,
    ) -> Result<ChatReply, SessionError> {
        if utterance.trim().is_empty() {
            return Err(SessionError::Validation("message must not be empty".into()));
        }

        let requested = session_id.map(str::trim).filter(|id| !id.is_empty());
        let session = match requested.and_then(|id| self.lookup(id)) {
            Some(session) => session,
            None => {
                if let Some(id) = requested {
                    debug!(session_id = id, "unknown session id, creating a new session");
                }
                self.insert_new(&self.settings.auto_name)
            }
        };

        let mut memory = session.memory.lock().await;
        session.push(Message::user(utterance));

        match self.gate.converse(&mut memory, utterance).await {
            Ok(answer) => {
                session.push(Message::assistant(answer.clone()));
                Ok(ChatReply {
                    response: answer,
                    session_id: session.id.clone(),
                })
            }
            Err(e) => {
                // The user message stays in the transcript; memory is unchanged.
                warn!(
                    session_id = %session.id,
                    retryable = e.is_retryable(),
                    error = %e,
                    "chat turn failed"
                );
                Err(e)
            }
        }
    }

    fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
