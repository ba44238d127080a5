//! Session management: per-conversation transcripts and memory.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemorySessionStore;
pub use traits::{ChatReply, Message, Role, SessionError, SessionStore, SessionSummary};

use crate::agent::AgentGate;
use crate::config::Config;
use std::sync::Arc;

/// Create the default in-memory session store.
pub fn create_session_store(config: &Config, gate: Arc<AgentGate>) -> Arc<dyn SessionStore> {
    Arc::new(InMemorySessionStore::from_config(gate, config))
}
