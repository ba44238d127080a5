//! Serialised access to the shared agent.
//!
//! Every chat turn in the process runs through one [`AgentGate`]. A turn
//! first acquires an [`ActiveContext`] (a semaphore permit, released when the
//! context drops on any exit path) and only then invokes the agent with the
//! caller's memory. With the default single permit at most one invocation is
//! in flight at any instant.

use super::traits::{Agent, AgentResult};
use crate::memory::ChatMemory;
use crate::providers::sanitize_api_error;
use crate::sessions::SessionError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{info, warn};

pub struct AgentGate {
    agent: Arc<dyn Agent>,
    permits: Semaphore,
    max_concurrent: usize,
    timeout: Option<Duration>,
}

/// Exclusive right to invoke the agent, held for the whole invocation.
pub struct ActiveContext<'a> {
    agent: &'a dyn Agent,
    _permit: SemaphorePermit<'a>,
}

impl ActiveContext<'_> {
    /// Run the agent against `memory`. Failures are sanitised into
    /// [`SessionError::Upstream`].
    pub async fn invoke(
        &self,
        memory: &ChatMemory,
        utterance: &str,
    ) -> Result<String, SessionError> {
        self.agent
            .chat(memory, utterance)
            .await
            .map(AgentResult::into_text)
            .map_err(|e| SessionError::Upstream(sanitize_api_error(&format!("{e:#}"))))
    }
}

impl AgentGate {
    /// `timeout` of `None` waits indefinitely.
    pub fn new(agent: Arc<dyn Agent>, max_concurrent: usize, timeout: Option<Duration>) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            agent,
            permits: Semaphore::new(max_concurrent),
            max_concurrent,
            timeout,
        }
    }

    /// Build from `[agent]` settings; `chat_timeout_secs = 0` disables the timeout.
    pub fn from_config(agent: Arc<dyn Agent>, config: &crate::config::AgentConfig) -> Self {
        let timeout = (config.chat_timeout_secs > 0)
            .then(|| Duration::from_secs(config.chat_timeout_secs));
        Self::new(agent, config.max_concurrent_chats, timeout)
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    /// Invocations currently holding a context.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// Wait for exclusive access to the agent.
    pub async fn acquire(&self) -> Result<ActiveContext<'_>, SessionError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SessionError::Internal("agent gate closed".into()))?;
        Ok(ActiveContext {
            agent: self.agent.as_ref(),
            _permit: permit,
        })
    }

    /// One full turn: wait for the agent, invoke it, and on success record
    /// the exchange in `memory`. The timeout covers only the invocation, not
    /// the time spent queued behind other turns. A failed or timed-out turn
    /// leaves `memory` untouched.
    pub async fn converse(
        &self,
        memory: &mut ChatMemory,
        utterance: &str,
    ) -> Result<String, SessionError> {
        let queued = Instant::now();
        let context = self.acquire().await?;
        let waited_ms = queued.elapsed().as_millis() as u64;

        let started = Instant::now();
        let invocation = context.invoke(memory, utterance);
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .unwrap_or_else(|_| Err(SessionError::Timeout(limit.as_secs()))),
            None => invocation.await,
        };
        drop(context);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(answer) => {
                memory.record_exchange(utterance, answer.as_str());
                info!(
                    elapsed_ms,
                    waited_ms,
                    memory_tokens = memory.token_count(),
                    "chat turn completed"
                );
                Ok(answer)
            }
            Err(e) => {
                warn!(elapsed_ms, waited_ms, error = %e, "chat turn failed");
                Err(e)
            }
        }
    }
}
