//! Bounded conversational memory.
//!
//! A [`ChatMemory`] keeps a rolling window of completed user/assistant
//! exchanges under a token budget. It is owned by exactly one session and is
//! only mutated after a turn succeeds, so the transcript and the memory never
//! disagree about which exchanges happened.

use crate::providers::ChatMessage;
use std::collections::VecDeque;

/// Default token budget for a session's memory window.
pub const DEFAULT_TOKEN_LIMIT: usize = 30_000;

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Exchange {
    user: String,
    assistant: String,
    tokens: usize,
}

/// A token-budgeted window of prior exchanges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMemory {
    token_limit: usize,
    exchanges: VecDeque<Exchange>,
    token_count: usize,
    recorded: u64,
}

impl ChatMemory {
    pub fn new(token_limit: usize) -> Self {
        Self {
            token_limit,
            exchanges: VecDeque::new(),
            token_count: 0,
            recorded: 0,
        }
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Estimated tokens currently held in the window.
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// Total exchanges ever recorded, including ones pruned from the window.
    pub fn exchange_count(&self) -> u64 {
        self.recorded
    }

    /// Exchanges still inside the window.
    pub fn window_len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Record one completed exchange, pruning the oldest exchanges until the
    /// window fits the budget again. The newest exchange is always kept.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        let user = user.into();
        let assistant = assistant.into();
        let tokens = estimate_tokens(&user) + estimate_tokens(&assistant);

        self.exchanges.push_back(Exchange {
            user,
            assistant,
            tokens,
        });
        self.token_count += tokens;
        self.recorded += 1;

        while self.token_count > self.token_limit && self.exchanges.len() > 1 {
            if let Some(dropped) = self.exchanges.pop_front() {
                self.token_count -= dropped.tokens;
            }
        }
    }

    /// Prior turns as chat messages, oldest first.
    pub fn window(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.exchanges.len() * 2);
        for exchange in &self.exchanges {
            messages.push(ChatMessage::user(exchange.user.clone()));
            messages.push(ChatMessage::assistant(exchange.assistant.clone()));
        }
        messages
    }

    /// Forget everything, keeping the budget.
    pub fn clear(&mut self) {
        self.exchanges.clear();
        self.token_count = 0;
        self.recorded = 0;
    }
}

impl Default for ChatMemory {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LIMIT)
    }
}
