//! The reasoning-agent contract.

use crate::memory::ChatMemory;
use async_trait::async_trait;
use serde_json::Value;

/// What an agent produced for one utterance.
///
/// Most agents answer with plain text. Some backends hand back a structured
/// payload instead; [`AgentResult::into_text`] is the single place that
/// decides how such a payload is shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentResult {
    Answer(String),
    Unstructured(Value),
}

impl AgentResult {
    /// Normalise to display text: a `response` field of an object wins, a
    /// bare JSON string is used verbatim, anything else is rendered as JSON.
    pub fn into_text(self) -> String {
        match self {
            Self::Answer(text) => text,
            Self::Unstructured(Value::String(text)) => text,
            Self::Unstructured(Value::Object(mut map)) => match map.remove("response") {
                Some(Value::String(text)) => text,
                Some(other) => other.to_string(),
                None => Value::Object(map).to_string(),
            },
            Self::Unstructured(other) => other.to_string(),
        }
    }
}

/// A reasoning agent. Implementations hold no per-conversation state: the
/// caller passes the conversation's memory on every call.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn chat(&self, memory: &ChatMemory, utterance: &str) -> anyhow::Result<AgentResult>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answer_is_returned_verbatim() {
        let text = "Restart the VPN client.";
        assert_eq!(AgentResult::Answer(text.into()).into_text(), text);
    }

    #[test]
    fn response_field_is_preferred() {
        let result =
            AgentResult::Unstructured(json!({"response": "Use the portal.", "sources": []}));
        assert_eq!(result.into_text(), "Use the portal.");
    }

    #[test]
    fn non_string_response_field_is_rendered() {
        let result = AgentResult::Unstructured(json!({"response": {"steps": 2}}));
        assert_eq!(result.into_text(), r#"{"steps":2}"#);
    }

    #[test]
    fn other_payloads_are_stringified() {
        assert_eq!(AgentResult::Unstructured(json!("plain")).into_text(), "plain");
        assert_eq!(AgentResult::Unstructured(json!({"a": 1})).into_text(), r#"{"a":1}"#);
        assert_eq!(AgentResult::Unstructured(json!([1, 2])).into_text(), "[1,2]");
    }
}
