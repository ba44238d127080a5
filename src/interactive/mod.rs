//! Terminal chat: one persistent conversation per running process.
//!
//! The transcript and memory live here, not in the session store, so
//! `/clear` simply starts over locally.

use crate::agent::AgentGate;
use crate::config::Config;
use crate::memory::ChatMemory;
use crate::sessions::{Message, Role};
use anyhow::Result;
use console::style;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

/// Slash commands understood by the prompt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Clear,
    History,
    Help,
    Quit,
}

const COMMANDS: &[(&str, &str)] = &[
    ("/clear", "Discard the conversation and start fresh"),
    ("/history", "Show the conversation so far"),
    ("/help", "Show available commands"),
    ("/quit", "Leave the chat"),
];

impl Command {
    /// `None` for ordinary input, `Some(Err)` for an unknown slash command.
    pub fn parse(line: &str) -> Option<Result<Self, String>> {
        let word = line.trim().split_whitespace().next()?;
        if !word.starts_with('/') {
            return None;
        }
        Some(match word.to_ascii_lowercase().as_str() {
            "/clear" | "/reset" => Ok(Self::Clear),
            "/history" => Ok(Self::History),
            "/help" | "/?" => Ok(Self::Help),
            "/quit" | "/exit" => Ok(Self::Quit),
            other => Err(format!("Unknown command {other}. Type /help for a list.")),
        })
    }
}

pub struct InteractiveSession {
    gate: Arc<AgentGate>,
    greeting: String,
    transcript: Vec<Message>,
    memory: ChatMemory,
}

impl InteractiveSession {
    pub fn new(
        gate: Arc<AgentGate>,
        greeting: impl Into<String>,
        memory_token_limit: usize,
    ) -> Self {
        let greeting = greeting.into();
        Self {
            gate,
            transcript: vec![Message::assistant(greeting.clone())],
            greeting,
            memory: ChatMemory::new(memory_token_limit),
        }
    }

    pub fn from_config(gate: Arc<AgentGate>, config: &Config) -> Self {
        Self::new(
            gate,
            config.sessions.greeting.clone(),
            config.agent.memory_token_limit,
        )
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn memory(&self) -> &ChatMemory {
        &self.memory
    }

    /// Drop transcript and memory, then re-seed the greeting.
    pub fn clear(&mut self) {
        self.memory.clear();
        self.transcript.clear();
        self.transcript.push(Message::assistant(self.greeting.clone()));
    }

    /// Run one turn and return the assistant entry that was appended.
    /// Failures are shown inline instead of ending the conversation.
    pub async fn send(&mut self, utterance: &str) -> &Message {
        self.transcript.push(Message::user(utterance));
        let reply = match self.gate.converse(&mut self.memory, utterance).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "interactive turn failed");
                format!("⚠️ Sorry, I encountered an error: {e}")
            }
        };
        self.transcript.push(Message::assistant(reply));
        &self.transcript[self.transcript.len() - 1]
    }
}

fn render(out: &mut impl Write, message: &Message) -> std::io::Result<()> {
    match message.role {
        Role::User => writeln!(out, "{} {}", style("You:").cyan().bold(), message.content),
        Role::Assistant => writeln!(out, "{} {}", style("Agent:").green().bold(), message.content),
    }
}

fn print_help(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Available commands:")?;
    for (cmd, desc) in COMMANDS {
        writeln!(out, "  {:<10} {desc}", style(cmd).yellow())?;
    }
    Ok(())
}

/// Prompt loop until `/quit` or end of input.
pub async fn run<R, W>(session: &mut InteractiveSession, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "{}", style("TechCorp IT Support").bold())?;
    writeln!(out, "{}", style("Type /help for commands.").dim())?;
    if let Some(greeting) = session.transcript().first() {
        render(out, greeting)?;
    }

    let mut lines = input.lines();
    loop {
        write!(out, "{} ", style(">").bold())?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse(line) {
            Some(Ok(Command::Quit)) => break,
            Some(Ok(Command::Clear)) => {
                session.clear();
                writeln!(out, "{}", style("Conversation cleared.").dim())?;
                if let Some(greeting) = session.transcript().first() {
                    render(out, greeting)?;
                }
            }
            Some(Ok(Command::History)) => {
                for message in session.transcript() {
                    render(out, message)?;
                }
            }
            Some(Ok(Command::Help)) => print_help(out)?,
            Some(Err(msg)) => writeln!(out, "{}", style(msg).red())?,
            None => {
                let reply = session.send(line).await.clone();
                render(out, &reply)?;
            }
        }
    }

    writeln!(out, "{}", style("Goodbye!").dim())?;
    Ok(())
}

/// Answer a single message and return the reply text.
pub async fn run_once(session: &mut InteractiveSession, message: &str) -> String {
    session.send(message).await.content.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentResult};
    use async_trait::async_trait;

    struct CountingAgent;

    #[async_trait]
    impl Agent for CountingAgent {
        async fn chat(&self, memory: &ChatMemory, utterance: &str) -> anyhow::Result<AgentResult> {
            if utterance == "fail" {
                anyhow::bail!("upstream exploded");
            }
            Ok(AgentResult::Answer(format!(
                "turn {} re: {utterance}",
                memory.exchange_count() + 1
            )))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn session() -> InteractiveSession {
        let gate = Arc::new(AgentGate::new(Arc::new(CountingAgent), 1, None));
        InteractiveSession::new(gate, "Hello!", 30_000)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("/clear"), Some(Ok(Command::Clear)));
        assert_eq!(Command::parse("  /QUIT "), Some(Ok(Command::Quit)));
        assert_eq!(Command::parse("/exit"), Some(Ok(Command::Quit)));
        assert_eq!(Command::parse("how do I reset VPN?"), None);
        assert!(matches!(Command::parse("/bogus"), Some(Err(_))));
    }

    #[tokio::test]
    async fn turns_accumulate_memory() {
        let mut session = session();
        assert_eq!(session.send("one").await.content, "turn 1 re: one");
        assert_eq!(session.send("two").await.content, "turn 2 re: two");
        assert_eq!(session.transcript().len(), 5);
        assert_eq!(session.memory().exchange_count(), 2);
    }

    #[tokio::test]
    async fn errors_are_shown_inline_and_memory_is_untouched() {
        let mut session = session();
        let reply = session.send("fail").await.clone();
        assert_eq!(reply.role, Role::Assistant);
        assert!(reply.content.starts_with("⚠️ Sorry, I encountered an error:"));
        assert!(reply.content.contains("upstream exploded"));
        assert_eq!(session.transcript().len(), 3);
        assert!(session.memory().is_empty());
    }

    #[tokio::test]
    async fn clear_resets_local_state() {
        let mut session = session();
        session.send("one").await;
        session.clear();
        assert_eq!(session.transcript(), &[Message::assistant("Hello!")]);
        assert!(session.memory().is_empty());
        assert_eq!(session.send("again").await.content, "turn 1 re: again");
    }

    #[tokio::test]
    async fn prompt_loop_handles_commands_and_chat() {
        let mut session = session();
        let input: &[u8] = b"hi there\n/help\n\n/clear\nsecond\n/history\n/quit\nnever read\n";
        let mut out = Vec::new();
        run(&mut session, tokio::io::BufReader::new(input), &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("turn 1 re: hi there"));
        assert!(text.contains("/history"));
        assert!(text.contains("Conversation cleared."));
        assert!(text.contains("turn 1 re: second"));
        assert!(text.contains("Goodbye!"));
        assert!(!text.contains("never read"));
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn prompt_loop_ends_on_eof() {
        let mut session = session();
        let input: &[u8] = b"only line";
        let mut out = Vec::new();
        run(&mut session, tokio::io::BufReader::new(input), &mut out)
            .await
            .unwrap();
        assert_eq!(session.memory().exchange_count(), 1);
    }

    #[test]
    fn history_replays_greeting() {
        let mut session = session();
        let input: &[u8] = b"/history\n/nope\n";
        let mut out = Vec::new();
        let reader = tokio::io::BufReader::new(input);
        tokio_test::block_on(run(&mut session, reader, &mut out)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Hello!").count(), 2);
        assert!(text.contains("Unknown command /nope"));
    }

    #[tokio::test]
    async fn single_shot() {
        let mut session = session();
        assert_eq!(run_once(&mut session, "ping").await, "turn 1 re: ping");
    }
}
