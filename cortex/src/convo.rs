//! The conversation engine: dialogue history plus the tool-calling loop.

use crate::ling::{ChatMessage, Chatter};
use crate::tools::ToolDispatcher;
use crate::types::{Origin, Utterance};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Spoken when the tool loop hits its round bound without a final reply.
pub const FALLBACK_REPLY: &str = "Sorry, I wasn't able to complete that request.";
/// Spoken when the model returns no usable text.
pub const EMPTY_REPLY: &str = "Sorry, I didn't catch that.";

/// Build the default persona prompt with the current date baked in, so the
/// model knows when "today" is before it decides to search.
pub fn default_system_prompt(robot_name: &str) -> String {
    let today = chrono::Utc::now().format("%B %d, %Y");
    format!(
        "You are {robot_name}, a friendly humanoid robot assistant in a classroom.\n\n\
         Today's date is {today}. Use the web_search tool for recent events, current \
         news and anything dated; do not search for facts you already know.\n\n\
         You are talking out loud, so keep replies SHORT (1-3 sentences), natural and \
         conversational. You may perform gestures while talking when it adds to the \
         conversation; do not overuse them."
    )
}

/// Sliding-window dialogue log, bounded to the last `max_turns` exchanges
/// (oldest evicted first). Only [`ConversationEngine`] mutates it.
#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: VecDeque<Utterance>,
    max_turns: usize,
}

impl ConversationLog {
    pub fn new(max_turns: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_turns,
        }
    }

    pub fn push(&mut self, utterance: Utterance) {
        self.entries.push_back(utterance);
        // One turn is a user/assistant pair.
        while self.entries.len() > self.max_turns * 2 {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn utterances(&self) -> impl Iterator<Item = &Utterance> {
        self.entries.iter()
    }

    /// Render the log as plain chat messages. Tool traffic from earlier
    /// turns is never in the log, so the backend cannot see stale tool-call
    /// metadata.
    pub fn as_messages(&self) -> Vec<ChatMessage> {
        self.entries
            .iter()
            .map(|u| match u.origin {
                Origin::User => ChatMessage::user(&u.text),
                Origin::Assistant => ChatMessage::assistant(&u.text),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub system_prompt: String,
    /// Sliding-window size of the dialogue log, in turns.
    pub max_turns: usize,
    /// Maximum inference rounds per turn once tools get involved.
    pub max_tool_rounds: usize,
    /// Deadline on each inference call.
    pub call_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt("Rosie"),
            max_turns: 10,
            max_tool_rounds: 2,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Runs one dialogue turn to completion: inference, tool dispatch, follow-up
/// inference, and the history commit.
pub struct ConversationEngine {
    chatter: Arc<dyn Chatter>,
    dispatcher: ToolDispatcher,
    log: Mutex<ConversationLog>,
    config: EngineConfig,
}

impl ConversationEngine {
    pub fn new(chatter: Arc<dyn Chatter>, dispatcher: ToolDispatcher, config: EngineConfig) -> Self {
        let log = Mutex::new(ConversationLog::new(config.max_turns));
        Self {
            chatter,
            dispatcher,
            log,
            config,
        }
    }

    /// Snapshot of the dialogue log.
    pub async fn history(&self) -> Vec<Utterance> {
        self.log.lock().await.utterances().cloned().collect()
    }

    /// Run one turn for a normalized-to-text user utterance and return the
    /// assistant reply.
    ///
    /// Tool rounds are bounded by `max_tool_rounds`; if the model is still
    /// asking for tools at the bound, the turn resolves to [`FALLBACK_REPLY`]
    /// instead of looping. Every tool call receives exactly one result
    /// before the next inference call, and error results stay visible to the
    /// model for the rest of the turn. Tool traffic is not committed to the
    /// sliding-window log.
    pub async fn take_turn(&self, user: &Utterance) -> anyhow::Result<Utterance> {
        let mut messages = Vec::new();
        messages.push(ChatMessage::system(&self.config.system_prompt));
        messages.extend(self.log.lock().await.as_messages());
        messages.push(ChatMessage::user(&user.text));

        let mut final_text = None;
        for round in 0..self.config.max_tool_rounds {
            let reply = timeout(
                self.config.call_timeout,
                self.chatter.chat(&messages, self.dispatcher.schema()),
            )
            .await
            .map_err(|_| anyhow::anyhow!("inference call timed out"))??;

            if reply.tool_calls.is_empty() {
                final_text = Some(reply.text);
                break;
            }

            info!(
                round,
                tools = ?reply.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "model requested tools"
            );
            messages.push(ChatMessage::assistant_calls(
                reply.text.clone(),
                reply.tool_calls.clone(),
            ));
            for call in &reply.tool_calls {
                let result = self.dispatcher.dispatch(call).await;
                messages.push(ChatMessage::tool_result(&result));
            }
        }

        let text = match final_text {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            Some(_) => {
                debug!("model returned empty text");
                EMPTY_REPLY.to_string()
            }
            None => {
                warn!(
                    rounds = self.config.max_tool_rounds,
                    "tool loop hit its round bound"
                );
                FALLBACK_REPLY.to_string()
            }
        };

        let assistant = Utterance::assistant(text);
        {
            let mut log = self.log.lock().await;
            log.push(user.clone());
            log.push(assistant.clone());
        }
        Ok(assistant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_evicts_oldest_turns_first() {
        let mut log = ConversationLog::new(2);
        for i in 0..5 {
            log.push(Utterance::user_text(format!("q{i}")));
            log.push(Utterance::assistant(format!("a{i}")));
        }
        assert_eq!(log.len(), 4);
        let first = log.utterances().next().unwrap();
        assert_eq!(first.text, "q3");
    }

    #[test]
    fn log_messages_have_no_tool_metadata() {
        let mut log = ConversationLog::new(4);
        log.push(Utterance::user_text("hello"));
        log.push(Utterance::assistant("hi there"));
        for msg in log.as_messages() {
            assert!(msg.tool_calls.is_empty());
            assert!(msg.tool_call_id.is_none());
        }
    }

    #[test]
    fn system_prompt_names_the_robot() {
        let prompt = default_system_prompt("Rosie");
        assert!(prompt.starts_with("You are Rosie"));
        assert!(prompt.contains("web_search"));
    }
}
