use std::fmt;

use tracing::warn;

use crate::api::{ChatReply, ChatRequest, CHAT_PATH};
use crate::core::api_client::{ApiClient, ApiError};
use crate::core::constants::{CHAT_CONTEXT_WINDOW, MAX_CHAT_INPUT_WORDS};
use crate::core::message::{ChatMessage, ChatRole};
use crate::utils::append_log::AppendLog;

/// Persona the backend assumes when none is selected.
const FALLBACK_PERSONA: &str = "assessment";

/// Input rejected before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Empty,
    TooManyWords { count: usize, max: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Empty => write!(f, "Message is empty"),
            ValidationError::TooManyWords { count, max } => write!(
                f,
                "Message has {count} words; the limit is {max}. Please shorten it."
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result of a sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The backend replied; carries the appended assistant message
    Replied(ChatMessage),
    /// The call failed; carries the appended diagnostic message
    Degraded(ChatMessage),
}

impl ChatOutcome {
    pub fn message(&self) -> &ChatMessage {
        match self {
            ChatOutcome::Replied(message) | ChatOutcome::Degraded(message) => message,
        }
    }
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// A conversation with the backend assistant.
///
/// Local history grows without bound; only the last
/// [`CHAT_CONTEXT_WINDOW`] entries travel with each request.
pub struct ChatSession {
    api: ApiClient,
    history: AppendLog<ChatMessage>,
    input: String,
    context: Option<String>,
}

impl ChatSession {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            history: AppendLog::new(),
            input: String::new(),
            context: None,
        }
    }

    /// Handle to the live transcript, readable while a request is in flight.
    pub fn transcript(&self) -> AppendLog<ChatMessage> {
        self.history.clone()
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.snapshot()
    }

    /// Free-form description of what the user is looking at, sent as `context`.
    pub fn set_context(&mut self, context: Option<String>) {
        self.context = context;
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
    }

    /// Validate, record and send `text`.
    ///
    /// Validation failures send nothing and leave history untouched. API
    /// failures are not returned as errors: they are appended as an assistant
    /// diagnostic and reported through [`ChatOutcome::Degraded`].
    pub async fn send_message(&mut self, text: &str) -> Result<ChatOutcome, ValidationError> {
        let message = text.trim();
        if message.is_empty() {
            return Err(ValidationError::Empty);
        }
        let count = count_words(message);
        if count > MAX_CHAT_INPUT_WORDS {
            return Err(ValidationError::TooManyWords {
                count,
                max: MAX_CHAT_INPUT_WORDS,
            });
        }

        self.input.clear();
        self.append(ChatRole::User, message.to_string());

        let request = ChatRequest {
            message: message.to_string(),
            persona: self
                .api
                .session()
                .persona()
                .map(|session| session.persona.id)
                .unwrap_or_else(|| FALLBACK_PERSONA.to_string()),
            context: self.context.clone(),
            history: self
                .history
                .tail(CHAT_CONTEXT_WINDOW)
                .iter()
                .map(ChatMessage::to_history_entry)
                .collect(),
        };

        match self.api.post::<_, ChatReply>(CHAT_PATH, &request).await {
            Ok(reply) => Ok(ChatOutcome::Replied(
                self.append(ChatRole::Assistant, reply.reply),
            )),
            Err(err) => {
                warn!(status = err.status, error = %err.message, "chat request failed");
                Ok(ChatOutcome::Degraded(
                    self.append(ChatRole::Assistant, diagnostic_for(&err)),
                ))
            }
        }
    }

    /// Put `text` in the input and send it, as if the user had typed it.
    pub async fn send_suggestion(&mut self, text: &str) -> Result<ChatOutcome, ValidationError> {
        self.set_input(text);
        let pending = std::mem::take(&mut self.input);
        let result = self.send_message(&pending).await;
        if result.is_err() {
            self.input = pending;
        }
        result
    }

    fn append(&self, role: ChatRole, content: String) -> ChatMessage {
        let message = ChatMessage {
            role,
            content,
            order: self.history.len(),
        };
        self.history.push(message.clone());
        message
    }
}

fn diagnostic_for(err: &ApiError) -> String {
    if err.status == 0 {
        "I couldn't reach the JARVIS backend. Check that it is running and try again."
            .to_string()
    } else {
        format!(
            "Sorry, I couldn't answer that ({}: {}). Please try again.",
            err.status, err.message
        )
    }
}
