//! Wire payloads exchanged with the backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CHAT_PATH: &str = "/jarvis/chat";
pub const HEALTH_PATH: &str = "/health";

/// One transmitted history entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ChatRequest {
    pub message: String,
    pub persona: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ContextHit {
    pub app_id: Option<Value>,
    pub file_path: Option<String>,
    pub chunk_text: Option<String>,
    pub score: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatLimits {
    pub max_input_words: usize,
    pub max_output_words: usize,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChatReply {
    pub reply: String,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub context_hits: Vec<ContextHit>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub limits: Option<ChatLimits>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Error body of a non-success response (`{"detail": ...}`).
#[derive(Deserialize, Debug, Clone)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Human-readable detail. Structured details are rendered as compact JSON.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}
