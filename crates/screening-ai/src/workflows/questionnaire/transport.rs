//! Chat-transport boundary.
//!
//! The engine neither speaks HTTP nor any messenger protocol; it consumes
//! already-decoded [`CandidateInput`] values and emits [`OutboundMessage`]
//! values. Push delivery (reminders) goes through the [`ChatTransport`]
//! trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{ChatId, QuestionId};

/// One inbound candidate action, tagged with its stable chat identity by the
/// adapter that received it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateInput {
    Command { name: CommandName },
    Text { body: String },
    File { reference: String },
    Callback { data: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    Start,
    Cancel,
}

/// What the engine sends back through the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text { body: String },
    Choice { body: String, options: Vec<ChoiceButton> },
    Ack { body: String },
}

impl OutboundMessage {
    pub fn body(&self) -> &str {
        match self {
            OutboundMessage::Text { body }
            | OutboundMessage::Choice { body, .. }
            | OutboundMessage::Ack { body } => body,
        }
    }
}

/// A single inline button: visible label plus the callback payload echoed
/// back on tap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceButton {
    pub label: String,
    pub callback: String,
}

impl ChoiceButton {
    pub fn new(label: impl Into<String>, callback: CallbackData) -> Self {
        Self {
            label: label.into(),
            callback: callback.encode(),
        }
    }
}

/// Structured payload carried by inline buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackData {
    Consent(bool),
    Choice(String),
    Continue,
    Edit(QuestionId),
    Page(usize),
    Submit,
    Cancel,
}

impl CallbackData {
    pub fn encode(&self) -> String {
        match self {
            CallbackData::Consent(true) => "consent:yes".to_string(),
            CallbackData::Consent(false) => "consent:no".to_string(),
            CallbackData::Choice(label) => format!("choice:{label}"),
            CallbackData::Continue => "continue".to_string(),
            CallbackData::Edit(question) => format!("edit:{}", question.0),
            CallbackData::Page(page) => format!("page:{page}"),
            CallbackData::Submit => "submit".to_string(),
            CallbackData::Cancel => "cancel".to_string(),
        }
    }

    /// Decode a callback payload; `None` for anything stale or foreign.
    pub fn decode(raw: &str) -> Option<Self> {
        match raw {
            "consent:yes" => return Some(CallbackData::Consent(true)),
            "consent:no" => return Some(CallbackData::Consent(false)),
            "continue" => return Some(CallbackData::Continue),
            "submit" => return Some(CallbackData::Submit),
            "cancel" => return Some(CallbackData::Cancel),
            _ => {}
        }

        if let Some(label) = raw.strip_prefix("choice:") {
            return Some(CallbackData::Choice(label.to_string()));
        }
        if let Some(id) = raw.strip_prefix("edit:") {
            return id.parse::<i64>().ok().map(|id| CallbackData::Edit(QuestionId(id)));
        }
        if let Some(page) = raw.strip_prefix("page:") {
            return page.parse::<usize>().ok().map(CallbackData::Page);
        }

        None
    }
}

/// Push delivery used off the request path (reminders). Webhook-style
/// adapters answer inline instead and only need this for the scheduler.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn deliver(&self, chat: &ChatId, message: OutboundMessage) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("chat transport unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_payloads_round_trip() {
        let payloads = [
            CallbackData::Consent(true),
            CallbackData::Consent(false),
            CallbackData::Choice("Remote only".to_string()),
            CallbackData::Continue,
            CallbackData::Edit(QuestionId(42)),
            CallbackData::Page(3),
            CallbackData::Submit,
            CallbackData::Cancel,
        ];
        for payload in payloads {
            let decoded = CallbackData::decode(&payload.encode()).expect("decodes");
            assert_eq!(decoded, payload);
        }
    }

    #[test]
    fn stale_callbacks_decode_to_none() {
        assert_eq!(CallbackData::decode("edit:abc"), None);
        assert_eq!(CallbackData::decode("page:"), None);
        assert_eq!(CallbackData::decode("unknown"), None);
    }
}
