//! External scoring-model client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;

/// A fallible remote evaluation call: a formatted document plus a
/// task-specific instruction in, a score/decision string out.
#[async_trait]
pub trait ScoringClient: Send + Sync {
    async fn evaluate(&self, document: &str, instruction: &str)
        -> Result<String, ScoringClientError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringClientError {
    #[error("scoring request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("scoring endpoint returned status {0}")]
    Status(u16),
    #[error("scoring response carried no content")]
    MissingContent,
}

/// Chat-completion style HTTP client for the scoring model.
pub struct HttpScoringClient {
    http: reqwest::Client,
    api_url: String,
    api_token: String,
    model: String,
}

impl HttpScoringClient {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_token: config.api_token.clone(),
            model: config.model.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ScoringClient for HttpScoringClient {
    async fn evaluate(
        &self,
        document: &str,
        instruction: &str,
    ) -> Result<String, ScoringClientError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: document,
                },
            ],
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScoringClientError::Status(response.status().as_u16()));
        }

        let payload: ChatResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or(ScoringClientError::MissingContent)
    }
}
