use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::history::{extract_text, ConversationTurn};

pub const NO_RESPONSE_TEXT: &str = "No response from Gemini";
pub const SERVER_ERROR_TEXT: &str = "Error communicating with server.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    prompt: &'a str,
}

/// Sends a JSON body and returns the parsed JSON answer.
/// Transport failures, non-2xx statuses and unparseable bodies are all `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, body: Value) -> Result<Value>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: Value) -> Result<Value> {
        let response = self.client.post(url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Chat request failed with status: {}", response.status()));
        }

        Ok(response.json().await?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// The endpoint answered; the raw payload is kept for the history
    Answered(Value),
    Failed,
}

/// Normalized response: display text is always present
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub outcome: ReplyOutcome,
}

impl ChatReply {
    pub fn from_payload(raw: Value) -> Self {
        let text = extract_text(&raw).unwrap_or(NO_RESPONSE_TEXT).to_string();
        Self {
            text,
            outcome: ReplyOutcome::Answered(raw),
        }
    }

    pub fn failed() -> Self {
        Self {
            text: SERVER_ERROR_TEXT.to_string(),
            outcome: ReplyOutcome::Failed,
        }
    }

    /// Failed replies have nothing to persist
    pub fn into_turn(self, prompt: &str) -> Option<ConversationTurn> {
        match self.outcome {
            ReplyOutcome::Answered(raw) => Some(ConversationTurn::new(prompt, raw)),
            ReplyOutcome::Failed => None,
        }
    }
}

#[derive(Clone)]
pub struct ChatClient {
    transport: Arc<dyn Transport>,
    endpoint: String,
}

impl ChatClient {
    pub fn new(endpoint: &str) -> Self {
        Self::with_transport(endpoint, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(endpoint: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Never fails; errors come back as a sentinel reply
    pub async fn send(&self, prompt: &str) -> ChatReply {
        let body = match serde_json::to_value(ChatRequest { prompt }) {
            Ok(body) => body,
            Err(e) => {
                warn!("could not encode chat request: {}", e);
                return ChatReply::failed();
            }
        };

        let started = Instant::now();
        match self.transport.post_json(&self.endpoint, body).await {
            Ok(raw) => {
                info!(elapsed_ms = started.elapsed().as_millis() as u64, "chat request answered");
                ChatReply::from_payload(raw)
            }
            Err(e) => {
                warn!(elapsed_ms = started.elapsed().as_millis() as u64, "chat request failed: {}", e);
                ChatReply::failed()
            }
        }
    }
}
