//! HTTP client for the external chat backend.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use scentpick_core::config::ChatBackendConfig;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("chat backend transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat backend returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Wire payload for one user turn. `external_thread_id` correlates the
/// conversation across services and `message.idempotency_key` is also sent
/// as the `X-Idempotency-Key` header so the backend can dedupe retries.
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    pub user_id: i64,
    pub conversation_id: Option<i64>,
    pub external_thread_id: Uuid,
    pub title: Option<String>,
    pub query: String,
    pub message: ChatRequestMessage,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatRequestMessage {
    pub content: String,
    pub idempotency_key: Uuid,
    pub metadata: Value,
}

/// Backend reply. Every field is defaulted so schema drift on the backend
/// side degrades to empty values instead of a decode failure.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub conversation_id: Option<i64>,
    #[serde(default)]
    pub external_thread_id: Option<Uuid>,
    #[serde(default)]
    pub final_answer: String,
    #[serde(default)]
    pub messages_appended: Vec<Value>,
    #[serde(default)]
    pub perfume_list: Option<Value>,
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn run(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError>;
}

pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
    service_token: SecretString,
}

impl HttpChatBackend {
    pub fn new(config: &ChatBackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            service_token: config.service_token.clone(),
        })
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn run(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("X-Service-Token", self.service_token.expose_secret())
            .header("X-Idempotency-Key", request.message.idempotency_key.to_string())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(
                event_name = "chat.backend.api_error",
                status = status.as_u16(),
                "chat backend rejected request"
            );
            return Err(BackendError::Api { status: status.as_u16(), message });
        }

        Ok(response.json::<ChatResponse>().await?)
    }
}
