//! Chat backends.
//!
//! Every provider implements [`ChatBackend`]. [`connect`] picks the cloud
//! backend (with local fallback) when it is configured and reachable, and
//! the local provider from [`Settings::resolve_provider`] otherwise.

mod anthropic;
mod bedrock;
mod cloud;
pub mod sigv4;
#[cfg(test)]
mod tests;

use std::time::Duration;

pub use anthropic::AnthropicBackend;
pub use bedrock::BedrockBackend;
pub use cloud::{
    CloudBackend,
    FallbackBackend,
};
use log::{
    info,
    warn,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    json,
    Value,
};
use thiserror::Error;

use crate::config::{
    AgentConfigurator,
    Credentials,
    ModelConfig,
    Settings,
};

/// Timeout of a single completion request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role:    Role,
    pub content: String,
}

impl Message {
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role:    Role::User,
            content: content.into(),
        }
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role:    Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model:      ModelConfig,
    pub system:     String,
    pub messages:   Vec<Message>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens:  u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text:        String,
    pub stop_reason: Option<String>,
    pub usage:       Usage,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request to {backend} failed: {source}")]
    Transport {
        backend: &'static str,
        #[source]
        source:  reqwest::Error,
    },
    #[error("{backend} returned HTTP {status}: {message}")]
    Status {
        backend: &'static str,
        status:  u16,
        message: String,
    },
    #[error("Unexpected response from {backend}: {message}")]
    InvalidResponse {
        backend: &'static str,
        message: String,
    },
}

impl BackendError {
    /// Errors after which another backend may still succeed.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::InvalidResponse { .. } => false,
        }
    }
}

pub trait ChatBackend: Send {
    fn name(&self) -> &str;

    fn complete(
        &mut self,
        request: &ChatRequest,
    ) -> anyhow::Result<ChatResponse>;
}

pub(crate) fn http_client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("lobster/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Body shared by the Anthropic Messages API and Bedrock's Anthropic
/// models. The model id is added by the direct API only.
pub(crate) fn messages_body(request: &ChatRequest) -> Value {
    let mut body = json!({
        "max_tokens": request.max_tokens,
        "temperature": request.model.temperature,
        "messages": request.messages,
    });
    if !request.system.is_empty() {
        body["system"] = json!(request.system);
    }
    body
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content:     Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage:       Usage,
}

/// Concatenates the text blocks of a Messages API response.
pub(crate) fn parse_messages_response(
    backend: &'static str,
    body: Value,
) -> Result<ChatResponse, BackendError> {
    let parsed: MessagesResponse =
        serde_json::from_value(body).map_err(|e| BackendError::InvalidResponse {
            backend,
            message: e.to_string(),
        })?;
    let text = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");
    Ok(ChatResponse {
        text,
        stop_reason: parsed.stop_reason,
        usage: parsed.usage,
    })
}

/// Message of an error body such as `{"error": {"message": "..."}}` or
/// `{"message": "..."}`, else the raw text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Sends a prepared request and decodes a JSON body, mapping failures onto
/// [`BackendError`].
pub(crate) fn send_json(
    backend: &'static str,
    request: reqwest::blocking::RequestBuilder,
) -> Result<Value, BackendError> {
    let response = request
        .send()
        .map_err(|source| BackendError::Transport { backend, source })?;
    let status = response.status();
    let text = response
        .text()
        .map_err(|source| BackendError::Transport { backend, source })?;
    if !status.is_success() {
        return Err(BackendError::Status {
            backend,
            status: status.as_u16(),
            message: error_message(&text),
        });
    }
    serde_json::from_str(&text).map_err(|e| BackendError::InvalidResponse {
        backend,
        message: e.to_string(),
    })
}

/// Local backend for the resolved credentials.
pub fn local_backend(settings: &Settings) -> anyhow::Result<Box<dyn ChatBackend>> {
    Ok(match settings.resolve_provider()? {
        Credentials::Anthropic { api_key } => Box::new(AnthropicBackend::new(api_key)?),
        Credentials::Bedrock {
            access_key,
            secret_key,
        } => Box::new(BedrockBackend::new(access_key, secret_key)?),
    })
}

/// Backend used by a session: the cloud with local fallback when a cloud
/// key and endpoint are set and the endpoint answers its health check,
/// the local provider otherwise.
pub fn connect(
    settings: &Settings,
    configurator: &AgentConfigurator,
) -> anyhow::Result<Box<dyn ChatBackend>> {
    info!("Connecting with agent profile '{}'", configurator.profile());

    if let Some((key, endpoint)) = settings.cloud() {
        let cloud = CloudBackend::new(endpoint, key)?;
        match cloud.health() {
            Ok(()) => {
                info!("Using Lobster cloud at {}", endpoint);
                return match local_backend(settings) {
                    Ok(local) => Ok(Box::new(FallbackBackend::new(cloud, local))),
                    Err(e) => {
                        warn!("No local fallback available: {}", e);
                        Ok(Box::new(cloud))
                    },
                };
            },
            Err(e) => warn!("Cloud endpoint unavailable ({}), using local provider", e),
        }
    }
    else if settings.is_cloud_requested() {
        warn!("LOBSTER_CLOUD_KEY is set without LOBSTER_CLOUD_ENDPOINT, using local provider");
    }

    local_backend(settings)
}
