use log::{
    debug,
    warn,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::{
    http_client,
    send_json,
    BackendError,
    ChatBackend,
    ChatRequest,
    ChatResponse,
    Message,
    Usage,
};

#[derive(Serialize)]
struct CloudQuery<'a> {
    model:      &'a str,
    system:     &'a str,
    messages:   &'a [Message],
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CloudReply {
    response:    String,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage:       Usage,
}

/// The hosted Lobster service: `GET /health` and `POST /query` with a
/// bearer key.
pub struct CloudBackend {
    endpoint: String,
    key:      String,
    client:   reqwest::blocking::Client,
}

impl CloudBackend {
    pub fn new(
        endpoint: &str,
        key: &str,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key:      key.to_string(),
            client:   http_client()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn health(&self) -> Result<(), BackendError> {
        let request = self
            .client
            .get(format!("{}/health", self.endpoint))
            .timeout(std::time::Duration::from_secs(10))
            .bearer_auth(&self.key);
        let response = request.send().map_err(|source| {
            BackendError::Transport {
                backend: "cloud",
                source,
            }
        })?;
        if response.status().is_success() {
            Ok(())
        }
        else {
            Err(BackendError::Status {
                backend: "cloud",
                status:  response.status().as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }
}

impl ChatBackend for CloudBackend {
    fn name(&self) -> &str {
        "cloud"
    }

    fn complete(
        &mut self,
        request: &ChatRequest,
    ) -> anyhow::Result<ChatResponse> {
        let body = CloudQuery {
            model:      &request.model.model_id,
            system:     &request.system,
            messages:   &request.messages,
            max_tokens: request.max_tokens,
        };
        debug!("Cloud query to {}", self.endpoint);
        let http = self
            .client
            .post(format!("{}/query", self.endpoint))
            .bearer_auth(&self.key)
            .json(&body);
        let value = send_json("cloud", http)?;
        let reply: CloudReply =
            serde_json::from_value(value).map_err(|e| BackendError::InvalidResponse {
                backend: "cloud",
                message: e.to_string(),
            })?;
        Ok(ChatResponse {
            text:        reply.response,
            stop_reason: reply.stop_reason,
            usage:       reply.usage,
        })
    }
}

/// Sends requests to `primary` until it becomes unavailable, then to
/// `fallback` for the rest of the session.
pub struct FallbackBackend<P = CloudBackend> {
    primary:   P,
    fallback:  Box<dyn ChatBackend>,
    use_local: bool,
}

impl<P: ChatBackend> FallbackBackend<P> {
    pub fn new(
        primary: P,
        fallback: Box<dyn ChatBackend>,
    ) -> Self {
        Self {
            primary,
            fallback,
            use_local: false,
        }
    }

    pub fn is_using_fallback(&self) -> bool {
        self.use_local
    }
}

impl<P: ChatBackend> ChatBackend for FallbackBackend<P> {
    fn name(&self) -> &str {
        if self.use_local {
            self.fallback.name()
        }
        else {
            self.primary.name()
        }
    }

    fn complete(
        &mut self,
        request: &ChatRequest,
    ) -> anyhow::Result<ChatResponse> {
        if !self.use_local {
            match self.primary.complete(request) {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let unavailable = e
                        .downcast_ref::<BackendError>()
                        .is_some_and(BackendError::is_unavailable);
                    if !unavailable {
                        return Err(e);
                    }
                    warn!(
                        "{} unavailable ({}), switching to {}",
                        self.primary.name(),
                        e,
                        self.fallback.name()
                    );
                    self.use_local = true;
                },
            }
        }
        self.fallback.complete(request)
    }
}
