use log::debug;

use super::{
    http_client,
    messages_body,
    parse_messages_response,
    send_json,
    ChatBackend,
    ChatRequest,
    ChatResponse,
};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Direct Anthropic Messages API.
pub struct AnthropicBackend {
    api_key: String,
    url:     String,
    client:  reqwest::blocking::Client,
}

impl AnthropicBackend {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Self::with_url(api_key, ANTHROPIC_API_URL)
    }

    pub fn with_url(
        api_key: String,
        url: &str,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            url: url.to_string(),
            client: http_client()?,
        })
    }
}

impl ChatBackend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn complete(
        &mut self,
        request: &ChatRequest,
    ) -> anyhow::Result<ChatResponse> {
        let model = request.model.anthropic_model_id();
        let mut body = messages_body(request);
        body["model"] = model.clone().into();
        debug!("Anthropic request to {} ({} messages)", model, request.messages.len());

        let http = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);
        let value = send_json("anthropic", http)?;
        Ok(parse_messages_response("anthropic", value)?)
    }
}
