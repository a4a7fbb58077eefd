use std::collections::BTreeMap;

use chrono::{
    DateTime,
    Utc,
};
use log::debug;

use super::sigv4::{
    self,
    AwsKeys,
    CanonicalRequest,
};
use super::{
    http_client,
    messages_body,
    parse_messages_response,
    send_json,
    ChatBackend,
    ChatRequest,
    ChatResponse,
};

pub const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const SERVICE: &str = "bedrock";

/// A request ready to be sent to Bedrock: target URL, headers and body.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    pub url:     String,
    pub headers: BTreeMap<String, String>,
    pub body:    Vec<u8>,
}

/// Anthropic models through the Bedrock runtime `InvokeModel` API.
pub struct BedrockBackend {
    access_key: String,
    secret_key: String,
    client:     reqwest::blocking::Client,
}

impl BedrockBackend {
    pub fn new(
        access_key: String,
        secret_key: String,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            access_key,
            secret_key,
            client: http_client()?,
        })
    }

    /// Builds and signs the `InvokeModel` call for `request` at `now`.
    pub fn sign(
        &self,
        request: &ChatRequest,
        now: DateTime<Utc>,
    ) -> anyhow::Result<SignedRequest> {
        let region = request.model.region.as_str();
        let host = format!("bedrock-runtime.{region}.amazonaws.com");
        let path = format!(
            "/model/{}/invoke",
            sigv4::uri_encode(&request.model.model_id, false)
        );
        // Non-S3 services encode the already encoded path once more.
        let canonical_uri = sigv4::uri_encode(&path, true);

        let mut body = messages_body(request);
        body["anthropic_version"] = BEDROCK_ANTHROPIC_VERSION.into();
        let body = serde_json::to_vec(&body)?;

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = sigv4::sha256_hex(&body);

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("host".to_string(), host.clone());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        headers.insert("x-amz-date".to_string(), amz_date.clone());

        let canonical = CanonicalRequest {
            method:       "POST",
            uri:          &canonical_uri,
            query:        "",
            headers:      &headers,
            payload_hash: &payload_hash,
        };
        let keys = AwsKeys {
            access_key: &self.access_key,
            secret_key: &self.secret_key,
        };
        let authorization = sigv4::authorization(&keys, region, SERVICE, &amz_date, &canonical);
        headers.insert("authorization".to_string(), authorization);

        Ok(SignedRequest {
            url: format!("https://{host}{path}"),
            headers,
            body,
        })
    }
}

impl ChatBackend for BedrockBackend {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn complete(
        &mut self,
        request: &ChatRequest,
    ) -> anyhow::Result<ChatResponse> {
        let signed = self.sign(request, Utc::now())?;
        debug!("Bedrock request to {}", signed.url);

        let mut http = self.client.post(&signed.url);
        for (name, value) in signed.headers.iter().filter(|(name, _)| *name != "host") {
            http = http.header(name.as_str(), value.as_str());
        }
        let value = send_json("bedrock", http.body(signed.body))?;
        Ok(parse_messages_response("bedrock", value)?)
    }
}
