use std::collections::BTreeMap;
use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};
use std::sync::Arc;

use chrono::TimeZone;
use serde_json::json;

use super::sigv4::{
    self,
    AwsKeys,
    CanonicalRequest,
};
use super::*;
use crate::config::{
    keys,
    MODEL_PRESETS,
};

fn request() -> ChatRequest {
    ChatRequest {
        model:      MODEL_PRESETS.get("claude-3-5-haiku").unwrap().clone(),
        system:     "You are Lobster.".to_string(),
        messages:   vec![Message::user("hello")],
        max_tokens: 256,
    }
}

/// Replies with a fixed text or fails with a fixed HTTP status, counting
/// calls.
struct MockBackend {
    name:   &'static str,
    status: Option<u16>,
    calls:  Arc<AtomicUsize>,
}

impl MockBackend {
    fn new(
        name: &'static str,
        status: Option<u16>,
    ) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                status,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl ChatBackend for MockBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn complete(
        &mut self,
        _request: &ChatRequest,
    ) -> anyhow::Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.status {
            Some(status) => {
                Err(BackendError::Status {
                    backend: "mock",
                    status,
                    message: "boom".to_string(),
                }
                .into())
            },
            None => {
                Ok(ChatResponse {
                    text:        format!("reply from {}", self.name),
                    stop_reason: Some("end_turn".to_string()),
                    usage:       Usage::default(),
                })
            },
        }
    }
}

#[test]
fn test_signing_key_vector() {
    let key = sigv4::signing_key(
        "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
        "20120215",
        "us-east-1",
        "iam",
    );
    assert_eq!(
        hex::encode(key),
        "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
    );
}

#[test]
fn test_authorization_get_vanilla() {
    let mut headers = BTreeMap::new();
    headers.insert("host".to_string(), "example.amazonaws.com".to_string());
    headers.insert("x-amz-date".to_string(), "20150830T123600Z".to_string());
    let payload_hash = sigv4::sha256_hex(b"");
    let canonical = CanonicalRequest {
        method:       "GET",
        uri:          "/",
        query:        "",
        headers:      &headers,
        payload_hash: &payload_hash,
    };
    let keys = AwsKeys {
        access_key: "AKIDEXAMPLE",
        secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
    };
    assert_eq!(
        sigv4::authorization(&keys, "us-east-1", "service", "20150830T123600Z", &canonical),
        "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
         SignedHeaders=host;x-amz-date, \
         Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
    );
}

#[test]
fn test_uri_encode() {
    assert_eq!(sigv4::uri_encode("a b:c/d", false), "a%20b%3Ac%2Fd");
    assert_eq!(sigv4::uri_encode("/model/x%3A0", true), "/model/x%253A0");
}

#[test]
fn test_bedrock_signed_request() {
    let backend = BedrockBackend::new("AKIA".into(), "secret".into()).unwrap();
    let now = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let signed = backend.sign(&request(), now).unwrap();

    assert_eq!(
        signed.url,
        "https://bedrock-runtime.us-east-1.amazonaws.com/model/us.anthropic.claude-3-5-haiku-20241022-v1%3A0/invoke"
    );
    assert_eq!(signed.headers["x-amz-date"], "20240102T030405Z");
    assert_eq!(signed.headers["x-amz-content-sha256"], sigv4::sha256_hex(&signed.body));

    let auth = &signed.headers["authorization"];
    assert!(auth.starts_with(
        "AWS4-HMAC-SHA256 Credential=AKIA/20240102/us-east-1/bedrock/aws4_request, \
         SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date, Signature="
    ));
    assert_eq!(auth.rsplit('=').next().unwrap().len(), 64);

    let body: serde_json::Value = serde_json::from_slice(&signed.body).unwrap();
    assert_eq!(body["anthropic_version"], "bedrock-2023-05-31");
    assert_eq!(body["max_tokens"], 256);
    assert!(body.get("model").is_none());
}

#[test]
fn test_messages_body() {
    let mut req = request();
    let body = messages_body(&req);
    assert_eq!(body["system"], "You are Lobster.");
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "hello");

    req.system.clear();
    assert!(messages_body(&req).get("system").is_none());
}

#[test]
fn test_parse_messages_response() {
    let body = json!({
        "id": "msg_1",
        "content": [
            {"type": "text", "text": "Hello "},
            {"type": "tool_use", "id": "t", "name": "x", "input": {}},
            {"type": "text", "text": "there"}
        ],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 12, "output_tokens": 3}
    });
    let response = parse_messages_response("anthropic", body).unwrap();
    assert_eq!(response.text, "Hello there");
    assert_eq!(response.stop_reason.as_deref(), Some("end_turn"));
    assert_eq!(response.usage.output_tokens, 3);

    assert!(parse_messages_response("anthropic", json!({"nope": 1})).is_err());
}

#[test]
fn test_error_message() {
    assert_eq!(
        error_message(r#"{"type":"error","error":{"type":"x","message":"bad key"}}"#),
        "bad key"
    );
    assert_eq!(error_message(r#"{"message":"throttled"}"#), "throttled");
    assert_eq!(error_message(" plain text "), "plain text");
}

#[test]
fn test_fallback_switches_permanently() {
    let (primary, primary_calls) = MockBackend::new("cloud", Some(503));
    let (local, local_calls) = MockBackend::new("local", None);
    let mut backend = FallbackBackend::new(primary, Box::new(local));
    assert_eq!(backend.name(), "cloud");

    let first = backend.complete(&request()).unwrap();
    assert_eq!(first.text, "reply from local");
    assert!(backend.is_using_fallback());
    assert_eq!(backend.name(), "local");

    backend.complete(&request()).unwrap();
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(local_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_fallback_keeps_client_errors() {
    let (primary, _) = MockBackend::new("cloud", Some(401));
    let (local, local_calls) = MockBackend::new("local", None);
    let mut backend = FallbackBackend::new(primary, Box::new(local));

    assert!(backend.complete(&request()).is_err());
    assert!(!backend.is_using_fallback());
    assert_eq!(local_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_local_backend_requires_credentials() {
    let settings = Settings::from_lookup(|_| None).unwrap();
    assert!(local_backend(&settings).is_err());
}

fn settings_with(pairs: &[(&str, &str)]) -> Settings {
    Settings::from_lookup(|key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .unwrap()
}

#[test]
fn test_connect_falls_back_when_cloud_is_down() {
    // Nothing listens on port 1, so the health check fails to connect.
    let settings = settings_with(&[
        (keys::ANTHROPIC_API_KEY, "sk-test"),
        (keys::CLOUD_KEY, "cloud-key"),
        (keys::CLOUD_ENDPOINT, "http://127.0.0.1:1"),
    ]);
    assert!(settings.cloud().is_some());
    let configurator = AgentConfigurator::with_lookup(None, None, |_| None).unwrap();

    let backend = connect(&settings, &configurator).unwrap();
    assert_eq!(backend.name(), "anthropic");
}

#[test]
fn test_connect_cloud_key_without_endpoint() {
    let settings = settings_with(&[
        (keys::ANTHROPIC_API_KEY, "sk-test"),
        (keys::CLOUD_KEY, "cloud-key"),
    ]);
    assert!(settings.is_cloud_requested());
    assert!(settings.cloud().is_none());
    let configurator = AgentConfigurator::with_lookup(None, None, |_| None).unwrap();

    let backend = connect(&settings, &configurator).unwrap();
    assert_eq!(backend.name(), "anthropic");
}

#[test]
fn test_connect_without_any_credentials_fails() {
    let settings = settings_with(&[
        (keys::CLOUD_KEY, "cloud-key"),
        (keys::CLOUD_ENDPOINT, "http://127.0.0.1:1"),
    ]);
    let configurator = AgentConfigurator::with_lookup(None, None, |_| None).unwrap();
    assert!(connect(&settings, &configurator).is_err());
}
