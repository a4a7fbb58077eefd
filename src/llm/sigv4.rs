//! AWS Signature Version 4 request signing.

use std::collections::BTreeMap;

use hmac::{
    Hmac,
    Mac,
};
use itertools::Itertools;
use sha2::{
    Digest,
    Sha256,
};

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

pub struct AwsKeys<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
}

/// Parts of an HTTP request that take part in the signature. Header names
/// must be lower case; `uri` must already be in canonical form.
pub struct CanonicalRequest<'a> {
    pub method:       &'a str,
    pub uri:          &'a str,
    pub query:        &'a str,
    pub headers:      &'a BTreeMap<String, String>,
    pub payload_hash: &'a str,
}

impl CanonicalRequest<'_> {
    pub fn signed_headers(&self) -> String {
        self.headers.keys().join(";")
    }

    pub fn render(&self) -> String {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
            .join("");
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            self.uri,
            self.query,
            headers,
            self.signed_headers(),
            self.payload_hash
        )
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(
    key: &[u8],
    data: &[u8],
) -> Vec<u8> {
    // HMAC takes keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derives the signing key for `date` (`YYYYMMDD`).
pub fn signing_key(
    secret_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// Percent-encodes everything except RFC 3986 unreserved characters.
/// `/` is kept when `keep_slash` is set.
pub fn uri_encode(
    input: &str,
    keep_slash: bool,
) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            },
            b'/' if keep_slash => out.push('/'),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

/// Value of the `Authorization` header for `request`, sent at `amz_date`
/// (`YYYYMMDDTHHMMSSZ`).
pub fn authorization(
    keys: &AwsKeys<'_>,
    region: &str,
    service: &str,
    amz_date: &str,
    request: &CanonicalRequest<'_>,
) -> String {
    let date = &amz_date[..8.min(amz_date.len())];
    let scope = format!("{date}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(request.render().as_bytes())
    );
    let key = signing_key(keys.secret_key, date, region, service);
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
        keys.access_key,
        request.signed_headers()
    )
}
