//! Per-call request options, URL composition and body encoding.
//!
//! # Design
//! `Options` is a plain value with public fields and no behavior beyond the
//! two pure steps the sender needs before any I/O: `build_url` and
//! `encode_body`. Both are also exposed as free functions so they can be
//! exercised without an `Options` value.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::error::RavenError;
use crate::transport::TransportSettings;

/// Everything needed to build and send one request.
///
/// `B` is the body type; it defaults to `serde_json::Value` so callers that
/// never set a body can write `let options: Options = ...`.
#[derive(Debug, Clone)]
pub struct Options<B = serde_json::Value> {
    /// Base origin, e.g. `http://localhost:8080`.
    pub host: String,
    /// Resource path, resolved against `host`.
    pub path: String,
    /// Method token. Validated when the request is built.
    pub method: String,
    /// Encoded as JSON; `None` encodes as `null`.
    pub body: Option<B>,
    pub query_params: HashMap<String, String>,
    /// Added after the default `Content-Type: application/json`.
    pub headers: HashMap<String, String>,
    /// Bounds the whole round trip when greater than zero.
    pub timeout: Duration,
    /// Extra attempts after a failed one.
    pub retry_count: u32,
}

impl<B> Default for Options<B> {
    fn default() -> Self {
        Self {
            host: String::new(),
            path: String::new(),
            method: String::new(),
            body: None,
            query_params: HashMap::new(),
            headers: HashMap::new(),
            timeout: Duration::ZERO,
            retry_count: 0,
        }
    }
}

impl<B: Serialize> Options<B> {
    pub fn build_url(&self) -> Result<String, RavenError> {
        build_url(&self.host, &self.path, &self.query_params)
    }

    pub fn encode_body(&self) -> Result<Vec<u8>, RavenError> {
        encode_body(self.body.as_ref())
    }

    /// Transport configuration: zero timeout and zero retries mean "unset".
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            timeout: (!self.timeout.is_zero()).then_some(self.timeout),
            retry_count: self.retry_count,
        }
    }
}

/// Resolve `path` against `host` and append `query_params`.
///
/// When parameters are given, the resolved URL's existing pairs and the new
/// ones are re-encoded together, sorted by key. Values of a repeated key keep
/// their order.
pub fn build_url(
    host: &str,
    path: &str,
    query_params: &HashMap<String, String>,
) -> Result<String, RavenError> {
    check_escapes(host)?;
    let base = Url::parse(host).map_err(|e| RavenError::invalid_url(host, e))?;

    check_reference(path)?;
    let mut url = base
        .join(path)
        .map_err(|e| RavenError::invalid_url(path, e))?;

    if !query_params.is_empty() {
        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        pairs.extend(
            query_params
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    Ok(url.into())
}

/// Serialize `body` to JSON. An absent body encodes as `null`.
pub fn encode_body<B: Serialize>(body: Option<&B>) -> Result<Vec<u8>, RavenError> {
    serde_json::to_vec(&body).map_err(RavenError::BodyEncoding)
}

/// Reject references a strict RFC 3986 parser would refuse but `Url::join`
/// would quietly treat as a relative path.
fn check_reference(reference: &str) -> Result<(), RavenError> {
    check_escapes(reference)?;

    let head = reference.split(['/', '?', '#']).next().unwrap_or_default();
    if let Some((scheme, _)) = head.split_once(':') {
        if scheme.is_empty() {
            return Err(RavenError::invalid_url(reference, "missing protocol scheme"));
        }
        if !is_scheme(scheme) {
            return Err(RavenError::invalid_url(
                reference,
                "first path segment in URL cannot contain colon",
            ));
        }
    }
    Ok(())
}

fn is_scheme(s: &str) -> bool {
    let mut bytes = s.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
}

fn check_escapes(input: &str) -> Result<(), RavenError> {
    let bytes = input.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b.is_ascii_control() {
            return Err(RavenError::invalid_url(input, "invalid control character in URL"));
        }
        if b == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(RavenError::invalid_url(input, "invalid URL escape"));
            }
        }
    }
    Ok(())
}
