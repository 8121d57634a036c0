//! Repeatable-read wrapper around one HTTP response.
//!
//! # Design
//! Reading a response body normally consumes it. Every read here drains the
//! current stream and puts a fresh reader over the captured bytes back in its
//! place, so the body can be read again any number of times in any order.

use std::fmt;
use std::io::{Cursor, Read};

use serde::de::DeserializeOwned;

use crate::error::RavenError;
use crate::http::{BodyStream, HttpResponse};

/// The caller-owned result of `RavenTree::send_raven`.
///
/// Reads take `&mut self`; sharing one response between threads needs the
/// caller's own synchronization.
pub struct RavenResponse {
    inner: HttpResponse,
}

impl RavenResponse {
    pub fn new(inner: HttpResponse) -> Self {
        Self { inner }
    }

    /// Wrap an in-memory body.
    pub fn from_bytes(status: u16, headers: Vec<(String, String)>, body: impl Into<Vec<u8>>) -> Self {
        Self::new(HttpResponse {
            status,
            headers,
            body: Box::new(Cursor::new(body.into())),
        })
    }

    pub fn status(&self) -> u16 {
        self.inner.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.inner.status)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.inner.headers
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Decode the body as JSON into `T`.
    pub fn parse_body_to<T: DeserializeOwned>(&mut self) -> Result<T, RavenError> {
        let bytes = self.body_bytes();
        serde_json::from_slice(&bytes).map_err(RavenError::BodyDecoding)
    }

    /// The body as text. Invalid UTF-8 is replaced, and a read error ends the
    /// body at whatever was read before it.
    pub fn parse_body_to_string(&mut self) -> String {
        String::from_utf8_lossy(&self.body_bytes()).into_owned()
    }

    /// The raw body bytes, subject to the same read-error handling as
    /// `parse_body_to_string`.
    pub fn body_bytes(&mut self) -> Vec<u8> {
        let mut bytes = Vec::new();
        if let Err(err) = self.inner.body.read_to_end(&mut bytes) {
            tracing::debug!(error = %err, read = bytes.len(), "response body read failed");
        }
        self.inner.body = Box::new(Cursor::new(bytes.clone()));
        bytes
    }

    /// Give up the wrapper and take the body stream.
    pub fn into_body(self) -> BodyStream {
        self.inner.body
    }

    pub fn into_inner(self) -> HttpResponse {
        self.inner
    }
}

impl fmt::Debug for RavenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RavenResponse")
            .field("status", &self.inner.status)
            .field("headers", &self.inner.headers)
            .finish_non_exhaustive()
    }
}

impl From<HttpResponse> for RavenResponse {
    fn from(inner: HttpResponse) -> Self {
        Self::new(inner)
    }
}
