//! HTTP request/response types passed between the sender and a transport.
//!
//! # Design
//! `HttpRequest` is plain data: the sender builds it without touching the
//! network, and a `Transport` executes it. `HttpResponse` carries the body as
//! a reader because the response wrapper needs to drain and restore it.

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use crate::error::RavenError;

/// HTTP method for a request.
///
/// Names are case-sensitive, so `"get"` is an extension method and not
/// `Get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
    /// Any other syntactically valid token.
    Extension(String),
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Extension(token) => token,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = RavenError;

    /// An empty token means `GET`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s {
            "" | "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            "TRACE" => HttpMethod::Trace,
            "CONNECT" => HttpMethod::Connect,
            token if token.bytes().all(is_tchar) => HttpMethod::Extension(token.to_string()),
            token => {
                return Err(RavenError::InvalidRequest(format!(
                    "invalid method {token:?}"
                )))
            }
        };
        Ok(method)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 9110 token characters.
fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// A fully built outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Header pairs in the order they are added; names may repeat.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Readable response body.
pub type BodyStream = Box<dyn Read + Send>;

/// A raw response as returned by a `Transport`.
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: BodyStream,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
