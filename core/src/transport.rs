//! The underlying HTTP client seam.
//!
//! # Design
//! `RavenTree` only configures a `Transport` and hands it a built
//! `HttpRequest`; connection handling, timeout enforcement and retries belong
//! to the transport. `UreqTransport` is the default; tests substitute their
//! own implementation to observe what would have been sent.

use std::pin::pin;
use std::thread;
use std::time::{Duration, Instant};

use futures::channel::oneshot;
use futures::executor::block_on;
use futures::future::{self, Either};
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, RequestBuilder};

use crate::context::Context;
use crate::error::RavenError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// How the transport should treat one send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportSettings {
    /// Bound on the whole exchange, retries included.
    pub timeout: Option<Duration>,
    /// Extra attempts after a failed one.
    pub retry_count: u32,
}

/// Executes a built request.
pub trait Transport {
    /// Run `request`, honouring `settings` and the cancellation in `ctx` on
    /// every attempt.
    fn execute(
        &self,
        ctx: &Context,
        settings: &TransportSettings,
        request: &HttpRequest,
    ) -> Result<HttpResponse, RavenError>;
}

/// `ureq`-backed transport.
///
/// Every attempt gets a fresh agent whose global timeout is the time left
/// before the overall deadline. A failed attempt is one that errors at the
/// transport level or answers with a 5xx status; it is retried immediately,
/// up to `retry_count` times. Status codes are never turned into errors, so a
/// final 5xx comes back as a response.
///
/// Each attempt runs on its own thread and races the context's cancellation
/// token; a cancel drops the attempt and fails the send at once. The
/// abandoned thread ends when `ureq` does, bounded by the attempt timeout.
#[derive(Debug, Clone, Default)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        Self
    }

    fn agent(&self, timeout: Option<Duration>) -> Agent {
        Agent::config_builder()
            .http_status_as_error(false)
            .allow_non_standard_methods(true)
            .timeout_global(timeout)
            .build()
            .new_agent()
    }

    /// Run one attempt, giving up as soon as `ctx` is cancelled.
    fn attempt(
        &self,
        ctx: &Context,
        agent: Agent,
        request: &HttpRequest,
    ) -> Result<HttpResponse, RavenError> {
        let (tx, rx) = oneshot::channel();
        let request = request.clone();
        thread::Builder::new()
            .name("raven-attempt".to_string())
            .spawn(move || {
                // The receiver is gone when the send was cancelled.
                let _ = tx.send(run_attempt(&agent, &request));
            })
            .map_err(|e| RavenError::Transport(e.to_string()))?;

        block_on(async {
            let cancelled = pin!(ctx.token().cancelled());
            match future::select(cancelled, rx).await {
                Either::Left(_) => Err(RavenError::Cancelled),
                Either::Right((Ok(result), _)) => result,
                Either::Right((Err(_), _)) => {
                    Err(RavenError::Transport("attempt thread exited".to_string()))
                }
            }
        })
    }
}

fn run_attempt(agent: &Agent, request: &HttpRequest) -> Result<HttpResponse, RavenError> {
    let url = request.url.as_str();
    let body = request.body.as_slice();
    let headers = request.headers.as_slice();

    let response = match &request.method {
        HttpMethod::Get => forced(agent.get(url), headers).send(body),
        HttpMethod::Head => forced(agent.head(url), headers).send(body),
        HttpMethod::Delete => forced(agent.delete(url), headers).send(body),
        HttpMethod::Options => forced(agent.options(url), headers).send(body),
        HttpMethod::Trace => forced(agent.trace(url), headers).send(body),
        HttpMethod::Connect => forced(agent.connect(url), headers).send(body),
        HttpMethod::Post => with_headers(agent.post(url), headers).send(body),
        HttpMethod::Put => with_headers(agent.put(url), headers).send(body),
        HttpMethod::Patch => with_headers(agent.patch(url), headers).send(body),
        HttpMethod::Extension(token) => {
            let mut builder = ureq::http::Request::builder()
                .method(token.as_str())
                .uri(url);
            for (key, value) in headers {
                builder = builder.header(key.as_str(), value.as_str());
            }
            let request = builder
                .body(body)
                .map_err(|e| RavenError::InvalidRequest(e.to_string()))?;
            agent.run(request)
        }
    }?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = Box::new(response.into_body().into_reader());

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

impl Transport for UreqTransport {
    fn execute(
        &self,
        ctx: &Context,
        settings: &TransportSettings,
        request: &HttpRequest,
    ) -> Result<HttpResponse, RavenError> {
        let deadline = match (ctx.deadline(), settings.timeout) {
            (Some(deadline), Some(timeout)) => Some(deadline.min(Instant::now() + timeout)),
            (Some(deadline), None) => Some(deadline),
            (None, Some(timeout)) => Some(Instant::now() + timeout),
            (None, None) => None,
        };

        let mut attempt = 0;
        loop {
            ctx.check()?;
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if remaining == Some(Duration::ZERO) {
                return Err(RavenError::Timeout);
            }

            tracing::debug!(attempt, url = %request.url, "sending attempt");
            let result = self.attempt(ctx, self.agent(remaining), request);
            if ctx.is_cancelled() {
                return Err(RavenError::Cancelled);
            }

            let failed = match &result {
                Ok(response) => response.status >= 500,
                Err(err) => err.is_transport(),
            };
            if !failed || attempt >= settings.retry_count {
                return result;
            }

            attempt += 1;
            match &result {
                Ok(response) => tracing::warn!(attempt, status = response.status, "retrying request"),
                Err(err) => tracing::warn!(attempt, error = %err, "retrying request"),
            }
        }
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (key, value) in headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder
}

/// Methods without a conventional body still carry the encoded payload.
fn forced(builder: RequestBuilder<WithoutBody>, headers: &[(String, String)]) -> RequestBuilder<WithBody> {
    with_headers(builder, headers).force_send_body()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: Vec::new(),
            body: b"null".to_vec(),
        }
    }

    #[test]
    fn cancelled_context_stops_before_connecting() {
        let ctx = Context::background();
        ctx.cancel();
        // Port 9 (discard) is never contacted: the check runs first.
        let err = UreqTransport::new()
            .execute(&ctx, &TransportSettings::default(), &request("http://127.0.0.1:9/"))
            .unwrap_err();
        assert!(matches!(err, RavenError::Cancelled));
    }

    #[test]
    fn expired_deadline_is_a_timeout() {
        let ctx = Context::background().with_deadline(Instant::now());
        let err = UreqTransport::new()
            .execute(&ctx, &TransportSettings::default(), &request("http://127.0.0.1:9/"))
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn cancel_interrupts_an_attempt_in_flight() {
        // Accepts the connection and never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(5));
        });

        let ctx = Context::background();
        let canceller = ctx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });

        let started = Instant::now();
        let err = UreqTransport::new()
            .execute(&ctx, &TransportSettings::default(), &request(&format!("http://{addr}/")))
            .unwrap_err();

        assert!(matches!(err, RavenError::Cancelled), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn refused_connection_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let settings = TransportSettings {
            timeout: Some(Duration::from_secs(5)),
            retry_count: 2,
        };
        let err = UreqTransport::new()
            .execute(&Context::background(), &settings, &request(&format!("http://{addr}/")))
            .unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err}");
    }
}
