//! Request sender: turns `Options` into a dispatched request.
//!
//! # Design
//! `RavenTree` holds only its transport. `build_request` does every step that
//! can fail without I/O (URL, body, method, headers), so a bad `Options`
//! value never reaches the network. `send_raven` then hands the built request
//! to the transport and wraps whatever comes back.

use serde::Serialize;
use uuid::Uuid;

use crate::context::Context;
use crate::error::RavenError;
use crate::http::{HttpMethod, HttpRequest};
use crate::options::Options;
use crate::response::RavenResponse;
use crate::transport::{Transport, UreqTransport};

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// JavaScript Object Notation, RFC 8259.
pub const MIME_APPLICATION_JSON: &str = "application/json";

/// Anything that can send a raven. Code that only needs to send requests can
/// depend on this instead of `RavenTree`, and tests can stand in for it.
pub trait Tree {
    /// Build and send the request described by `options`.
    fn send_raven<B: Serialize>(
        &self,
        ctx: &Context,
        options: &Options<B>,
    ) -> Result<RavenResponse, RavenError>;
}

/// Sends one request per `send_raven` call through a `Transport`.
#[derive(Debug, Clone, Default)]
pub struct RavenTree<T = UreqTransport> {
    transport: T,
}

impl RavenTree {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Transport> RavenTree<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the outbound request without sending it.
    ///
    /// Headers start with `Content-Type: application/json`; caller headers
    /// follow in name order and never replace it.
    pub fn build_request<B: Serialize>(&self, options: &Options<B>) -> Result<HttpRequest, RavenError> {
        let url = options.build_url()?;
        let body = options.encode_body()?;
        let method: HttpMethod = options.method.parse()?;

        let mut caller_headers: Vec<_> = options.headers.iter().collect();
        caller_headers.sort();

        let mut headers = Vec::with_capacity(caller_headers.len() + 1);
        headers.push((HEADER_CONTENT_TYPE.to_string(), MIME_APPLICATION_JSON.to_string()));
        headers.extend(
            caller_headers
                .into_iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Build and send the request described by `options`.
    ///
    /// `ctx` is checked before every attempt and its deadline bounds the
    /// exchange together with `options.timeout`.
    pub fn send_raven<B: Serialize>(
        &self,
        ctx: &Context,
        options: &Options<B>,
    ) -> Result<RavenResponse, RavenError> {
        let span = tracing::info_span!("raven", request_id = %Uuid::new_v4());
        let _guard = span.enter();

        let settings = options.transport_settings();
        let request = self.build_request(options)?;

        tracing::info!(
            url = %request.url,
            method = %request.method,
            body = %String::from_utf8_lossy(&request.body),
            "raven send"
        );

        let response = self.transport.execute(ctx, &settings, &request)?;
        tracing::debug!(status = response.status, "raven received");
        Ok(RavenResponse::new(response))
    }
}

impl<T: Transport> Tree for RavenTree<T> {
    fn send_raven<B: Serialize>(
        &self,
        ctx: &Context,
        options: &Options<B>,
    ) -> Result<RavenResponse, RavenError> {
        RavenTree::send_raven(self, ctx, options)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::time::Duration;

    use super::*;
    use crate::http::HttpResponse;
    use crate::transport::TransportSettings;

    /// Records what it was asked to send and answers with a fixed body.
    #[derive(Default)]
    struct RecordingTransport {
        sent: RefCell<Vec<(TransportSettings, HttpRequest)>>,
    }

    impl Transport for RecordingTransport {
        fn execute(
            &self,
            ctx: &Context,
            settings: &TransportSettings,
            request: &HttpRequest,
        ) -> Result<HttpResponse, RavenError> {
            ctx.check()?;
            self.sent.borrow_mut().push((*settings, request.clone()));
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: Box::new(Cursor::new(br#"{"ok":true}"#.to_vec())),
            })
        }
    }

    fn tree() -> RavenTree<RecordingTransport> {
        RavenTree::with_transport(RecordingTransport::default())
    }

    fn options() -> Options {
        Options {
            host: "http://localhost:8080".to_string(),
            path: "/api/echo".to_string(),
            method: "POST".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn sends_built_request_through_transport() {
        let tree = tree();
        let mut opts = options();
        opts.body = Some(serde_json::json!({"name": "raven"}));
        opts.timeout = Duration::from_secs(2);
        opts.retry_count = 3;

        let mut resp = tree.send_raven(&Context::background(), &opts).unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.parse_body_to_string(), r#"{"ok":true}"#);

        let sent = tree.transport().sent.borrow();
        assert_eq!(sent.len(), 1);
        let (settings, request) = &sent[0];
        assert_eq!(settings.timeout, Some(Duration::from_secs(2)));
        assert_eq!(settings.retry_count, 3);
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://localhost:8080/api/echo");
        assert_eq!(request.body, br#"{"name":"raven"}"#);
    }

    #[test]
    fn content_type_comes_first_and_caller_headers_append() {
        let mut opts = options();
        opts.headers = HashMap::from([
            ("Content-Type".to_string(), "text/plain".to_string()),
            ("Authorization".to_string(), "Bearer token".to_string()),
        ]);

        let request = tree().build_request(&opts).unwrap();
        assert_eq!(
            request.headers,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), "Bearer token".to_string()),
                ("Content-Type".to_string(), "text/plain".to_string()),
            ]
        );
    }

    #[test]
    fn absent_body_is_sent_as_null() {
        let request = tree().build_request(&options()).unwrap();
        assert_eq!(request.body, b"null");
    }

    #[test]
    fn invalid_host_never_reaches_transport() {
        let tree = tree();
        let mut opts = options();
        opts.host = ":foo".to_string();

        let err = tree.send_raven(&Context::background(), &opts).unwrap_err();
        assert!(matches!(err, RavenError::InvalidUrl { .. }));
        assert!(tree.transport().sent.borrow().is_empty());
    }

    #[test]
    fn unencodable_body_never_reaches_transport() {
        let tree = tree();
        let opts = Options {
            host: "http://localhost:8080".to_string(),
            path: "/api/retry".to_string(),
            body: Some(HashMap::from([((1u8, 2u8), "tuple keys")])),
            ..Default::default()
        };

        let err = tree.send_raven(&Context::background(), &opts).unwrap_err();
        assert!(matches!(err, RavenError::BodyEncoding(_)));
        assert!(tree.transport().sent.borrow().is_empty());
    }

    #[test]
    fn invalid_method_never_reaches_transport() {
        let tree = tree();
        let mut opts = options();
        opts.method = "😰".to_string();

        let err = tree.send_raven(&Context::background(), &opts).unwrap_err();
        assert!(matches!(err, RavenError::InvalidRequest(_)));
        assert!(tree.transport().sent.borrow().is_empty());
    }

    #[test]
    fn url_error_wins_over_body_error() {
        let opts = Options {
            host: ":foo".to_string(),
            body: Some(HashMap::from([((1u8, 2u8), 3u8)])),
            ..Default::default()
        };
        let err = tree().build_request(&opts).unwrap_err();
        assert!(matches!(err, RavenError::InvalidUrl { .. }));
    }

    /// Status of whatever `tree` answers for `/api/echo`.
    fn echo_status(tree: &impl Tree) -> Result<u16, RavenError> {
        let resp = tree.send_raven(&Context::background(), &options())?;
        Ok(resp.status())
    }

    struct CannedTree(u16);

    impl Tree for CannedTree {
        fn send_raven<B: Serialize>(
            &self,
            _ctx: &Context,
            _options: &Options<B>,
        ) -> Result<RavenResponse, RavenError> {
            Ok(RavenResponse::from_bytes(self.0, Vec::new(), "{}"))
        }
    }

    #[test]
    fn tree_callers_accept_any_implementation() {
        assert_eq!(echo_status(&CannedTree(418)).unwrap(), 418);

        let tree = tree();
        assert_eq!(echo_status(&tree).unwrap(), 200);
        assert_eq!(tree.transport().sent.borrow().len(), 1);
    }

    #[test]
    fn cancelled_context_propagates_transport_error() {
        let ctx = Context::background();
        ctx.cancel();
        let err = tree().send_raven(&ctx, &options()).unwrap_err();
        assert!(matches!(err, RavenError::Cancelled));
    }
}
