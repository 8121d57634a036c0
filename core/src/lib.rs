//! Minimal JSON-over-HTTP request wrapper.
//!
//! # Overview
//! A caller describes one request with `Options` (host, path, method, body,
//! query parameters, headers, timeout, retry count) and hands it to
//! `RavenTree::send_raven`. The sender builds the URL, encodes the body as
//! JSON, adds `Content-Type: application/json`, and dispatches the request
//! through a `Transport`. The result is a `RavenResponse` whose body can be
//! read as text or decoded as JSON any number of times.
//!
//! # Design
//! - Everything that can fail without I/O happens in `build_request`, before
//!   the transport is touched.
//! - Timeouts and retries are delegated: `RavenTree` only derives
//!   `TransportSettings`; `UreqTransport` enforces them.
//! - `Context` carries cancellation and a deadline, checked before every
//!   attempt.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use raven_tree::{Context, Options, RavenTree};
//!
//! let options: Options = Options {
//!     host: "http://localhost:8080".to_string(),
//!     path: "/api/query-params".to_string(),
//!     method: "GET".to_string(),
//!     timeout: Duration::from_secs(1),
//!     retry_count: 3,
//!     ..Default::default()
//! };
//!
//! let mut resp = RavenTree::new().send_raven(&Context::background(), &options)?;
//! println!("{}", resp.parse_body_to_string());
//! # Ok::<(), raven_tree::RavenError>(())
//! ```

pub mod client;
pub mod context;
pub mod error;
pub mod http;
pub mod options;
pub mod response;
pub mod transport;

pub use client::{RavenTree, Tree, HEADER_CONTENT_TYPE, MIME_APPLICATION_JSON};
pub use context::Context;
pub use error::RavenError;
pub use http::{BodyStream, HttpMethod, HttpRequest, HttpResponse};
pub use options::{build_url, encode_body, Options};
pub use response::RavenResponse;
pub use transport::{Transport, TransportSettings, UreqTransport};
