//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Translate the HTTP request into a routing `Environment`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Form bodies contribute parameters after the query string (query wins)

use axum::http::{header, request::Parts, HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::environment::RequestEnvironment;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Attribute holding the request method.
pub const METHOD_ATTRIBUTE: &str = "request-method";

/// Attribute holding the request id.
pub const REQUEST_ID_ATTRIBUTE: &str = "request-id";

/// Generates a UUID v4 for every request without an id.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(id))
    }
}

/// Request id set by the request-id layer, or "unknown".
pub fn request_id(parts: &Parts) -> String {
    parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

fn is_form(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Build the routing environment for one HTTP request.
pub fn environment(parts: &Parts, body: &[u8]) -> RequestEnvironment {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let mut env = RequestEnvironment::from_target(target);

    if is_form(parts) {
        if let Ok(form) = std::str::from_utf8(body) {
            env.extend_query(form);
        }
    }

    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            env = env.with_header(name.as_str(), value);
        }
    }

    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.authority().map(|a| a.as_str()));
    if let Some(host) = host {
        let scheme = parts.uri.scheme_str().unwrap_or("http");
        env = env.with_base_url(format!("{}://{}{}", scheme, host, target));
    }

    env.with_attribute(METHOD_ATTRIBUTE, parts.method.as_str())
        .with_attribute(REQUEST_ID_ATTRIBUTE, &request_id(parts))
}
