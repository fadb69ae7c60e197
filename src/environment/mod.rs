//! Per-request environment.
//!
//! # Data Flow
//! ```text
//! HTTP request / CLI dry run
//!     → RequestEnvironment (uri, parameters, headers, attributes)
//!     → processing tree reads it through input modules, selectors, actions
//!     → nodes write response status / headers back
//! ```
//!
//! # Design Decisions
//! - The core only sees the `Environment` trait; adapters own the transport
//! - Header names are case-insensitive, parameter names are not

use std::collections::BTreeMap;

/// What the processing tree may read from and write to for one request.
pub trait Environment: Send {
    /// Request URI the sitemap matches against (path only).
    fn uri(&self) -> &str;

    /// Absolute request URL, used to resolve relative redirect targets.
    fn base_url(&self) -> Option<&str> {
        None
    }

    /// Ambient attribute set by the caller or by earlier components.
    fn attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&mut self, name: &str, value: String);

    /// First value of request parameter `name`.
    fn parameter(&self, name: &str) -> Option<String>;

    fn parameter_names(&self) -> Vec<String>;

    /// Request header, matched case-insensitively.
    fn header(&self, name: &str) -> Option<String>;

    fn set_status(&mut self, status: u16);

    fn set_header(&mut self, name: &str, value: String);

    /// False for internal (sub-)requests.
    fn is_external(&self) -> bool {
        true
    }
}

/// In-memory environment used by the HTTP adapter and the CLI.
#[derive(Debug, Clone, Default)]
pub struct RequestEnvironment {
    uri: String,
    base_url: Option<String>,
    parameters: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
    attributes: BTreeMap<String, String>,
    external: bool,
    status: Option<u16>,
    response_headers: BTreeMap<String, String>,
}

impl RequestEnvironment {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            external: true,
            ..Self::default()
        }
    }

    /// Split `target` into path and query, decoding the query as parameters.
    pub fn from_target(target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let mut env = Self::new(path);
        env.extend_query(query);
        env
    }

    /// Add `application/x-www-form-urlencoded` pairs; the first value wins.
    pub fn extend_query(&mut self, query: &str) {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            self.parameters
                .entry(name.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Mark as an internal request.
    pub fn internal(mut self) -> Self {
        self.external = false;
        self
    }

    /// Status set by the tree, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn response_headers(&self) -> &BTreeMap<String, String> {
        &self.response_headers
    }
}

impl Environment for RequestEnvironment {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn set_attribute(&mut self, name: &str, value: String) {
        self.attributes.insert(name.to_string(), value);
    }

    fn parameter(&self, name: &str) -> Option<String> {
        self.parameters.get(name).cloned()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.parameters.keys().cloned().collect()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_ascii_lowercase()).cloned()
    }

    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    fn set_header(&mut self, name: &str, value: String) {
        self.response_headers.insert(name.to_string(), value);
    }

    fn is_external(&self) -> bool {
        self.external
    }
}
