//! Outbound request description.
//!
//! # Responsibilities
//! - Describe one logical upstream call (method, endpoint template, params)
//! - Expand `{placeholder}` path segments from path params
//! - Stay independent of the HTTP client so fakes can inspect it

use std::collections::BTreeMap;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;

use crate::upstream::error::{UpstreamError, UpstreamResult};

/// Bytes left as-is inside one path segment. `,` stays literal for id lists.
const PATH_SEGMENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b',');

/// A request to an upstream API, relative to that upstream's base URL.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Endpoint template such as `character/{id}`.
    pub endpoint: String,
    pub path_params: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub headers: BTreeMap<String, String>,
    /// Overrides the pool-wide attempt timeout.
    pub timeout: Option<Duration>,
}

impl UpstreamRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            path_params: BTreeMap::new(),
            query: Vec::new(),
            body: None,
            headers: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Append a query parameter only when a value is present.
    pub fn query_opt<V: ToString>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(name, v.to_string()),
            None => self,
        }
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Expand the endpoint template with path params.
    ///
    /// Values are percent-encoded as a single path segment. A placeholder
    /// without a value, or a value that is empty or a dot segment, is a
    /// request validation error.
    pub fn resolve_path(&self, service: &str) -> UpstreamResult<String> {
        let mut resolved = String::with_capacity(self.endpoint.len());
        let mut rest = self.endpoint.as_str();

        while let Some(start) = rest.find('{') {
            resolved.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(|| {
                UpstreamError::request_validation(
                    service,
                    format!("Unterminated path parameter in endpoint '{}'", self.endpoint),
                )
            })?;
            let name = &after[..end];
            let value = self.path_params.get(name).ok_or_else(|| {
                UpstreamError::request_validation(
                    service,
                    format!("Missing required path parameter: '{}'", name),
                )
            })?;
            if matches!(value.as_str(), "" | "." | "..") {
                return Err(UpstreamError::request_validation(
                    service,
                    format!("Invalid value for path parameter '{}': {:?}", name, value),
                ));
            }
            resolved.extend(utf8_percent_encode(value, PATH_SEGMENT_SET));
            rest = &after[end + 1..];
        }
        resolved.push_str(rest);

        Ok(resolved.trim_start_matches('/').to_string())
    }
}
