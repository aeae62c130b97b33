//! HTTP request gateway
//!
//! A thin transport abstraction: one request in, one parsed response out.
//! No retries and no caching happen here, so the pipeline can be driven by a
//! substitutable fake in tests.

mod client;
mod timeout;

pub use client::{GatewayOptions, HttpGateway};
pub use timeout::TimeoutGateway;

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use url::Url;

/// Form content type
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
/// Raw binary content type
pub const OCTET_STREAM: &str = "application/octet-stream";

/// HTTP method used by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Request body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Body {
    #[default]
    Empty,
    /// Sent as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// Sent as `application/octet-stream`
    Octets(Bytes),
}

impl Body {
    /// Content type implied by the body
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Body::Empty => None,
            Body::Form(_) => Some(FORM_URLENCODED),
            Body::Octets(_) => Some(OCTET_STREAM),
        }
    }

    /// Look up a form field
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match self {
            Body::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn post(url: Url, body: Body) -> Self {
        let mut request = Self {
            method: Method::Post,
            url,
            headers: Vec::new(),
            body,
        };
        if let Some(content_type) = request.body.content_type() {
            request = request.with_header("Content-Type", content_type);
        }
        request
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Look up a header, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Look up a query parameter
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// Decoded response body
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// Body of a response labelled as JSON
    Json(serde_json::Value),
    /// Any other body
    Raw(Bytes),
}

impl ParsedResponse {
    /// Interpret the response as a JSON document.
    ///
    /// Raw bodies are parsed too, since some backends mislabel JSON.
    pub fn into_json(self) -> Result<serde_json::Value> {
        match self {
            ParsedResponse::Json(value) => Ok(value),
            ParsedResponse::Raw(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }
}

/// Check if a content type denotes JSON
pub fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

/// Trait for request transports
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send a request and decode its body
    async fn send(&self, request: HttpRequest) -> Result<ParsedResponse>;
}

#[async_trait]
impl<G: Gateway + ?Sized> Gateway for std::sync::Arc<G> {
    async fn send(&self, request: HttpRequest) -> Result<ParsedResponse> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<G: Gateway + ?Sized> Gateway for Box<G> {
    async fn send(&self, request: HttpRequest) -> Result<ParsedResponse> {
        (**self).send(request).await
    }
}

pub trait GatewayExt: Gateway + Sized {
    /// Add timeout layer
    fn with_timeout(self, timeout: Duration) -> TimeoutGateway<Self> {
        TimeoutGateway::new(self, timeout)
    }
}

impl<T: Gateway> GatewayExt for T {}

/// Map a status and body to a parsed response or protocol error
pub(crate) fn classify(status: u16, content_type: Option<&str>, body: Bytes, url: &Url) -> Result<ParsedResponse> {
    if !(200..300).contains(&status) {
        return Err(Error::Protocol {
            status: Some(status),
            message: format!("unexpected status for {}", url.path()),
        });
    }

    match content_type {
        Some(ct) if is_json_content_type(ct) => Ok(ParsedResponse::Json(serde_json::from_slice(&body)?)),
        _ => Ok(ParsedResponse::Raw(body)),
    }
}
