use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{classify, Body, Gateway, HttpRequest, Method, ParsedResponse};
use crate::error::{Error, Result};

/// Options for the reqwest-backed gateway
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Per-request timeout enforced by the HTTP client
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            user_agent: format!("playpass/{}", crate::VERSION),
        }
    }
}

/// Gateway backed by `reqwest`
#[derive(Clone, Debug)]
pub struct HttpGateway {
    inner: Client,
    request_timeout: Duration,
}

impl HttpGateway {
    /// Build a gateway. Options the client rejects, such as a user agent
    /// that is not a valid header value, are a configuration error.
    pub fn new(options: GatewayOptions) -> Result<Self> {
        let inner = Client::builder()
            .timeout(options.request_timeout)
            .user_agent(options.user_agent.as_str())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("HTTP client: {}", e.without_url())))?;
        Ok(Self {
            inner,
            request_timeout: options.request_timeout,
        })
    }

    fn build(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let mut req = match request.method {
            Method::Get => self.inner.get(request.url),
            Method::Post => self.inner.post(request.url),
        };
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        match request.body {
            Body::Empty => req,
            Body::Form(fields) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                req.body(encoded)
            }
            Body::Octets(bytes) => req.body(bytes),
        }
    }

    fn map_err(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout { after: self.request_timeout }
        } else {
            Error::from(error)
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    #[instrument(skip_all, fields(method = %request.method, path = %request.url.path()))]
    async fn send(&self, request: HttpRequest) -> Result<ParsedResponse> {
        let url = request.url.clone();
        let resp = self.build(request).send().await.map_err(|e| self.map_err(e))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.bytes().await.map_err(|e| self.map_err(e))?;

        debug!(status, bytes = body.len(), "Response received");

        classify(status, content_type.as_deref(), body, &url)
    }
}
