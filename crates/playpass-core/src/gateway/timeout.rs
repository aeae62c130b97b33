use async_trait::async_trait;
use std::time::Duration;

use super::{Gateway, HttpRequest, ParsedResponse};
use crate::error::{Error, Result};

/// Timeout decorator for Gateway implementations
pub struct TimeoutGateway<G> {
    inner: G,
    timeout: Duration,
}

impl<G: Gateway> TimeoutGateway<G> {
    pub fn new(inner: G, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<G: Gateway> Gateway for TimeoutGateway<G> {
    async fn send(&self, request: HttpRequest) -> Result<ParsedResponse> {
        tokio::time::timeout(self.timeout, self.inner.send(request))
            .await
            .map_err(|_| Error::Timeout { after: self.timeout })?
    }
}
