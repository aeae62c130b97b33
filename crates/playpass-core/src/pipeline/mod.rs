//! Authorization pipeline - device to playback
//!
//! Drives the five stages in order:
//!
//! ```text
//! Encrypt ──► Register ──► Login ──► ResolvePackage ──► DrmToken
//!  hash,       device       session    (session)          drm token
//!  encdata     token        token
//! ```
//!
//! Each stage's request needs the previous stage's output. The first failure
//! stops the run; nothing is retried. A pipeline instance is consumed by
//! [`Pipeline::run`], so retrying means building a new one.

mod stages;

pub use stages::{
    drm_token_request, encrypt_request, login_request, package_request, parse_encrypted_payload, parse_package,
    register_request, token_field, PipelineContext, PipelineState, Stage, SESSION_HEADER,
};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::gateway::{Gateway, HttpRequest, ParsedResponse};
use crate::types::{DrmScheme, PipelineId, PipelineResult};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default upper bound for one stage
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Hooks fired while a pipeline runs.
///
/// `authentication_failed` is the user-facing notification: it fires exactly
/// once when the login stage fails. Everything else is informational.
pub trait PipelineObserver: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}

    fn stage_completed(&self, _stage: Stage) {}

    fn stage_failed(&self, _stage: Stage, _error: &Error) {}

    fn authentication_failed(&self, error: &Error) {
        warn!(error = %error, "Login failed, check the configured credentials");
    }
}

/// Observer that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {}

/// One run of the authorization pipeline
pub struct Pipeline<G> {
    id: PipelineId,
    gateway: G,
    context: PipelineContext,
    stage_timeout: Duration,
    cancel: CancellationToken,
    observer: Arc<dyn PipelineObserver>,
}

impl<G: Gateway> Pipeline<G> {
    /// Create a pipeline over a gateway
    pub fn new(gateway: G, context: PipelineContext) -> Self {
        Self {
            id: PipelineId::new(),
            gateway,
            context,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            cancel: CancellationToken::new(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Create a pipeline from application configuration
    pub fn from_config(gateway: G, config: &AppConfig) -> Self {
        let context = PipelineContext {
            device: config.device.clone(),
            credentials: config.credentials.clone(),
            content: config.content.clone(),
            endpoints: config.endpoints.clone(),
            drm_scheme: config.drm_scheme,
        };
        Self::new(gateway, context).with_stage_timeout(config.timeouts.stage_timeout())
    }

    /// Scheme requested from the DRM token endpoint
    pub fn with_drm_scheme(mut self, scheme: DrmScheme) -> Self {
        self.context.drm_scheme = scheme;
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Abandon the run when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn id(&self) -> PipelineId {
        self.id
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Token that cancels this run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run all stages in order
    #[instrument(skip(self), fields(pipeline_id = %self.id, provider = %self.context.device.provider_id))]
    pub async fn run(self) -> Result<PipelineResult> {
        info!(drm_scheme = %self.context.drm_scheme, "Starting authorization pipeline");

        let mut state = PipelineState::Start;
        loop {
            let stage = match state.pending_stage() {
                Some(stage) => stage,
                None => return self.finish(state),
            };

            self.observer.stage_started(stage);
            debug!(stage = %stage, number = stage.number(), "Stage started");

            state = match self.step(stage, state).await {
                Ok(next) => next,
                Err(err) => return Err(self.fail(stage, err)),
            };

            self.observer.stage_completed(stage);
            info!(stage = %stage, success = true, "Stage completed");
        }
    }

    async fn step(&self, stage: Stage, state: PipelineState) -> Result<PipelineState> {
        let request = state.request(&self.context)?;
        let response = self.send(stage, request).await?;
        state.advance(response)
    }

    async fn send(&self, stage: Stage, request: HttpRequest) -> Result<ParsedResponse> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled { stage });
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled { stage }),
            result = tokio::time::timeout(self.stage_timeout, self.gateway.send(request)) => {
                result.map_err(|_| Error::Timeout { after: self.stage_timeout })?
            }
        }
    }

    fn fail(&self, stage: Stage, err: Error) -> Error {
        if let Error::Cancelled { .. } = err {
            warn!(stage = %stage, "Pipeline cancelled");
            self.observer.stage_failed(stage, &err);
            return err;
        }

        let err = Error::at_stage(stage, err);
        error!(stage = %stage, code = err.error_code(), error = %err, "Stage failed, aborting pipeline");
        self.observer.stage_failed(stage, &err);
        if stage == Stage::Login {
            self.observer.authentication_failed(&err);
        }
        err
    }

    fn finish(&self, state: PipelineState) -> Result<PipelineResult> {
        match state {
            PipelineState::Complete {
                drm_token,
                session_token,
                manifest_url,
            } => {
                info!(has_manifest = manifest_url.is_some(), "Authorization pipeline complete");
                Ok(PipelineResult {
                    pipeline_id: self.id,
                    drm_token,
                    session_token,
                    manifest_url,
                    completed_at: Utc::now(),
                })
            }
            other => Err(Error::Internal(format!(
                "pipeline stopped before completion at {:?}",
                other.pending_stage()
            ))),
        }
    }
}
