//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use playpass_core::gateway::{Gateway, HttpRequest, ParsedResponse};
use playpass_core::pipeline::PipelineContext;
use playpass_core::{
    ContentReference, DeviceIdentity, DeviceType, DrmScheme, EndpointConfig, Error, Result, UserCredentials,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use url::Url;

/// Gateway that replays scripted responses and records every request
#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

pub enum Scripted {
    Reply(Result<ParsedResponse>),
    /// Never answers
    Hang,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, body: Value) -> Self {
        self.push(Scripted::Reply(Ok(ParsedResponse::Json(body))))
    }

    pub fn fail(self, err: Error) -> Self {
        self.push(Scripted::Reply(Err(err)))
    }

    pub fn hang(self) -> Self {
        self.push(Scripted::Hang)
    }

    fn push(self, scripted: Scripted) -> Self {
        self.responses.lock().unwrap().push_back(scripted);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.url.path().to_string()).collect()
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn send(&self, request: HttpRequest) -> Result<ParsedResponse> {
        self.requests.lock().unwrap().push(request);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(reply)) => reply,
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(Error::Transport("no scripted response left".into())),
        }
    }
}

/// Responses of a fully successful run
pub fn happy_path() -> ScriptedGateway {
    ScriptedGateway::new()
        .reply(json!({"encdata": "TTvIl4+yhy/vw5Uv", "hash": "4d2a9b"}))
        .reply(json!({"success": "device-token-1"}))
        .reply(json!({"success": "session-token-1"}))
        .reply(json!({"success": {"streamfilename": "https://cdn.example.com/stream.mpd"}}))
        .reply(json!({"success": "drm-token-1"}))
}

pub fn context() -> PipelineContext {
    PipelineContext {
        device: DeviceIdentity::new("device-42", "noorplay", DeviceType::Pc),
        credentials: UserCredentials::new("viewer@example.com", "secret"),
        content: ContentReference::new("y8S9aDrzXAPp", "AZKkDKfMG149e32f", "4ASX2I2K"),
        endpoints: EndpointConfig::single(Url::parse("https://api.example.com/v1/").unwrap()),
        drm_scheme: DrmScheme::Widevine,
    }
}
