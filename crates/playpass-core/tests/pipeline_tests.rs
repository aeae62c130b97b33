//! Pipeline integration tests against a scripted gateway

mod common;

use common::{context, happy_path, ScriptedGateway};
use playpass_core::gateway::Body;
use playpass_core::pipeline::{PipelineObserver, SESSION_HEADER};
use playpass_core::{DrmScheme, Error, Pipeline, Stage};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Observer recording every hook invocation
#[derive(Default)]
struct RecordingObserver {
    started: Mutex<Vec<Stage>>,
    completed: Mutex<Vec<Stage>>,
    failed: Mutex<Vec<Stage>>,
    alerts: Mutex<Vec<String>>,
}

impl PipelineObserver for RecordingObserver {
    fn stage_started(&self, stage: Stage) {
        self.started.lock().unwrap().push(stage);
    }

    fn stage_completed(&self, stage: Stage) {
        self.completed.lock().unwrap().push(stage);
    }

    fn stage_failed(&self, stage: Stage, _error: &Error) {
        self.failed.lock().unwrap().push(stage);
    }

    fn authentication_failed(&self, error: &Error) {
        self.alerts.lock().unwrap().push(error.to_string());
    }
}

const PATHS: [&str; 5] = [
    "/v1/device/encrypt/noorplay",
    "/v1/device/register/noorplay",
    "/v1/login",
    "/v1/content/package/y8S9aDrzXAPp",
    "/v1/content/drmtoken",
];

#[tokio::test]
async fn test_happy_path_threads_tokens() {
    let gateway = Arc::new(happy_path());
    let result = Pipeline::new(gateway.clone(), context()).run().await.unwrap();

    assert_eq!(result.drm_token.expose(), "drm-token-1");
    assert_eq!(result.session_token.expose(), "session-token-1");
    assert_eq!(
        result.manifest_url,
        Some(Url::parse("https://cdn.example.com/stream.mpd").unwrap())
    );

    assert_eq!(gateway.paths(), PATHS);

    let requests = gateway.requests();
    assert_eq!(requests[1].query_param("hash").as_deref(), Some("4d2a9b"));
    assert_eq!(requests[1].body, Body::Octets(bytes::Bytes::from_static(b"TTvIl4+yhy/vw5Uv")));
    assert_eq!(requests[2].header("Authorization"), Some("Bearer device-token-1"));
    assert_eq!(requests[3].header(SESSION_HEADER), Some("session-token-1"));
    assert_eq!(requests[4].header(SESSION_HEADER), Some("session-token-1"));
    assert_eq!(requests[4].body.form_value("drmscheme"), Some("WIDEVINE"));
}

#[tokio::test]
async fn test_drm_scheme_override() {
    let gateway = Arc::new(happy_path());
    Pipeline::new(gateway.clone(), context())
        .with_drm_scheme(DrmScheme::PlayReady)
        .run()
        .await
        .unwrap();

    let requests = gateway.requests();
    assert_eq!(requests[4].body.form_value("drmscheme"), Some("PLAYREADY"));
}

#[tokio::test]
async fn test_observer_sees_every_stage() {
    let observer = Arc::new(RecordingObserver::default());
    Pipeline::new(happy_path(), context())
        .with_observer(observer.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(*observer.started.lock().unwrap(), Stage::ALL);
    assert_eq!(*observer.completed.lock().unwrap(), Stage::ALL);
    assert!(observer.failed.lock().unwrap().is_empty());
    assert!(observer.alerts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_each_stage_failure_stops_the_run() {
    let bodies = [
        json!({"encdata": "blob", "hash": "h"}),
        json!({"success": "device-token-1"}),
        json!({"success": "session-token-1"}),
        json!({"success": "ok"}),
        json!({"success": "drm-token-1"}),
    ];

    for (failing, stage) in Stage::ALL.iter().enumerate() {
        let mut gateway = ScriptedGateway::new();
        for body in bodies.iter().take(failing) {
            gateway = gateway.reply(body.clone());
        }
        let gateway = Arc::new(gateway.reply(json!({"reason": "rejected"})));

        let err = Pipeline::new(gateway.clone(), context()).run().await.unwrap_err();

        assert_eq!(err.stage(), Some(*stage), "stage {stage}");
        assert!(err.to_string().contains("rejected"), "{err}");
        assert_eq!(gateway.requests().len(), failing + 1, "no request after {stage}");
    }
}

#[tokio::test]
async fn test_falsy_success_is_rejected() {
    let bodies = [
        json!({"encdata": "blob", "hash": "h"}),
        json!({"success": "device-token-1"}),
        json!({"success": "session-token-1"}),
        json!({"success": "ok"}),
    ];

    for stage in &Stage::ALL[1..] {
        for success in [json!(false), json!(""), json!(0)] {
            let mut gateway = ScriptedGateway::new();
            for body in bodies.iter().take(stage.number() - 1) {
                gateway = gateway.reply(body.clone());
            }
            let gateway = Arc::new(gateway.reply(json!({ "success": success.clone() })));

            let err = Pipeline::new(gateway.clone(), context()).run().await.unwrap_err();

            assert_eq!(err.stage(), Some(*stage), "{stage} with {success}");
            assert!(matches!(err.root_cause(), Error::Protocol { status: None, .. }), "{err}");
            assert_eq!(gateway.requests().len(), stage.number(), "no request after {stage} with {success}");
        }
    }
}

#[tokio::test]
async fn test_error_kinds_per_stage() {
    let err = Pipeline::new(ScriptedGateway::new().reply(json!({"hash": "h"})), context())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EncryptionRequestFailed { .. }));
    assert_eq!(err.error_code(), "ENCRYPTION_REQUEST_FAILED");

    let gateway = ScriptedGateway::new()
        .reply(json!({"encdata": "blob", "hash": "h"}))
        .reply(json!({"success": "device-token-1"}))
        .reply(json!({"success": "session-token-1"}))
        .reply(json!({"error": "content not found"}));
    let err = Pipeline::new(gateway, context()).run().await.unwrap_err();
    assert!(matches!(err, Error::PackageResolutionFailed { .. }));
}

#[tokio::test]
async fn test_invalid_credentials_alert_once() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .reply(json!({"encdata": "blob", "hash": "h"}))
            .reply(json!({"success": "device-token-1"}))
            .reply(json!({"reason": "Invalid credentials"})),
    );
    let observer = Arc::new(RecordingObserver::default());

    let err = Pipeline::new(gateway.clone(), context())
        .with_observer(observer.clone())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AuthenticationFailed { .. }));
    assert_eq!(gateway.paths(), &PATHS[..3]);

    let alerts = observer.alerts.lock().unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("Invalid credentials"));
    assert_eq!(*observer.failed.lock().unwrap(), vec![Stage::Login]);
}

#[tokio::test]
async fn test_transport_error_is_wrapped() {
    let gateway = ScriptedGateway::new()
        .reply(json!({"encdata": "blob", "hash": "h"}))
        .fail(Error::Transport("connection reset".into()));

    let err = Pipeline::new(gateway, context()).run().await.unwrap_err();

    assert!(matches!(err, Error::RegistrationFailed { .. }));
    assert!(err.is_transport());
    assert!(matches!(err.root_cause(), Error::Transport(_)));
}

#[tokio::test]
async fn test_login_status_error_alerts_once() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .reply(json!({"encdata": "blob", "hash": "h"}))
            .reply(json!({"success": "device-token-1"}))
            .fail(Error::Protocol {
                status: Some(401),
                message: "unexpected status for /v1/login".into(),
            })
            .reply(json!({"success": "ok"})),
    );

    let observer = Arc::new(RecordingObserver::default());
    let err = Pipeline::new(gateway.clone(), context())
        .with_observer(observer.clone())
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(401));
    assert_eq!(observer.alerts.lock().unwrap().len(), 1);
    assert_eq!(gateway.paths(), &PATHS[..3]);
}

#[tokio::test(start_paused = true)]
async fn test_stage_timeout() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .reply(json!({"encdata": "blob", "hash": "h"}))
            .hang(),
    );

    let err = Pipeline::new(gateway.clone(), context())
        .with_stage_timeout(Duration::from_millis(500))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Register));
    assert!(matches!(err.root_cause(), Error::Timeout { after } if *after == Duration::from_millis(500)));
    assert_eq!(gateway.requests().len(), 2);
}

#[tokio::test]
async fn test_cancel_before_start() {
    let gateway = Arc::new(happy_path());
    let token = CancellationToken::new();
    token.cancel();

    let err = Pipeline::new(gateway.clone(), context())
        .with_cancellation(token)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled { stage: Stage::Encrypt }));
    assert!(gateway.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_in_flight() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .reply(json!({"encdata": "blob", "hash": "h"}))
            .reply(json!({"success": "device-token-1"}))
            .hang(),
    );
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = Pipeline::new(gateway.clone(), context()).with_observer(observer.clone());
    let token = pipeline.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, Error::Cancelled { stage: Stage::Login }));
    assert_eq!(err.error_code(), "CANCELLED");
    assert_eq!(gateway.requests().len(), 3);
    // Cancellation is not a login failure
    assert!(observer.alerts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_raw_response_bodies() {
    use playpass_core::gateway::{Gateway, HttpRequest, ParsedResponse};

    struct RawGateway;

    #[async_trait::async_trait]
    impl Gateway for RawGateway {
        async fn send(&self, request: HttpRequest) -> playpass_core::Result<ParsedResponse> {
            let body: &'static [u8] = match request.url.path() {
                p if p.contains("encrypt") => br#"{"encdata":"blob","hash":"h"}"#,
                p if p.contains("register") => br#"{"success":"dt"}"#,
                p if p.contains("login") => br#"{"success":"st"}"#,
                p if p.contains("package") => br#"{"success":"ok"}"#,
                _ => br#"{"success":"drm"}"#,
            };
            Ok(ParsedResponse::Raw(bytes::Bytes::from_static(body)))
        }
    }

    let result = Pipeline::new(RawGateway, context()).run().await.unwrap();
    assert_eq!(result.drm_token.expose(), "drm");
    assert_eq!(result.manifest_url, None);
}
