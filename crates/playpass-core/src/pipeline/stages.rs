//! Stage definitions and the pipeline state machine.
//!
//! Every stage is a pair of pure functions: one builds the outbound request
//! from the current state, the other turns the response into the next state.
//! Advancing consumes the state by value, so a token never outlives the stage
//! that consumed it and cannot reach a later request after a failure.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::gateway::{Body, HttpRequest, ParsedResponse};
use crate::types::{
    ContentReference, DeviceIdentity, DeviceToken, DrmScheme, DrmToken, EncryptedRegistrationPayload,
    SessionToken, UserCredentials,
};

/// Session header used by the content endpoints
pub const SESSION_HEADER: &str = "X-SESSION";

/// One network round trip of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// S1: ask the backend to encrypt the device identity
    Encrypt,
    /// S2: register the device with the encrypted payload
    Register,
    /// S3: user login with the device token
    Login,
    /// S4: confirm the content package is available
    ResolvePackage,
    /// S5: fetch the DRM token
    DrmToken,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 5] = [
        Stage::Encrypt,
        Stage::Register,
        Stage::Login,
        Stage::ResolvePackage,
        Stage::DrmToken,
    ];

    /// 1-based position in the pipeline
    pub fn number(&self) -> usize {
        *self as usize + 1
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Encrypt => write!(f, "encrypt"),
            Stage::Register => write!(f, "register"),
            Stage::Login => write!(f, "login"),
            Stage::ResolvePackage => write!(f, "resolve_package"),
            Stage::DrmToken => write!(f, "drm_token"),
        }
    }
}

/// Static inputs of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub device: DeviceIdentity,
    pub credentials: UserCredentials,
    pub content: ContentReference,
    pub endpoints: EndpointConfig,
    /// Scheme requested from the DRM token endpoint
    pub drm_scheme: DrmScheme,
}

/// Pipeline progress; each variant carries exactly what the next stage needs
#[derive(Debug)]
pub enum PipelineState {
    Start,
    Encrypted(EncryptedRegistrationPayload),
    Registered(DeviceToken),
    Authenticated(SessionToken),
    PackageResolved {
        session_token: SessionToken,
        manifest_url: Option<Url>,
    },
    Complete {
        drm_token: DrmToken,
        session_token: SessionToken,
        manifest_url: Option<Url>,
    },
}

impl PipelineState {
    /// The stage that runs next, `None` once complete
    pub fn pending_stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Start => Some(Stage::Encrypt),
            PipelineState::Encrypted(_) => Some(Stage::Register),
            PipelineState::Registered(_) => Some(Stage::Login),
            PipelineState::Authenticated(_) => Some(Stage::ResolvePackage),
            PipelineState::PackageResolved { .. } => Some(Stage::DrmToken),
            PipelineState::Complete { .. } => None,
        }
    }

    /// Build the request of the pending stage
    pub fn request(&self, ctx: &PipelineContext) -> Result<HttpRequest> {
        match self {
            PipelineState::Start => encrypt_request(ctx),
            PipelineState::Encrypted(payload) => register_request(ctx, payload),
            PipelineState::Registered(device_token) => login_request(ctx, device_token),
            PipelineState::Authenticated(session_token) => package_request(ctx, session_token),
            PipelineState::PackageResolved { session_token, .. } => drm_token_request(ctx, session_token),
            PipelineState::Complete { .. } => Err(Error::Internal("pipeline already complete".into())),
        }
    }

    /// Consume the pending stage's response and move to the next state
    pub fn advance(self, response: ParsedResponse) -> Result<PipelineState> {
        let body = response.into_json()?;
        match self {
            PipelineState::Start => Ok(PipelineState::Encrypted(parse_encrypted_payload(&body)?)),
            PipelineState::Encrypted(_payload) => Ok(PipelineState::Registered(DeviceToken::new(token_field(&body)?))),
            PipelineState::Registered(_device_token) => {
                Ok(PipelineState::Authenticated(SessionToken::new(token_field(&body)?)))
            }
            PipelineState::Authenticated(session_token) => Ok(PipelineState::PackageResolved {
                manifest_url: parse_package(&body)?,
                session_token,
            }),
            PipelineState::PackageResolved {
                session_token,
                manifest_url,
            } => Ok(PipelineState::Complete {
                drm_token: DrmToken::new(token_field(&body)?),
                session_token,
                manifest_url,
            }),
            PipelineState::Complete { .. } => Err(Error::Internal("pipeline already complete".into())),
        }
    }
}

/// S1: `POST {device_base}/device/encrypt/{providerId}`
pub fn encrypt_request(ctx: &PipelineContext) -> Result<HttpRequest> {
    let device = &ctx.device;
    let url = endpoint(&ctx.endpoints.device_base, &["device", "encrypt", device.provider_id.as_str()])?;
    Ok(HttpRequest::post(
        url,
        form(&[
            ("deviceid", device.device_id.as_str()),
            ("providerid", device.provider_id.as_str()),
            ("devicetype", device.device_type.as_str()),
        ]),
    ))
}

/// S2: `POST {subscriber_base}/device/register/{providerId}?hash={hash}`
pub fn register_request(ctx: &PipelineContext, payload: &EncryptedRegistrationPayload) -> Result<HttpRequest> {
    let mut url = endpoint(
        &ctx.endpoints.subscriber_base,
        &["device", "register", ctx.device.provider_id.as_str()],
    )?;
    url.query_pairs_mut().append_pair("hash", &payload.hash);
    Ok(HttpRequest::post(url, Body::Octets(payload.encrypted_data.clone())))
}

/// S3: `GET {subscriber_base}/login?email&password&devicetype&country`
pub fn login_request(ctx: &PipelineContext, device_token: &DeviceToken) -> Result<HttpRequest> {
    let credentials = &ctx.credentials;
    let mut url = endpoint(&ctx.endpoints.subscriber_base, &["login"])?;
    url.query_pairs_mut()
        .append_pair("email", &credentials.email)
        .append_pair("password", &credentials.password)
        .append_pair("devicetype", ctx.device.device_type.as_str())
        .append_pair("country", &credentials.country);
    Ok(HttpRequest::get(url).with_header("Authorization", format!("Bearer {}", device_token.expose())))
}

/// S4: `POST {content_base}/content/package/{contentId}`
pub fn package_request(ctx: &PipelineContext, session_token: &SessionToken) -> Result<HttpRequest> {
    let content = &ctx.content;
    let url = endpoint(&ctx.endpoints.content_base, &["content", "package", content.content_id.as_str()])?;
    Ok(HttpRequest::post(
        url,
        form(&[
            ("packageid", content.package_id.as_str()),
            ("availabilityid", content.availability_id.as_str()),
        ]),
    )
    .with_header(SESSION_HEADER, session_token.expose()))
}

/// S5: `POST {content_base}/content/drmtoken`
pub fn drm_token_request(ctx: &PipelineContext, session_token: &SessionToken) -> Result<HttpRequest> {
    let content = &ctx.content;
    let url = endpoint(&ctx.endpoints.content_base, &["content", "drmtoken"])?;
    Ok(HttpRequest::post(
        url,
        form(&[
            ("contentid", content.content_id.as_str()),
            ("packageid", content.package_id.as_str()),
            ("drmscheme", ctx.drm_scheme.as_str()),
            ("availabilityid", content.availability_id.as_str()),
        ]),
    )
    .with_header(SESSION_HEADER, session_token.expose()))
}

/// S1 response: `{encdata, hash}`, both required
pub fn parse_encrypted_payload(body: &Value) -> Result<EncryptedRegistrationPayload> {
    let encdata = non_empty_str(body, "encdata")?;
    let hash = non_empty_str(body, "hash")?;
    Ok(EncryptedRegistrationPayload {
        encrypted_data: Bytes::copy_from_slice(encdata.as_bytes()),
        hash: hash.to_string(),
    })
}

/// S4 response: `success` is a non-empty string or an object, optionally
/// carrying the stream URL. Booleans and numbers do not confirm the package.
pub fn parse_package(body: &Value) -> Result<Option<Url>> {
    let candidate = match success_field(body)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
        Value::Object(map) => ["streamfilename", "url"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str)),
        _ => return Err(Error::protocol("`success` does not confirm the package")),
    };
    Ok(candidate
        .and_then(|s| Url::parse(s).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https")))
}

/// Token stages: `success` must be a non-empty string
pub fn token_field(body: &Value) -> Result<String> {
    match success_field(body)? {
        Value::String(token) if !token.trim().is_empty() => Ok(token.clone()),
        _ => Err(Error::protocol("`success` does not carry a token")),
    }
}

fn success_field(body: &Value) -> Result<&Value> {
    match body.get("success") {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(missing_field(body, "success")),
    }
}

fn non_empty_str<'a>(body: &'a Value, field: &str) -> Result<&'a str> {
    match body.get(field).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(missing_field(body, field)),
    }
}

fn missing_field(body: &Value, field: &str) -> Error {
    match body.get("reason").and_then(Value::as_str) {
        Some(reason) => Error::protocol(format!("response missing `{field}`: {reason}")),
        None => Error::protocol(format!("response missing `{field}`")),
    }
}

fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::InvalidConfig(format!("{base} cannot be used as an endpoint base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn form(fields: &[(&str, &str)]) -> Body {
    Body::Form(
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}
