//! Core types for PlayPass

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Unique identifier for one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineId(pub Uuid);

impl PipelineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PipelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device class reported to the licensing backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    #[default]
    Pc,
    Android,
    Ios,
    Web,
    Stb,
}

impl DeviceType {
    /// Wire name used in form bodies and query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Pc => "PC",
            DeviceType::Android => "ANDROID",
            DeviceType::Ios => "IOS",
            DeviceType::Web => "WEB",
            DeviceType::Stb => "STB",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DRM scheme requested from the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DrmScheme {
    #[default]
    Widevine,
    PlayReady,
    FairPlay,
}

impl DrmScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrmScheme::Widevine => "WIDEVINE",
            DrmScheme::PlayReady => "PLAYREADY",
            DrmScheme::FairPlay => "FAIRPLAY",
        }
    }
}

impl std::fmt::Display for DrmScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DrmScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WIDEVINE" => Ok(DrmScheme::Widevine),
            "PLAYREADY" => Ok(DrmScheme::PlayReady),
            "FAIRPLAY" => Ok(DrmScheme::FairPlay),
            other => Err(format!("unknown DRM scheme: {other}")),
        }
    }
}

/// Identity of the device being registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub provider_id: String,
    #[serde(default)]
    pub device_type: DeviceType,
}

impl DeviceIdentity {
    pub fn new(device_id: impl Into<String>, provider_id: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            device_id: device_id.into(),
            provider_id: provider_id.into(),
            device_type,
        }
    }
}

/// User credentials presented at login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub email: String,
    pub password: String,
    /// Country code sent with the login request
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "IN".to_string()
}

impl Default for UserCredentials {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl UserCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            country: default_country(),
        }
    }
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("email", &self.email)
            .field("password", &"***")
            .field("country", &self.country)
            .finish()
    }
}

/// Identifiers of the title to resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReference {
    pub content_id: String,
    pub package_id: String,
    pub availability_id: String,
}

impl ContentReference {
    pub fn new(
        content_id: impl Into<String>,
        package_id: impl Into<String>,
        availability_id: impl Into<String>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            package_id: package_id.into(),
            availability_id: availability_id.into(),
        }
    }
}

/// Encrypted device registration blob returned by the encrypt endpoint.
///
/// Moved into the registration stage and dropped there; it is never
/// serialized or persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedRegistrationPayload {
    pub encrypted_data: Bytes,
    pub hash: String,
}

impl std::fmt::Debug for EncryptedRegistrationPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedRegistrationPayload")
            .field("encrypted_data", &format_args!("<{} bytes>", self.encrypted_data.len()))
            .field("hash", &self.hash)
            .finish()
    }
}

macro_rules! opaque_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(token: impl Into<String>) -> Self {
                Self(token.into())
            }

            /// Raw token value, for use in outbound requests only
            pub fn expose(&self) -> &str {
                &self.0
            }

            /// Redacted form safe for logs
            pub fn redacted(&self) -> String {
                let prefix: String = self.0.chars().take(4).collect();
                format!("{prefix}…({} chars)", self.0.chars().count())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.redacted())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.redacted())
            }
        }
    };
}

opaque_token!(
    /// Token issued by device registration, scoped to one device and provider
    DeviceToken
);
opaque_token!(
    /// Provider session token issued by a successful login
    SessionToken
);
opaque_token!(
    /// Token scoped to one content package and DRM scheme
    DrmToken
);

/// Named bundle of manifest URL, license server and scheme-specific data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrmProfile {
    /// Name displayed in the selector
    pub name: String,
    /// Content manifest URL
    pub manifest_url: Url,
    /// License server URL (PlayReady/Widevine)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_server_url: Option<Url>,
    /// Extra data added to the license request (PlayReady)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<String>,
    /// DRM scheme this profile plays with, `None` for clear content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<DrmScheme>,
}

impl DrmProfile {
    /// Create a profile for clear (unprotected) content
    pub fn clear(name: impl Into<String>, manifest_url: Url) -> Self {
        Self {
            name: name.into(),
            manifest_url,
            license_server_url: None,
            custom_data: None,
            scheme: None,
        }
    }

    /// Create a profile for protected content
    pub fn protected(name: impl Into<String>, manifest_url: Url, scheme: DrmScheme) -> Self {
        Self {
            scheme: Some(scheme),
            ..Self::clear(name, manifest_url)
        }
    }

    pub fn with_license_server(mut self, url: Url) -> Self {
        self.license_server_url = Some(url);
        self
    }

    pub fn with_custom_data(mut self, data: impl Into<String>) -> Self {
        self.custom_data = Some(data.into());
        self
    }

    /// Check if the profile needs a DRM license
    pub fn is_protected(&self) -> bool {
        self.scheme.is_some()
    }
}

/// Terminal output of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    /// Run that produced this result
    pub pipeline_id: PipelineId,
    pub drm_token: DrmToken,
    pub session_token: SessionToken,
    /// Stream URL reported by package resolution, when present
    pub manifest_url: Option<Url>,
    pub completed_at: DateTime<Utc>,
}

/// Writes a token in its redacted form
fn serialize_redacted<T, S>(token: &T, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: serde::Serializer,
{
    serializer.collect_str(token)
}

/// Configuration handed to the external player. Serializing it never
/// writes the raw tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackConfig {
    pub manifest_url: Url,
    pub drm_profile: DrmProfile,
    #[serde(serialize_with = "serialize_redacted")]
    pub drm_token: DrmToken,
    #[serde(serialize_with = "serialize_redacted")]
    pub session_token: SessionToken,
    /// Stream URL reported by the package endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_manifest_url: Option<Url>,
}

/// Player engine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlayerState {
    /// No player instance
    None,
    /// Player created, nothing prepared
    Idle,
    /// Content prepared
    Ready,
    Playing,
    Paused,
}

impl PlayerState {
    /// Active states are everything except `None` and `Idle`
    pub fn is_active(&self) -> bool {
        !matches!(self, PlayerState::None | PlayerState::Idle)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::None => write!(f, "NONE"),
            PlayerState::Idle => write!(f, "IDLE"),
            PlayerState::Ready => write!(f, "READY"),
            PlayerState::Playing => write!(f, "PLAYING"),
            PlayerState::Paused => write!(f, "PAUSED"),
        }
    }
}
