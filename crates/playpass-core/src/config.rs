//! Credential and configuration store
//!
//! Holds everything the pipeline needs that is not derived from a server
//! response: device identity, user credentials, the content to resolve,
//! backend endpoints, timeouts and the DRM profile catalog.

use crate::error::{Error, Result};
use crate::types::{ContentReference, DeviceIdentity, DrmProfile, DrmScheme, UserCredentials};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Environment variable overriding the login email
pub const ENV_EMAIL: &str = "PLAYPASS_EMAIL";
/// Environment variable overriding the login password
pub const ENV_PASSWORD: &str = "PLAYPASS_PASSWORD";

/// Backend endpoint bases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base for the device encryption call
    pub device_base: Url,
    /// Base for device registration and login
    pub subscriber_base: Url,
    /// Base for package and DRM token calls
    pub content_base: Url,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            device_base: static_url("https://vsms.mobiotics.com/prod/subscriberv2/v1"),
            subscriber_base: static_url("https://vsms.mobiotics.com/prodv3/subscriberv2/v1"),
            content_base: static_url("https://vcms.mobiotics.com/prodv3/subscriber/v1"),
        }
    }
}

impl EndpointConfig {
    /// Point every endpoint at one base URL
    pub fn single(base: Url) -> Self {
        Self {
            device_base: base.clone(),
            subscriber_base: base.clone(),
            content_base: base,
        }
    }
}

/// Network timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for one pipeline stage in milliseconds
    pub stage_timeout_ms: u64,
    /// Connect/read timeout of the HTTP client in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            stage_timeout_ms: 10_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl TimeoutConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub device: DeviceIdentity,
    /// May be left out of the file and supplied through the environment
    #[serde(default)]
    pub credentials: UserCredentials,
    pub content: ContentReference,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Scheme requested from the DRM token endpoint
    #[serde(default)]
    pub drm_scheme: DrmScheme,
    #[serde(default = "default_profiles")]
    pub drm_profiles: Vec<DrmProfile>,
}

impl AppConfig {
    /// Load configuration from a TOML file, apply environment overrides and validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides();
        config.validate()?;

        info!(
            provider = %config.device.provider_id,
            profiles = config.drm_profiles.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Replace credentials with values from the environment when set
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(email) = lookup(ENV_EMAIL) {
            self.credentials.email = email;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.credentials.password = password;
        }
    }

    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("device.device_id", &self.device.device_id),
            ("device.provider_id", &self.device.provider_id),
            ("credentials.email", &self.credentials.email),
            ("credentials.password", &self.credentials.password),
            ("content.content_id", &self.content.content_id),
            ("content.package_id", &self.content.package_id),
            ("content.availability_id", &self.content.availability_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{field} must not be empty")));
            }
        }

        if self.drm_profiles.is_empty() {
            return Err(Error::InvalidConfig("at least one DRM profile is required".into()));
        }
        if self.timeouts.stage_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts.stage_timeout_ms must be positive".into()));
        }

        Ok(())
    }

    /// Find a profile by name, case-insensitive
    pub fn profile(&self, name: &str) -> Option<&DrmProfile> {
        self.drm_profiles.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// The built-in profile catalog: clear, PlayReady, PlayReady with an
/// explicit challenge, and Widevine.
pub fn default_profiles() -> Vec<DrmProfile> {
    let playready_manifest =
        static_url("http://playready.directtaps.net/smoothstreaming/SSWSS720H264PR/SuperSpeedway_720.ism/Manifest");

    vec![
        DrmProfile::clear(
            "No DRM",
            static_url("http://playready.directtaps.net/smoothstreaming/SSWSS720H264/SuperSpeedway_720.ism/Manifest"),
        ),
        DrmProfile::protected("Playready", playready_manifest.clone(), DrmScheme::PlayReady)
            .with_license_server(static_url(
                "http://playready.directtaps.net/pr/svc/rightsmanager.asmx?PlayRight=1&UseSimpleNonPersistentLicense=1",
            ))
            .with_custom_data(""),
        // License server comes from the challenge itself
        DrmProfile::protected("Playready GetChallenge", playready_manifest, DrmScheme::PlayReady)
            .with_custom_data(""),
        DrmProfile::protected(
            "Widevine",
            static_url("https://d31ib6xnmsvhmh.cloudfront.net/1XqiKmKN_AZKkDKfMG149e32f_enc.mpd"),
            DrmScheme::Widevine,
        )
        .with_license_server(static_url("https://vdrm.mobiotics.com/prod/proxy/v1/license"))
        .with_custom_data(""),
    ]
}

// Only used for compile-time constant URLs above.
fn static_url(s: &str) -> Url {
    Url::parse(s).unwrap_or_else(|e| panic!("invalid built-in URL {s}: {e}"))
}
