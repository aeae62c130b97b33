//! Player bootstrap handoff
//!
//! Merges the tokens produced by the pipeline with the profile chosen in the
//! selector and hands the result to the external player.

use crate::error::Result;
use crate::types::{DrmProfile, DrmScheme, DrmToken, PipelineResult, PlaybackConfig, PlayerState, SessionToken};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument};
use url::Url;

/// DRM parameters passed to `Player::prepare`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrmSettings {
    pub scheme: DrmScheme,
    pub license_server_url: Option<Url>,
    pub custom_data: Option<String>,
    pub token: DrmToken,
    pub session_token: SessionToken,
}

/// Media track kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Text,
}

/// Track reported by the player engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub index: u32,
    pub kind: TrackKind,
    pub language: Option<String>,
}

/// External media player engine.
///
/// Decoding and rendering live behind this trait; PlayPass only drives it.
pub trait Player: Send {
    /// Open `url`, with DRM parameters for protected content
    fn prepare(&mut self, url: &Url, drm: Option<&DrmSettings>) -> Result<()>;

    fn play_pause(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn fast_forward(&mut self) -> Result<()>;

    fn rewind(&mut self) -> Result<()>;

    fn toggle_fullscreen(&mut self) -> Result<()>;

    fn set_uhd(&mut self, enabled: bool) -> Result<()>;

    fn tracks(&self) -> Vec<TrackInfo>;

    fn properties(&self) -> BTreeMap<String, String>;

    fn state(&self) -> PlayerState;
}

/// Creates player instances from a playback configuration
pub trait PlayerFactory {
    type Player: Player;

    fn create(&self, config: &PlaybackConfig) -> Result<Self::Player>;
}

impl PlaybackConfig {
    /// DRM parameters for the player, `None` for clear content
    pub fn drm_settings(&self) -> Option<DrmSettings> {
        let scheme = self.drm_profile.scheme?;
        Some(DrmSettings {
            scheme,
            license_server_url: self.drm_profile.license_server_url.clone(),
            custom_data: self.drm_profile.custom_data.clone(),
            token: self.drm_token.clone(),
            session_token: self.session_token.clone(),
        })
    }
}

/// Builds playback configurations and hands them to the player
pub struct PlayerBootstrap;

impl PlayerBootstrap {
    /// Merge a pipeline result with the selected profile.
    ///
    /// The manifest always comes from the profile; the package URL reported
    /// by the backend is carried alongside for players that prefer it.
    pub fn build(result: &PipelineResult, profile: &DrmProfile) -> PlaybackConfig {
        PlaybackConfig {
            manifest_url: profile.manifest_url.clone(),
            drm_profile: profile.clone(),
            drm_token: result.drm_token.clone(),
            session_token: result.session_token.clone(),
            package_manifest_url: result.manifest_url.clone(),
        }
    }

    /// Create a player for `config` and prepare it
    #[instrument(skip_all, fields(profile = %config.drm_profile.name))]
    pub fn hand_off<F: PlayerFactory>(factory: &F, config: &PlaybackConfig) -> Result<F::Player> {
        let mut player = factory.create(config)?;
        let drm = config.drm_settings();
        player.prepare(&config.manifest_url, drm.as_ref())?;

        info!(
            manifest = %config.manifest_url,
            scheme = drm.as_ref().map(|d| d.scheme.as_str()).unwrap_or("none"),
            "Player prepared"
        );
        Ok(player)
    }
}
