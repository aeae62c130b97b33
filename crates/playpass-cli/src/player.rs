//! Headless player used by the CLI
//!
//! Records what a real engine would be asked to do and reports it through
//! tracing. No media is decoded.

use playpass_core::{
    DrmSettings, PlaybackConfig, Player, PlayerFactory, PlayerState, Result, TrackInfo,
};
use std::collections::BTreeMap;
use tracing::info;
use url::Url;

pub struct HeadlessPlayer {
    state: PlayerState,
    source: Option<Url>,
    scheme: Option<String>,
    uhd: bool,
    fullscreen: bool,
}

impl HeadlessPlayer {
    fn new() -> Self {
        Self {
            state: PlayerState::Idle,
            source: None,
            scheme: None,
            uhd: false,
            fullscreen: false,
        }
    }
}

impl Player for HeadlessPlayer {
    fn prepare(&mut self, url: &Url, drm: Option<&DrmSettings>) -> Result<()> {
        info!(
            url = %url,
            scheme = drm.map(|d| d.scheme.as_str()).unwrap_or("none"),
            license_server = drm.and_then(|d| d.license_server_url.as_ref()).map(Url::as_str).unwrap_or("-"),
            "Preparing source"
        );
        self.source = Some(url.clone());
        self.scheme = drm.map(|d| d.scheme.to_string());
        self.state = PlayerState::Ready;
        Ok(())
    }

    fn play_pause(&mut self) -> Result<()> {
        self.state = match self.state {
            PlayerState::Playing => PlayerState::Paused,
            PlayerState::Ready | PlayerState::Paused => PlayerState::Playing,
            other => other,
        };
        info!(state = %self.state, "Play/pause");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.state = PlayerState::Idle;
        info!("Playback stopped");
        Ok(())
    }

    fn fast_forward(&mut self) -> Result<()> {
        info!("Fast forward");
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        info!("Rewind");
        Ok(())
    }

    fn toggle_fullscreen(&mut self) -> Result<()> {
        self.fullscreen = !self.fullscreen;
        info!(fullscreen = self.fullscreen, "Fullscreen toggled");
        Ok(())
    }

    fn set_uhd(&mut self, enabled: bool) -> Result<()> {
        self.uhd = enabled;
        info!(uhd = enabled, "UHD output");
        Ok(())
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        Vec::new()
    }

    fn properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("state".to_string(), self.state.to_string());
        props.insert("uhd".to_string(), self.uhd.to_string());
        props.insert("fullscreen".to_string(), self.fullscreen.to_string());
        if let Some(source) = &self.source {
            props.insert("source".to_string(), source.to_string());
        }
        if let Some(scheme) = &self.scheme {
            props.insert("drm".to_string(), scheme.clone());
        }
        props
    }

    fn state(&self) -> PlayerState {
        self.state
    }
}

pub struct HeadlessPlayerFactory;

impl PlayerFactory for HeadlessPlayerFactory {
    type Player = HeadlessPlayer;

    fn create(&self, config: &PlaybackConfig) -> Result<HeadlessPlayer> {
        info!(profile = %config.drm_profile.name, "Creating headless player");
        Ok(HeadlessPlayer::new())
    }
}
