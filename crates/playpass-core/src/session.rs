//! Playback Session - owns everything one playback attempt needs
//!
//! Coordinates:
//! - The cancellation signal handed to the authorization pipeline
//! - DRM profile selection
//! - Player handoff once the pipeline succeeds
//! - UHD toggling and back/exit handling
//!
//! Created before the pipeline starts, torn down when playback ends or the
//! caller abandons it.

use crate::{
    bootstrap::{Player, PlayerBootstrap, PlayerFactory},
    gateway::Gateway,
    pipeline::Pipeline,
    selector::{Direction, DrmSelector},
    types::{DrmProfile, PlaybackConfig, PlayerState},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Nothing started
    Idle,
    /// Pipeline in flight
    Authorizing,
    /// Player prepared with a playback configuration
    Ready,
    /// Pipeline or handoff failed; no player exists
    Failed,
    /// Torn down
    Closed,
}

impl SessionPhase {
    /// Check if transition to target phase is valid
    pub fn can_transition_to(&self, target: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, target),
            (Idle, Authorizing)
                | (Authorizing, Ready)
                | (Authorizing, Failed)
                | (Failed, Authorizing)
                | (_, Closed)
        ) && *self != Closed
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Authorizing => write!(f, "authorizing"),
            SessionPhase::Ready => write!(f, "ready"),
            SessionPhase::Failed => write!(f, "failed"),
            SessionPhase::Closed => write!(f, "closed"),
        }
    }
}

/// Outcome of a UHD toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UhdChange {
    Enabled,
    Disabled,
    /// The panel cannot display 4K; UHD stays off
    Unsupported,
}

/// Outcome of the back/return action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackAction {
    /// Active playback was stopped
    Stopped,
    /// Nothing playing; the caller should leave the application
    Exit,
}

/// Playback session managing one authorization and the player it produces
pub struct PlaybackSession<P> {
    id: SessionId,
    phase_tx: watch::Sender<SessionPhase>,
    selector: DrmSelector,
    cancel: CancellationToken,
    uhd_enabled: bool,
    config: Option<PlaybackConfig>,
    player: Option<P>,
}

impl<P: Player> PlaybackSession<P> {
    pub fn new(selector: DrmSelector) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        Self {
            id: SessionId::new(),
            phase_tx,
            selector,
            cancel: CancellationToken::new(),
            uhd_enabled: false,
            config: None,
            player: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase_tx.borrow()
    }

    /// Subscribe to phase changes
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Token cancelled on teardown.
    ///
    /// A restart after a cancelled run gets a fresh token, so fetch this
    /// again for every `start`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn set_phase(&self, phase: SessionPhase) -> Result<()> {
        let current = self.phase();
        if !current.can_transition_to(phase) {
            return Err(Error::Internal(format!("invalid session transition: {current} -> {phase}")));
        }
        self.phase_tx.send_replace(phase);
        info!(session_id = %self.id, from = %current, to = %phase, "Session transition");
        Ok(())
    }

    /// Run the pipeline, build the playback configuration from the selected
    /// profile and hand it to a new player.
    ///
    /// On failure no player is created and the session stays usable for a
    /// fresh pipeline. Restarting after a cancelled run replaces the
    /// session token.
    #[instrument(skip_all, fields(session_id = %self.id))]
    pub async fn start<G, F>(&mut self, pipeline: Pipeline<G>, factory: &F) -> Result<&PlaybackConfig>
    where
        G: Gateway,
        F: PlayerFactory<Player = P>,
    {
        let restarting = self.phase() == SessionPhase::Failed;
        self.set_phase(SessionPhase::Authorizing)?;
        if restarting && self.cancel.is_cancelled() {
            debug!(session_id = %self.id, "Replacing cancelled session token");
            self.cancel = CancellationToken::new();
        }

        let pipeline = pipeline.with_cancellation(self.cancel.child_token());
        let outcome = match pipeline.run().await {
            Ok(result) => {
                let config = PlayerBootstrap::build(&result, self.selector.current());
                PlayerBootstrap::hand_off(factory, &config)
                    .and_then(|player| self.attach(player))
                    .map(|()| config)
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(config) => {
                self.set_phase(SessionPhase::Ready)?;
                Ok(&*self.config.insert(config))
            }
            Err(err) => {
                self.set_phase(SessionPhase::Failed)?;
                Err(err)
            }
        }
    }

    /// Adopt a prepared player, stopping the one it replaces.
    ///
    /// The current UHD flag is applied first; on failure the new player is
    /// dropped and the old one kept.
    pub fn attach(&mut self, mut player: P) -> Result<()> {
        if self.uhd_enabled {
            player.set_uhd(true)?;
        }
        if let Some(mut previous) = self.player.replace(player) {
            if previous.state().is_active() {
                previous.stop()?;
            }
        }
        Ok(())
    }

    /// Move the profile cursor; applies to the next `start`
    pub fn select(&mut self, direction: Direction) -> &DrmProfile {
        let profile = self.selector.advance(direction);
        info!(profile = %profile.name, "DRM profile selected");
        profile
    }

    pub fn selected_profile(&self) -> &DrmProfile {
        self.selector.current()
    }

    pub fn selector(&self) -> &DrmSelector {
        &self.selector
    }

    /// Toggle UHD output; enabling requires a UHD-capable panel
    pub fn toggle_uhd(&mut self, panel_supports_uhd: bool) -> Result<UhdChange> {
        let change = if self.uhd_enabled {
            self.uhd_enabled = false;
            UhdChange::Disabled
        } else if panel_supports_uhd {
            self.uhd_enabled = true;
            UhdChange::Enabled
        } else {
            warn!("This device does not have a panel capable of displaying 4K content");
            UhdChange::Unsupported
        };

        info!(uhd = self.uhd_enabled, "UHD toggled");
        if let Some(player) = self.player.as_mut() {
            player.set_uhd(self.uhd_enabled)?;
        }
        Ok(change)
    }

    pub fn uhd_enabled(&self) -> bool {
        self.uhd_enabled
    }

    /// Stop active playback, or ask the caller to exit when nothing plays
    pub fn handle_back(&mut self) -> Result<BackAction> {
        match self.player.as_mut() {
            Some(player) if player.state().is_active() => {
                player.stop()?;
                Ok(BackAction::Stopped)
            }
            _ => Ok(BackAction::Exit),
        }
    }

    /// State reported by the player, `None` without one
    pub fn player_state(&self) -> PlayerState {
        self.player.as_ref().map(Player::state).unwrap_or(PlayerState::None)
    }

    pub fn player(&self) -> Option<&P> {
        self.player.as_ref()
    }

    pub fn player_mut(&mut self) -> Option<&mut P> {
        self.player.as_mut()
    }

    pub fn config(&self) -> Option<&PlaybackConfig> {
        self.config.as_ref()
    }

    /// Cancel any in-flight pipeline, stop the player and drop it
    pub fn teardown(&mut self) -> Result<()> {
        self.cancel.cancel();

        let stopped = match self.player.take() {
            Some(mut player) if player.state().is_active() => player.stop(),
            _ => Ok(()),
        };
        self.config = None;
        if self.phase() != SessionPhase::Closed {
            self.set_phase(SessionPhase::Closed)?;
        }
        stopped
    }
}

impl<P> Drop for PlaybackSession<P> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
