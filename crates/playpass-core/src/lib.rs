//! PlayPass Core - device-to-playback authorization
//!
//! This crate bootstraps playback of DRM-protected video:
//! - Device registration against the licensing backend
//! - User login
//! - Content package resolution
//! - DRM token acquisition
//! - Handoff of the resulting configuration to a media player
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         PlayPass Core                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  AppConfig   │  │ DrmSelector  │  │   Gateway    │           │
//! │  │   (store)    │  │   (ring)     │  │ (reqwest/fake)│          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         │                 │          ┌──────┴──────┐            │
//! │         └─────────────────┼─────────►│  Pipeline   │            │
//! │                           │          │  S1 ... S5  │            │
//! │                           │          └──────┬──────┘            │
//! │                           │                 │ PipelineResult    │
//! │                    ┌──────┴─────────────────┴──────┐            │
//! │                    │  PlayerBootstrap / Session    │            │
//! │                    └──────────────┬────────────────┘            │
//! │                                   │ PlaybackConfig              │
//! │                            ┌──────┴──────┐                      │
//! │                            │   Player    │ (external)           │
//! │                            └─────────────┘                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod selector;
pub mod session;
pub mod types;

pub use bootstrap::{DrmSettings, Player, PlayerBootstrap, PlayerFactory, TrackInfo, TrackKind};
pub use config::{AppConfig, EndpointConfig, TimeoutConfig};
pub use error::{Error, Result};
pub use gateway::{Gateway, GatewayExt, GatewayOptions, HttpGateway, HttpRequest, ParsedResponse};
pub use pipeline::{Pipeline, PipelineContext, PipelineObserver, Stage, TracingObserver};
pub use selector::{Direction, DrmSelector};
pub use session::{BackAction, PlaybackSession, SessionId, SessionPhase, UhdChange};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "PlayPass Core initialized");
}
