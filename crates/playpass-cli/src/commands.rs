//! CLI command implementations

use anyhow::{bail, Context};
use console::style;
use playpass_core::config::default_profiles;
use playpass_core::{
    AppConfig, DrmProfile, DrmScheme, DrmSelector, GatewayOptions, HttpGateway, PlaybackConfig, PlaybackSession,
    Pipeline, SessionId,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{self, Field, OutputFormat};
use crate::player::{HeadlessPlayer, HeadlessPlayerFactory};
use crate::progress::ProgressObserver;

/// Flags of the `run` subcommand
pub struct RunOptions {
    pub profile: Option<String>,
    pub drm_scheme: Option<String>,
    pub uhd: bool,
    pub show_tokens: bool,
}

/// What `run` reports once the player is prepared
#[derive(Serialize)]
struct PlaybackSummary {
    session_id: SessionId,
    profile: String,
    manifest_url: String,
    package_manifest_url: Option<String>,
    drm_scheme: Option<DrmScheme>,
    license_server_url: Option<String>,
    drm_token: String,
    session_token: String,
    uhd: bool,
}

impl PlaybackSummary {
    fn new(session_id: SessionId, config: &PlaybackConfig, uhd: bool, show_tokens: bool) -> Self {
        let reveal = |full: &str, redacted: String| if show_tokens { full.to_string() } else { redacted };
        Self {
            session_id,
            profile: config.drm_profile.name.clone(),
            manifest_url: config.manifest_url.to_string(),
            package_manifest_url: config.package_manifest_url.as_ref().map(|u| u.to_string()),
            drm_scheme: config.drm_profile.scheme,
            license_server_url: config.drm_profile.license_server_url.as_ref().map(|u| u.to_string()),
            drm_token: reveal(config.drm_token.expose(), config.drm_token.redacted()),
            session_token: reveal(config.session_token.expose(), config.session_token.redacted()),
            uhd,
        }
    }

    fn fields(&self) -> Vec<Field> {
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        vec![
            Field::new("Session", self.session_id.to_string()),
            Field::new("Profile", self.profile.clone()),
            Field::new("Manifest", self.manifest_url.clone()),
            Field::new("Package stream", or_dash(&self.package_manifest_url)),
            Field::new("DRM", self.drm_scheme.map(|s| s.to_string()).unwrap_or_else(|| "none".into())),
            Field::new("License server", or_dash(&self.license_server_url)),
            Field::new("DRM token", self.drm_token.clone()),
            Field::new("Session token", self.session_token.clone()),
            Field::new("UHD", self.uhd.to_string()),
        ]
    }
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::from_file(path).with_context(|| format!("loading configuration from {}", path.display()))
}

/// Run the authorization pipeline and prepare the headless player
pub async fn run(config_path: &Path, options: RunOptions, format: &str) -> anyhow::Result<()> {
    let format = OutputFormat::from(format);
    let config = load_config(config_path)?;

    let scheme = match options.drm_scheme.as_deref() {
        Some(s) => s.parse::<DrmScheme>().map_err(anyhow::Error::msg)?,
        None => config.drm_scheme,
    };

    let mut selector = DrmSelector::new(config.drm_profiles.clone())?;
    if let Some(name) = options.profile.as_deref() {
        if selector.select_by_name(name).is_none() {
            bail!("unknown DRM profile '{name}', see `playpass-cli profiles`");
        }
    }

    let gateway = HttpGateway::new(GatewayOptions {
        request_timeout: config.timeouts.request_timeout(),
        ..GatewayOptions::default()
    })?;

    let mut session: PlaybackSession<HeadlessPlayer> = PlaybackSession::new(selector);
    if options.uhd {
        session.toggle_uhd(true)?;
    }

    if format == OutputFormat::Text {
        println!(
            "Authorizing {} for profile {}",
            style(&config.content.content_id).bold(),
            style(&session.selected_profile().name).cyan()
        );
    }

    let observer = Arc::new(ProgressObserver::new()?);
    let pipeline = Pipeline::from_config(gateway, &config)
        .with_drm_scheme(scheme)
        .with_observer(observer.clone());

    let cancel = session.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = session.start(pipeline, &HeadlessPlayerFactory).await.cloned();
    observer.finish();
    ctrl_c.abort();

    let playback = match outcome {
        Ok(playback) => playback,
        Err(err) => {
            eprintln!("{} {}", style("Authorization failed:").red().bold(), err);
            session.teardown()?;
            return Err(err.into());
        }
    };

    let summary = PlaybackSummary::new(session.id(), &playback, session.uhd_enabled(), options.show_tokens);
    match format {
        OutputFormat::Json => println!("{}", output::to_json(&summary)?),
        _ => {
            println!("{}", style("Playback ready").green().bold());
            output::print_fields(summary.fields(), format);
        }
    }

    session.teardown()?;
    Ok(())
}

/// Row of the profile listing
#[derive(Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "DRM")]
    scheme: String,
    #[tabled(rename = "Manifest")]
    manifest_url: String,
    #[tabled(rename = "License server")]
    license_server_url: String,
}

impl ProfileRow {
    fn new(index: usize, profile: &DrmProfile) -> Self {
        Self {
            index,
            name: profile.name.clone(),
            scheme: profile.scheme.map(|s| s.to_string()).unwrap_or_else(|| "none".into()),
            manifest_url: profile.manifest_url.to_string(),
            license_server_url: profile
                .license_server_url
                .as_ref()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "-".into()),
        }
    }
}

/// List the DRM profiles from the configuration, or the built-in catalog
/// when no configuration file exists
pub fn profiles(config_path: &Path, format: &str) -> anyhow::Result<()> {
    let profiles = if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        AppConfig::from_toml(&content)?.drm_profiles
    } else {
        default_profiles()
    };

    let rows: Vec<ProfileRow> = profiles
        .iter()
        .enumerate()
        .map(|(i, p)| ProfileRow::new(i + 1, p))
        .collect();

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&rows)?),
        OutputFormat::Table => println!("{}", output::to_table(rows)),
        OutputFormat::Text => {
            for row in rows {
                println!("  {}. {} ({})", row.index, row.name, row.scheme);
                println!("     {}", row.manifest_url);
            }
        }
    }

    Ok(())
}

/// Validate the configuration and print what the pipeline will use
pub fn check_config(config_path: &Path, format: &str) -> anyhow::Result<()> {
    let format = OutputFormat::from(format);
    let config = load_config(config_path)?;

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "path": config_path.display().to_string(),
                "valid": true,
                "provider": config.device.provider_id,
                "device_type": config.device.device_type,
                "content_id": config.content.content_id,
                "drm_scheme": config.drm_scheme,
                "profiles": config.drm_profiles.len(),
                "endpoints": config.endpoints,
                "timeouts": config.timeouts,
            });
            println!("{}", output::to_json(&report)?);
        }
        _ => {
            output::print_fields(
                vec![
                    Field::new("Provider", config.device.provider_id.clone()),
                    Field::new("Device", format!("{} ({})", config.device.device_id, config.device.device_type.as_str())),
                    Field::new("Account", config.credentials.email.clone()),
                    Field::new("Content", config.content.content_id.clone()),
                    Field::new("DRM scheme", config.drm_scheme.to_string()),
                    Field::new("Profiles", config.drm_profiles.len().to_string()),
                    Field::new("Device endpoint", config.endpoints.device_base.to_string()),
                    Field::new("Subscriber endpoint", config.endpoints.subscriber_base.to_string()),
                    Field::new("Content endpoint", config.endpoints.content_base.to_string()),
                    Field::new("Stage timeout", format!("{}ms", config.timeouts.stage_timeout_ms)),
                ],
                format,
            );
            println!("{}", style("Configuration OK").green().bold());
        }
    }

    Ok(())
}
