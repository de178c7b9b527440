//! Configuration loading and parsing.
//!
//! Defines the server config schema and resolves defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use mpd_proto::Permissions;
use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 6600;
const DEFAULT_MAX_CLIENTS: usize = 64;
const DEFAULT_MAX_OUTPUT_BUFFER_KIB: usize = 8192;
const DEFAULT_TICK_MS: u64 = 50;
const DEFAULT_RESOLVER_COMMAND: &str = "yt-dlp";

/// Top-level server configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Protocol listener settings.
    pub mpd: Option<MpdConfig>,
    /// Playback defaults.
    pub playback: Option<PlaybackConfig>,
    /// Remote song resolution.
    pub resolver: Option<ResolverConfig>,
    /// Stored playlist location.
    pub playlists: Option<PlaylistsConfig>,
}

/// `[mpd]` section.
#[derive(Debug, Default, Deserialize)]
pub struct MpdConfig {
    /// Serve the protocol at all (default: true).
    pub enabled: Option<bool>,
    /// Listen address without port (default: 0.0.0.0).
    pub bind: Option<String>,
    /// Listen port (default: 6600).
    pub port: Option<u16>,
    /// Permissions granted to new connections: read, add, control, admin.
    pub default_permissions: Option<Vec<String>>,
    /// Advertise the server over mDNS.
    pub zeroconf: Option<bool>,
    /// Instance name used for the mDNS advertisement.
    pub zeroconf_name: Option<String>,
    /// Connections beyond this are refused.
    pub max_clients: Option<usize>,
    /// Unsent output a client may accumulate before it is disconnected.
    pub max_output_buffer_kib: Option<usize>,
}

/// `[playback]` section.
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackConfig {
    /// Startup volume, 0..=100.
    pub volume: Option<u32>,
    /// Backend kind: `simulated` or `null`.
    pub backend: Option<String>,
    /// Event-loop wait timeout in milliseconds.
    pub tick_ms: Option<u64>,
}

/// `[resolver]` section.
#[derive(Debug, Default, Deserialize)]
pub struct ResolverConfig {
    /// External resolver program; empty disables resolution.
    pub command: Option<String>,
    /// Worker threads running resolutions.
    pub workers: Option<usize>,
    /// Seconds a resolved URL is trusted.
    pub refresh_secs: Option<u64>,
    /// Seconds before retrying a failed resolution.
    pub retry_secs: Option<u64>,
    /// Revalidation horizon for local files.
    pub local_refresh_secs: Option<u64>,
}

/// `[playlists]` section.
#[derive(Debug, Default, Deserialize)]
pub struct PlaylistsConfig {
    /// Directory holding `<name>.m3u` files.
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Simulated,
    Null,
}

impl ServerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ServerConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }

    /// Load `path` when given, otherwise the first config found in the usual places, otherwise
    /// defaults.
    pub fn discover(path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = path {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        let candidates = [
            Some(PathBuf::from("config.toml")),
            dirs::config_dir().map(|dir| dir.join("stream-hub").join("config.toml")),
        ];
        for candidate in candidates.into_iter().flatten() {
            if candidate.exists() {
                return Ok((Self::load(&candidate)?, Some(candidate)));
            }
        }
        Ok((Self::default(), None))
    }
}

/// Whether the protocol listener should start.
pub fn mpd_enabled_from_config(cfg: &ServerConfig) -> bool {
    cfg.mpd.as_ref().and_then(|m| m.enabled).unwrap_or(true)
}

/// Resolve the listen address from config, with CLI overrides.
pub fn bind_from_config(
    cfg: &ServerConfig,
    bind_override: Option<IpAddr>,
    port_override: Option<u16>,
) -> Result<SocketAddr> {
    let ip = match bind_override {
        Some(ip) => ip,
        None => match cfg.mpd.as_ref().and_then(|m| m.bind.as_deref()) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("parse mpd.bind {raw}"))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        },
    };
    let port = port_override
        .or_else(|| cfg.mpd.as_ref().and_then(|m| m.port))
        .unwrap_or(DEFAULT_PORT);
    Ok(SocketAddr::new(ip, port))
}

/// Permission mask for new connections.
pub fn default_permissions_from_config(cfg: &ServerConfig) -> Result<Permissions> {
    let Some(names) = cfg.mpd.as_ref().and_then(|m| m.default_permissions.as_ref()) else {
        return Ok(Permissions::ALL);
    };
    names.iter().try_fold(Permissions::NONE, |acc, name| {
        Permissions::from_name(name)
            .map(|bit| acc | bit)
            .ok_or_else(|| anyhow::anyhow!("unknown permission {name:?}"))
    })
}

pub fn max_clients_from_config(cfg: &ServerConfig) -> usize {
    cfg.mpd
        .as_ref()
        .and_then(|m| m.max_clients)
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_CLIENTS)
}

/// Per-client output cap in bytes.
pub fn max_output_buffer_from_config(cfg: &ServerConfig) -> usize {
    cfg.mpd
        .as_ref()
        .and_then(|m| m.max_output_buffer_kib)
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_OUTPUT_BUFFER_KIB)
        .saturating_mul(1024)
}

/// mDNS instance name when advertisement is enabled.
pub fn zeroconf_name_from_config(cfg: &ServerConfig) -> Option<String> {
    let mpd = cfg.mpd.as_ref()?;
    if !mpd.zeroconf.unwrap_or(false) {
        return None;
    }
    Some(
        mpd.zeroconf_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "stream-hub".to_string()),
    )
}

/// Startup volume as a fraction.
pub fn initial_volume_from_config(cfg: &ServerConfig) -> f64 {
    let percent = cfg
        .playback
        .as_ref()
        .and_then(|p| p.volume)
        .unwrap_or(100)
        .min(100);
    f64::from(percent) / 100.0
}

pub fn backend_from_config(cfg: &ServerConfig) -> Result<BackendKind> {
    match cfg.playback.as_ref().and_then(|p| p.backend.as_deref()) {
        None => Ok(BackendKind::Simulated),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "simulated" => Ok(BackendKind::Simulated),
            "null" => Ok(BackendKind::Null),
            other => Err(anyhow::anyhow!("unknown playback.backend {other:?}")),
        },
    }
}

pub fn tick_from_config(cfg: &ServerConfig) -> Duration {
    let ms = cfg
        .playback
        .as_ref()
        .and_then(|p| p.tick_ms)
        .filter(|ms| *ms > 0)
        .unwrap_or(DEFAULT_TICK_MS);
    Duration::from_millis(ms)
}

/// Resolver program; empty means pass-through.
pub fn resolver_command_from_config(cfg: &ServerConfig) -> String {
    cfg.resolver
        .as_ref()
        .and_then(|r| r.command.clone())
        .unwrap_or_else(|| DEFAULT_RESOLVER_COMMAND.to_string())
}

pub fn resolver_workers_from_config(cfg: &ServerConfig) -> usize {
    cfg.resolver
        .as_ref()
        .and_then(|r| r.workers)
        .unwrap_or(2)
        .max(1)
}

/// Refresh, retry and local revalidation intervals.
pub fn resolver_intervals_from_config(cfg: &ServerConfig) -> (Duration, Duration, Duration) {
    let resolver = cfg.resolver.as_ref();
    let secs = |value: Option<u64>, default: u64| Duration::from_secs(value.unwrap_or(default));
    (
        secs(resolver.and_then(|r| r.refresh_secs), 3600),
        secs(resolver.and_then(|r| r.retry_secs), 60),
        secs(resolver.and_then(|r| r.local_refresh_secs), 24 * 3600),
    )
}

/// Stored playlist directory, defaulting under the user data dir.
pub fn playlists_dir_from_config(cfg: &ServerConfig) -> PathBuf {
    if let Some(dir) = cfg
        .playlists
        .as_ref()
        .and_then(|p| p.dir.as_deref())
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stream-hub")
        .join("playlists")
}
