//! Remote song resolution.
//!
//! Turns a user-supplied web reference into a directly playable URL plus metadata. Runs on
//! the worker pool; implementations may block for seconds.

use std::collections::BTreeMap;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

/// Result of a successful resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolved {
    pub title: String,
    pub duration_secs: f64,
    pub thumbnail_url: String,
    pub download_url: String,
    pub download_headers: BTreeMap<String, String>,
    pub artist: Option<String>,
    pub source_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("failed to run {command}: {message}")]
    Spawn { command: String, message: String },
    #[error("resolver exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("resolver output not understood: {0}")]
    Parse(String),
    #[error("resolver returned no playable url")]
    NoUrl,
    #[error("resolution did not complete: {0}")]
    Aborted(String),
}

/// Looks up playable URLs for remote references.
pub trait Resolver: Send + Sync {
    fn name(&self) -> &str;
    fn resolve(&self, url: &str) -> Result<Resolved, ResolveError>;
}

/// Shells out to a youtube-dl compatible tool and parses its JSON dump.
pub struct YtDlpResolver {
    command: String,
}

impl YtDlpResolver {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Resolver for YtDlpResolver {
    fn name(&self) -> &str {
        &self.command
    }

    fn resolve(&self, url: &str) -> Result<Resolved, ResolveError> {
        tracing::debug!(command = %self.command, url, "resolving");
        let output = Command::new(&self.command)
            .args([
                "--dump-single-json",
                "--no-playlist",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                url,
            ])
            .output()
            .map_err(|e| ResolveError::Spawn {
                command: self.command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ResolveError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_ytdlp_json(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Pass-through resolver used when no external tool is configured.
pub struct DirectResolver;

impl Resolver for DirectResolver {
    fn name(&self) -> &str {
        "direct"
    }

    fn resolve(&self, url: &str) -> Result<Resolved, ResolveError> {
        Ok(Resolved {
            download_url: url.to_string(),
            ..Resolved::default()
        })
    }
}

/// Pick the resolver for a configured command; an empty command means pass-through.
pub fn resolver_for_command(command: &str) -> Arc<dyn Resolver> {
    let command = command.trim();
    if command.is_empty() {
        Arc::new(DirectResolver)
    } else {
        Arc::new(YtDlpResolver::new(command))
    }
}

#[derive(Debug, Deserialize)]
struct YtDlpDump {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    http_headers: BTreeMap<String, String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    extractor_key: Option<String>,
    #[serde(default)]
    requested_formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    http_headers: BTreeMap<String, String>,
    #[serde(default)]
    vcodec: Option<String>,
}

fn parse_ytdlp_json(raw: &str) -> Result<Resolved, ResolveError> {
    let dump: YtDlpDump =
        serde_json::from_str(raw.trim()).map_err(|e| ResolveError::Parse(e.to_string()))?;

    // Merged formats carry the audio stream in `requested_formats` instead of `url`.
    let audio_format = dump
        .requested_formats
        .iter()
        .find(|f| f.vcodec.as_deref() == Some("none") && f.url.is_some());
    let (download_url, download_headers) = match (dump.url, audio_format) {
        (Some(url), _) if !url.is_empty() => (url, dump.http_headers),
        (_, Some(format)) => (
            format.url.clone().unwrap_or_default(),
            format.http_headers.clone(),
        ),
        _ => return Err(ResolveError::NoUrl),
    };

    Ok(Resolved {
        title: dump.title.unwrap_or_default(),
        duration_secs: dump
            .duration
            .filter(|secs| Duration::try_from_secs_f64(*secs).is_ok())
            .unwrap_or(0.0),
        thumbnail_url: dump.thumbnail.unwrap_or_default(),
        download_url,
        download_headers,
        artist: dump.artist.or(dump.uploader).filter(|a| !a.is_empty()),
        source_label: dump.extractor_key.filter(|s| !s.is_empty()),
    })
}
