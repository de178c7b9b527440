//! Named playlists saved as extended M3U files.
//!
//! Layout per song:
//!
//! ```text
//! #EXTINF:<seconds>,<title>
//! #STREAMHUB:<resolved url>,<thumbnail>,<tag>=<value>,...
//! <source url>
//! ```
//!
//! Fields on the `#STREAMHUB` line are percent-encoded so commas survive.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const HEADER: &str = "#EXTM3U";
const EXTINF: &str = "#EXTINF:";
const EXTRA: &str = "#STREAMHUB:";
const EXTENSION: &str = "m3u";

#[derive(Debug, thiserror::Error)]
pub enum PlaylistFileError {
    #[error("invalid playlist name")]
    InvalidName,
    #[error("No such playlist")]
    NotFound,
    #[error("Playlist already exists")]
    AlreadyExists,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One saved song.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredEntry {
    pub source_url: String,
    pub title: String,
    pub duration_secs: u64,
    pub resolved_url: String,
    pub thumbnail_url: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPlaylistInfo {
    pub name: String,
    pub modified: Option<SystemTime>,
}

/// Directory of saved playlists.
#[derive(Debug, Clone)]
pub struct PlaylistStore {
    dir: PathBuf,
}

impl PlaylistStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saved playlists sorted by name. A missing directory means none.
    pub fn list(&self) -> Result<Vec<StoredPlaylistInfo>, PlaylistFileError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut playlists = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let modified = entry.metadata().and_then(|meta| meta.modified()).ok();
            playlists.push(StoredPlaylistInfo {
                name: name.to_string(),
                modified,
            });
        }
        playlists.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(playlists)
    }

    /// Write a new playlist; refuses to overwrite.
    pub fn save(&self, name: &str, songs: &[StoredEntry]) -> Result<(), PlaylistFileError> {
        let path = self.path_for(name)?;
        if path.exists() {
            return Err(PlaylistFileError::AlreadyExists);
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, render_m3u(songs))?;
        tracing::info!(name, songs = songs.len(), path = %path.display(), "playlist saved");
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Vec<StoredEntry>, PlaylistFileError> {
        let path = self.path_for(name)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PlaylistFileError::NotFound);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(parse_m3u(&raw))
    }

    pub fn remove(&self, name: &str) -> Result<(), PlaylistFileError> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(name, "playlist removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(PlaylistFileError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, PlaylistFileError> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\n', '\r']) {
            return Err(PlaylistFileError::InvalidName);
        }
        Ok(self.dir.join(format!("{name}.{EXTENSION}")))
    }
}

pub fn render_m3u(songs: &[StoredEntry]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for song in songs {
        out.push_str(&format!("{EXTINF}{},{}\n", song.duration_secs, song.title));
        let mut extra = vec![
            urlencoding::encode(&song.resolved_url).into_owned(),
            urlencoding::encode(&song.thumbnail_url).into_owned(),
        ];
        extra.extend(song.tags.iter().map(|(name, value)| {
            format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
        }));
        out.push_str(EXTRA);
        out.push_str(&extra.join(","));
        out.push('\n');
        out.push_str(&song.source_url);
        out.push('\n');
    }
    out
}

/// Parse an M3U body. Plain M3U without extended lines is accepted; unknown comments are
/// skipped.
pub fn parse_m3u(raw: &str) -> Vec<StoredEntry> {
    let mut songs = Vec::new();
    let mut pending = StoredEntry::default();
    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if let Some(info) = line.strip_prefix(EXTINF) {
            let (secs, title) = info.split_once(',').unwrap_or((info, ""));
            pending.duration_secs = secs.trim().parse::<i64>().unwrap_or(0).max(0) as u64;
            pending.title = title.to_string();
            continue;
        }
        if let Some(extra) = line.strip_prefix(EXTRA) {
            let mut fields = extra.split(',');
            pending.resolved_url = fields.next().map(decode).unwrap_or_default();
            pending.thumbnail_url = fields.next().map(decode).unwrap_or_default();
            for field in fields {
                if let Some((name, value)) = field.split_once('=') {
                    pending.tags.insert(decode(name), decode(value));
                }
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        pending.source_url = line.to_string();
        songs.push(std::mem::take(&mut pending));
    }
    songs
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|value| value.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
