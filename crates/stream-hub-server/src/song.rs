//! Queue entries.
//!
//! A [`Song`] starts out as a user-supplied reference. Local files and direct stream URLs are
//! playable as-is; anything else goes through the resolver, and the resolved URL expires so
//! it is refreshed on a schedule.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::resolver::{ResolveError, Resolved};
use crate::worker_pool::TaskHandle;

/// In-flight resolution for one song.
pub type ResolveHandle = TaskHandle<Result<Resolved, ResolveError>>;

/// Playlist-scoped song identifier. Assigned once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SongId(pub u32);

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extensions treated as direct audio streams when served over http(s).
const DIRECT_EXTENSIONS: &[&str] = &[
    "mp3", "ogg", "oga", "opus", "flac", "m4a", "aac", "wav", "wma", "m3u", "m3u8", "pls",
];

#[derive(Debug)]
pub struct Song {
    pub id: SongId,
    pub source_url: String,
    pub resolved_url: String,
    pub resolved_headers: BTreeMap<String, String>,
    pub title: String,
    pub tags: BTreeMap<String, String>,
    pub thumbnail_url: String,
    pub duration: Duration,
    pub last_resolved_at: Option<SystemTime>,
    pub next_resolve_at: Option<SystemTime>,
    pub pending: Option<ResolveHandle>,
    /// Playable without resolution (local file or plain stream URL).
    pub direct: bool,
    /// Queue version of the last change touching this entry.
    pub version: u64,
}

impl Song {
    /// New entry for a raw user reference. Local paths become `file://` URLs.
    pub fn new(id: SongId, raw_url: &str, version: u64) -> Self {
        let source_url = normalize_url(raw_url);
        let direct = is_direct_url(&source_url);
        Self {
            id,
            resolved_url: if direct { source_url.clone() } else { String::new() },
            source_url,
            resolved_headers: BTreeMap::new(),
            title: String::new(),
            tags: BTreeMap::new(),
            thumbnail_url: String::new(),
            duration: Duration::ZERO,
            last_resolved_at: None,
            next_resolve_at: None,
            pending: None,
            direct,
            version,
        }
    }

    pub fn is_local(&self) -> bool {
        is_local_url(&self.source_url)
    }

    /// Filesystem path for `file://` songs.
    pub fn local_path(&self) -> Option<PathBuf> {
        local_path_from_url(&self.source_url)
    }

    /// True once there is a URL the backend can play.
    pub fn is_resolved(&self) -> bool {
        !self.resolved_url.is_empty()
    }

    /// Whether a fresh resolution should be scheduled now.
    pub fn needs_resolution(&self, now: SystemTime) -> bool {
        if self.direct || self.pending.is_some() {
            return false;
        }
        self.next_resolve_at.is_none_or(|at| at <= now)
    }

    /// Resolved and not past its refresh horizon.
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        if self.direct {
            return true;
        }
        self.is_resolved() && self.next_resolve_at.is_some_and(|at| at > now)
    }

    /// Mark a direct song as resolved with a long revalidation horizon.
    pub fn mark_direct(&mut self, now: SystemTime, horizon: Duration) {
        self.resolved_url = self.source_url.clone();
        self.last_resolved_at = Some(now);
        self.next_resolve_at = Some(now + horizon);
    }

    /// Copy a resolver result into the song. Empty fields keep what is already known.
    pub fn apply_resolution(&mut self, resolved: Resolved, now: SystemTime, refresh: Duration) {
        self.resolved_url = resolved.download_url;
        self.resolved_headers = resolved.download_headers;
        if !resolved.title.is_empty() {
            self.title = resolved.title;
        }
        if let Ok(duration) = Duration::try_from_secs_f64(resolved.duration_secs) {
            if !duration.is_zero() {
                self.duration = duration;
            }
        }
        if !resolved.thumbnail_url.is_empty() {
            self.thumbnail_url = resolved.thumbnail_url;
        }
        if let Some(artist) = resolved.artist {
            self.tags.insert("Artist".to_string(), artist);
        }
        if let Some(label) = resolved.source_label {
            self.tags.insert("Comment".to_string(), label);
        }
        self.last_resolved_at = Some(now);
        self.next_resolve_at = Some(now + refresh);
    }

    /// Leave metadata as-is and try again after `retry`.
    pub fn mark_resolution_failed(&mut self, now: SystemTime, retry: Duration) {
        self.next_resolve_at = Some(now + retry);
    }

    /// Title for display; falls back to the source URL.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.source_url
        } else {
            &self.title
        }
    }
}

/// No scheme, an absolute path, or `file://`.
pub fn is_local_url(url: &str) -> bool {
    url.starts_with('/') || url.starts_with("file://") || !url.contains("://")
}

/// Local files and http(s) URLs pointing straight at an audio file or playlist.
pub fn is_direct_url(url: &str) -> bool {
    if is_local_url(url) {
        return true;
    }
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    let Some((_, last)) = path.rsplit_once('/') else {
        return false;
    };
    last.rsplit_once('.')
        .is_some_and(|(_, ext)| DIRECT_EXTENSIONS.contains(&ext))
}

/// Turn local paths into `file://` URLs; leave everything else alone.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("file://") || !is_local_url(raw) {
        return raw.to_string();
    }
    let path = Path::new(raw);
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let encoded: Vec<String> = absolute
        .to_string_lossy()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("file://{}", encoded.join("/"))
}

/// Inverse of [`normalize_url`] for `file://` URLs.
pub fn local_path_from_url(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("file://")?;
    let decoded = urlencoding::decode(rest).ok()?;
    Some(PathBuf::from(decoded.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_paths_become_file_urls() {
        assert_eq!(normalize_url("/tmp/a.mp3"), "file:///tmp/a.mp3");
        assert_eq!(normalize_url("/music/My Song.flac"), "file:///music/My%20Song.flac");
        assert_eq!(
            local_path_from_url("file:///music/My%20Song.flac"),
            Some(PathBuf::from("/music/My Song.flac"))
        );
        assert_eq!(normalize_url("https://x.example/v"), "https://x.example/v");
    }

    #[test]
    fn direct_detection() {
        assert!(is_direct_url("file:///tmp/a.mp3"));
        assert!(is_direct_url("https://radio.example/live/stream.mp3?token=1"));
        assert!(!is_direct_url("https://www.youtube.com/watch?v=abc"));
        assert!(!is_direct_url("https://radio.example/"));
    }

    #[test]
    fn local_song_is_resolved_on_creation() {
        let song = Song::new(SongId(1), "/tmp/a.mp3", 1);
        assert!(song.direct);
        assert!(song.is_local());
        assert!(song.is_resolved());
        assert!(!song.needs_resolution(SystemTime::now()));
        assert_eq!(song.local_path(), Some(PathBuf::from("/tmp/a.mp3")));
    }

    #[test]
    fn remote_song_resolution_lifecycle() {
        let now = SystemTime::now();
        let mut song = Song::new(SongId(2), "https://video.example/watch?v=1", 1);
        assert!(!song.is_resolved());
        assert!(song.needs_resolution(now));

        song.mark_resolution_failed(now, Duration::from_secs(60));
        assert!(!song.needs_resolution(now));
        assert!(song.needs_resolution(now + Duration::from_secs(61)));

        song.apply_resolution(
            Resolved {
                title: "Clip".to_string(),
                duration_secs: 12.5,
                download_url: "https://cdn.example/a".to_string(),
                artist: Some("Uploader".to_string()),
                source_label: Some("Generic".to_string()),
                ..Resolved::default()
            },
            now,
            Duration::from_secs(3600),
        );
        assert!(song.is_fresh(now));
        assert!(!song.is_fresh(now + Duration::from_secs(3600)));
        assert_eq!(song.duration, Duration::from_millis(12_500));
        assert_eq!(song.tags.get("Artist").map(String::as_str), Some("Uploader"));
        assert_eq!(song.tags.get("Comment").map(String::as_str), Some("Generic"));
        assert_eq!(song.display_title(), "Clip");
    }

    #[test]
    fn out_of_range_duration_keeps_the_known_one() {
        let now = SystemTime::now();
        let mut song = Song::new(SongId(3), "https://video.example/watch?v=2", 1);
        song.duration = Duration::from_secs(30);
        for duration_secs in [1e300, f64::INFINITY, f64::NAN, -1.0] {
            song.apply_resolution(
                Resolved {
                    duration_secs,
                    download_url: "https://cdn.example/b".to_string(),
                    ..Resolved::default()
                },
                now,
                Duration::from_secs(3600),
            );
            assert_eq!(song.duration, Duration::from_secs(30));
        }
        assert_eq!(song.resolved_url, "https://cdn.example/b");
    }
}
