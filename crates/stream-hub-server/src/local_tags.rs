use std::path::Path;
use std::time::Duration;

use lofty::{read_from_path, Accessor, AudioFile, ItemKey, TaggedFileExt};

/// Metadata probed from a local audio file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalMeta {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub date: Option<String>,
    pub duration: Duration,
}

impl LocalMeta {
    /// Tag name/value pairs using protocol tag names.
    pub fn tag_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        for (name, value) in [
            ("Artist", &self.artist),
            ("Album", &self.album),
            ("AlbumArtist", &self.album_artist),
            ("Genre", &self.genre),
            ("Date", &self.date),
        ] {
            if let Some(value) = value.as_ref().filter(|v| !v.trim().is_empty()) {
                pairs.push((name, value.clone()));
            }
        }
        pairs
    }
}

/// Read tags and duration from a local file.
pub fn probe(path: &Path) -> Result<LocalMeta, lofty::LoftyError> {
    let tagged_file = read_from_path(path)?;
    let duration = tagged_file.properties().duration();
    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return Ok(LocalMeta {
            duration,
            ..LocalMeta::default()
        });
    };

    Ok(LocalMeta {
        title: tag.title().map(|v| v.to_string()),
        artist: tag.artist().map(|v| v.to_string()),
        album: tag.album().map(|v| v.to_string()),
        album_artist: tag.get_string(&ItemKey::AlbumArtist).map(str::to_string),
        genre: tag.genre().map(|v| v.to_string()),
        date: tag
            .get_string(&ItemKey::RecordingDate)
            .map(str::to_string)
            .or_else(|| tag.year().map(|y| y.to_string())),
        duration,
    })
}

/// Duration only; `None` when the file cannot be parsed.
pub fn probe_duration(path: &Path) -> Option<Duration> {
    read_from_path(path)
        .ok()
        .map(|file| file.properties().duration())
        .filter(|d| !d.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-audio.mp3");
        std::fs::write(&path, b"definitely not an mp3").unwrap();
        assert!(probe(&path).is_err());
        assert_eq!(probe_duration(&path), None);
        assert_eq!(probe_duration(&dir.path().join("missing.flac")), None);
    }

    #[test]
    fn tag_pairs_skip_blank_values() {
        let meta = LocalMeta {
            artist: Some("Artist".to_string()),
            album: Some("  ".to_string()),
            date: Some("1999".to_string()),
            ..LocalMeta::default()
        };
        assert_eq!(
            meta.tag_pairs(),
            vec![("Artist", "Artist".to_string()), ("Date", "1999".to_string())]
        );
    }
}
