//! Song list in library (insertion) order plus the id counter and change version.

use std::ops::Range;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::song::{Song, SongId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("No such song")]
    NoSuchSong,
    #[error("Bad song index")]
    BadPosition(usize),
    #[error("Bad song index")]
    BadRange,
}

#[derive(Debug)]
pub struct Playlist {
    songs: Vec<Song>,
    next_id: u32,
    version: u64,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::new()
    }
}

impl Playlist {
    pub fn new() -> Self {
        Self {
            songs: Vec::new(),
            next_id: 1,
            version: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Current change version; bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn iter(&self) -> impl Iterator<Item = &Song> {
        self.songs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Song> {
        self.songs.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = SongId> + '_ {
        self.songs.iter().map(|song| song.id)
    }

    pub fn at(&self, position: usize) -> Option<&Song> {
        self.songs.get(position)
    }

    pub fn get(&self, id: SongId) -> Option<&Song> {
        self.songs.iter().find(|song| song.id == id)
    }

    pub fn get_mut(&mut self, id: SongId) -> Option<&mut Song> {
        self.songs.iter_mut().find(|song| song.id == id)
    }

    pub fn position_of(&self, id: SongId) -> Option<usize> {
        self.songs.iter().position(|song| song.id == id)
    }

    /// Create a song for `url` at `position` (end when `None`) and hand it back for setup.
    pub fn insert(&mut self, url: &str, position: Option<usize>) -> Result<&mut Song, QueueError> {
        let position = position.unwrap_or(self.songs.len());
        if position > self.songs.len() {
            return Err(QueueError::BadPosition(position));
        }
        let id = SongId(self.next_id);
        self.next_id += 1;
        let version = self.bump();
        self.songs.insert(position, Song::new(id, url, version));
        self.stamp_from(position, version);
        Ok(&mut self.songs[position])
    }

    pub fn remove(&mut self, id: SongId) -> Option<Song> {
        let position = self.position_of(id)?;
        let song = self.songs.remove(position);
        let version = self.bump();
        self.stamp_from(position, version);
        Some(song)
    }

    /// Remove every song; the id counter keeps counting.
    pub fn clear(&mut self) -> Vec<Song> {
        self.bump();
        std::mem::take(&mut self.songs)
    }

    /// Move `range` so its first song lands at `to` in the resulting order.
    pub fn move_range(&mut self, range: Range<usize>, to: usize) -> Result<(), QueueError> {
        if range.start >= range.end || range.end > self.songs.len() {
            return Err(QueueError::BadRange);
        }
        let count = range.end - range.start;
        if to.checked_add(count).is_none_or(|end| end > self.songs.len()) {
            return Err(QueueError::BadPosition(to));
        }
        if to == range.start {
            return Ok(());
        }
        let moved: Vec<Song> = self.songs.drain(range.clone()).collect();
        self.songs.splice(to..to, moved);
        let version = self.bump();
        let first = range.start.min(to);
        let last = range.end.max(to + count);
        for song in &mut self.songs[first..last] {
            song.version = version;
        }
        Ok(())
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.songs.len() < 2 {
            return;
        }
        self.songs.shuffle(rng);
        let version = self.bump();
        self.stamp_from(0, version);
    }

    /// Record a metadata change on one song.
    pub fn touch(&mut self, id: SongId) {
        let version = self.bump();
        if let Some(song) = self.get_mut(id) {
            song.version = version;
        }
    }

    /// Songs changed after `version`, with their positions.
    pub fn changes_since(&self, version: u64) -> impl Iterator<Item = (usize, &Song)> {
        self.songs
            .iter()
            .enumerate()
            .filter(move |(_, song)| song.version > version)
    }

    /// Songs whose `tag` matches `needle`; `exact` compares whole values, otherwise
    /// case-insensitive substring. `file` and `any` are accepted as pseudo tags.
    pub fn find(&self, tag: &str, needle: &str, exact: bool) -> Vec<(usize, &Song)> {
        let needle_lower = needle.to_lowercase();
        let matches = |value: &str| {
            if exact {
                value == needle
            } else {
                value.to_lowercase().contains(&needle_lower)
            }
        };
        self.songs
            .iter()
            .enumerate()
            .filter(|(_, song)| {
                if tag.eq_ignore_ascii_case("file") {
                    return matches(&song.source_url);
                }
                if tag.eq_ignore_ascii_case("title") {
                    return matches(&song.title);
                }
                if tag.eq_ignore_ascii_case("any") {
                    return matches(&song.source_url)
                        || matches(&song.title)
                        || song.tags.values().any(|v| matches(v));
                }
                song.tags
                    .iter()
                    .any(|(name, value)| name.eq_ignore_ascii_case(tag) && matches(value))
            })
            .collect()
    }

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn stamp_from(&mut self, position: usize, version: u64) {
        for song in self.songs.iter_mut().skip(position) {
            song.version = version;
        }
    }
}
