//! Playback queue engine.
//!
//! Owns the playlist, the play order, the current-song pointer and the play-mode flags, and
//! drives the audio backend. Only the event-loop thread touches it; remote resolutions run
//! on the worker pool and are picked up on `update()`.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::Receiver;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::backend::{AudioBackend, BackendError, BackendEvent, PlayState, StreamId};
use crate::events::{EventRelay, QueueEvent};
use crate::local_tags;
use crate::play_queue::PlayQueue;
use crate::playlist::{Playlist, QueueError};
use crate::resolver::{ResolveError, Resolved, Resolver};
use crate::song::{normalize_url, Song, SongId};
use crate::worker_pool::{TaskError, WorkerPool};

/// Timing knobs for resolution and the initial mixer level.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// How long a resolved remote URL is trusted.
    pub refresh_interval: Duration,
    /// Delay before retrying a failed resolution.
    pub retry_interval: Duration,
    /// Revalidation horizon for direct songs.
    pub local_refresh_interval: Duration,
    /// Linear volume `0.0..=1.0` applied at startup.
    pub initial_volume: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(3600),
            retry_interval: Duration::from_secs(60),
            local_refresh_interval: Duration::from_secs(24 * 3600),
            initial_volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingleMode {
    #[default]
    Off,
    On,
    /// Repeat the current song once, then fall back to `Off`.
    Oneshot,
}

impl SingleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SingleMode::Off => "0",
            SingleMode::On => "1",
            SingleMode::Oneshot => "oneshot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayOptions {
    pub random: bool,
    pub repeat: bool,
    pub consume: bool,
    pub single: SingleMode,
}

/// How a removal names its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongRef {
    Id(SongId),
    Position(usize),
    /// Source URL, or a case-insensitive title fragment.
    Search(String),
}

/// Snapshot reported by `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlayState,
    pub volume: u32,
    pub options: PlayOptions,
    pub playlist_version: u64,
    pub playlist_length: usize,
    /// Position and id of the current song while playing or paused.
    pub song: Option<(usize, SongId)>,
    pub elapsed: Duration,
    pub duration: Duration,
    pub next: Option<(usize, SongId)>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineStats {
    pub uptime: Duration,
    pub playtime: Duration,
    pub songs: usize,
    pub db_playtime: Duration,
    pub artists: usize,
    pub albums: usize,
}

/// Metadata known ahead of resolution (stored playlists).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongSeed {
    pub title: String,
    pub duration: Duration,
    pub thumbnail_url: String,
    pub tags: BTreeMap<String, String>,
}

pub struct QueueEngine {
    playlist: Playlist,
    play_queue: PlayQueue,
    current: Option<SongId>,
    options: PlayOptions,
    volume: f64,
    last_error: Option<String>,
    events: EventRelay,
    backend: Box<dyn AudioBackend>,
    backend_events: Receiver<BackendEvent>,
    active_stream: Option<StreamId>,
    /// Backend paused for buffering while the reported state stays `Playing`.
    buffering_paused: bool,
    /// State requested for a current song whose resolution has not succeeded yet.
    awaiting: Option<PlayState>,
    announced: PlayState,
    resolver: Arc<dyn Resolver>,
    pool: WorkerPool,
    rng: StdRng,
    settings: EngineSettings,
    started_at: Instant,
    play_time: Duration,
    playing_since: Option<Instant>,
}

impl QueueEngine {
    pub fn new(
        mut backend: Box<dyn AudioBackend>,
        backend_events: Receiver<BackendEvent>,
        resolver: Arc<dyn Resolver>,
        pool: WorkerPool,
        settings: EngineSettings,
    ) -> Self {
        let volume = settings.initial_volume.clamp(0.0, 1.0);
        backend.set_volume(volume);
        tracing::info!(
            backend = backend.name(),
            resolver = resolver.name(),
            volume,
            "queue engine ready"
        );
        Self {
            playlist: Playlist::new(),
            play_queue: PlayQueue::new(),
            current: None,
            options: PlayOptions::default(),
            volume,
            last_error: None,
            events: EventRelay::new(),
            backend,
            backend_events,
            active_stream: None,
            buffering_paused: false,
            awaiting: None,
            announced: PlayState::Stopped,
            resolver,
            pool,
            rng: StdRng::from_entropy(),
            settings,
            started_at: Instant::now(),
            play_time: Duration::ZERO,
            playing_since: None,
        }
    }

    /// Use a fixed seed for play-order shuffling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn play_queue(&self) -> &PlayQueue {
        &self.play_queue
    }

    pub fn current(&self) -> Option<SongId> {
        self.current
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.current.and_then(|id| self.playlist.get(id))
    }

    pub fn options(&self) -> PlayOptions {
        self.options
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Volume as a percentage.
    pub fn volume_percent(&self) -> u32 {
        (self.volume * 100.0).round() as u32
    }

    /// Take the events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<QueueEvent> {
        self.events.drain().collect()
    }

    // --- queue mutation -------------------------------------------------------------

    /// Append (or insert at `position`) a song for `url` and return its id.
    pub fn add_song(&mut self, url: &str, position: Option<usize>) -> Result<SongId, QueueError> {
        let now = SystemTime::now();
        let local_horizon = self.settings.local_refresh_interval;
        let song = self.playlist.insert(url, position)?;
        let id = song.id;
        let direct = song.direct;
        if direct {
            song.mark_direct(now, local_horizon);
            if let Some(path) = song.local_path() {
                match local_tags::probe(&path) {
                    Ok(meta) => {
                        for (name, value) in meta.tag_pairs() {
                            song.tags.insert(name.to_string(), value);
                        }
                        song.title = meta.title.unwrap_or_default();
                        song.duration = meta.duration;
                    }
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "local tags unavailable");
                    }
                }
            }
        }
        tracing::debug!(song = %id, url, direct, "song added");

        if self.options.random {
            self.play_queue.insert_random(id, &mut self.rng);
        } else {
            self.rebuild_order();
        }
        if !direct {
            self.schedule_resolution(id);
        }
        self.events.queue_changed();
        Ok(id)
    }

    /// Attach metadata known ahead of resolution. Fields already set are kept.
    pub fn seed_metadata(&mut self, id: SongId, seed: SongSeed) {
        let Some(song) = self.playlist.get_mut(id) else {
            return;
        };
        if song.title.is_empty() {
            song.title = seed.title;
        }
        if song.duration.is_zero() {
            song.duration = seed.duration;
        }
        if song.thumbnail_url.is_empty() {
            song.thumbnail_url = seed.thumbnail_url;
        }
        for (name, value) in seed.tags {
            song.tags.entry(name).or_insert(value);
        }
        self.playlist.touch(id);
        self.events.queue_changed();
    }

    pub fn remove_song(&mut self, target: SongRef) -> Result<(), QueueError> {
        let ids = match target {
            SongRef::Id(id) => {
                self.playlist.get(id).ok_or(QueueError::NoSuchSong)?;
                vec![id]
            }
            SongRef::Position(pos) => {
                vec![self.playlist.at(pos).ok_or(QueueError::BadPosition(pos))?.id]
            }
            SongRef::Search(needle) => {
                let normalized = normalize_url(&needle);
                let lower = needle.to_lowercase();
                let ids: Vec<SongId> = self
                    .playlist
                    .iter()
                    .filter(|song| {
                        song.source_url == needle
                            || song.source_url == normalized
                            || (!lower.is_empty() && song.title.to_lowercase().contains(&lower))
                    })
                    .map(|song| song.id)
                    .collect();
                if ids.is_empty() {
                    return Err(QueueError::NoSuchSong);
                }
                ids
            }
        };
        self.remove_ids(&ids);
        Ok(())
    }

    /// Remove the songs at positions `range`.
    pub fn remove_range(&mut self, range: Range<usize>) -> Result<(), QueueError> {
        if range.start >= range.end || range.end > self.playlist.len() {
            return Err(QueueError::BadRange);
        }
        let ids: Vec<SongId> = range
            .filter_map(|pos| self.playlist.at(pos).map(|song| song.id))
            .collect();
        self.remove_ids(&ids);
        Ok(())
    }

    pub fn remove_all(&mut self) {
        for song in self.playlist.clear() {
            if let Some(handle) = song.pending {
                handle.cancel();
            }
        }
        self.play_queue.clear();
        if self.current.take().is_some() || self.awaiting.is_some() {
            self.awaiting = None;
            self.buffering_paused = false;
            self.teardown_backend();
            self.player_changed();
        }
        self.events.queue_changed();
    }

    fn remove_ids(&mut self, ids: &[SongId]) {
        let removing_current = self.current.is_some_and(|id| ids.contains(&id));
        let follower = if removing_current {
            self.follower_excluding(ids)
        } else {
            None
        };
        let resume = self.reported_state();

        for id in ids {
            if let Some(song) = self.playlist.remove(*id) {
                if let Some(handle) = song.pending {
                    handle.cancel();
                }
            }
            self.play_queue.remove(*id);
        }
        self.events.queue_changed();

        if removing_current {
            self.current = None;
            match follower {
                Some(next) if resume != PlayState::Stopped => self.change_song(Some(next), resume),
                _ => self.change_song(None, PlayState::Stopped),
            }
        }
    }

    /// Next song in play order after the current one that is not in `removed`.
    fn follower_excluding(&self, removed: &[SongId]) -> Option<SongId> {
        let current = self.current?;
        let order = self.play_queue.ids();
        let len = order.len();
        let start = self.play_queue.position(current).unwrap_or(0);
        (1..len)
            .map(|step| start + step)
            .filter(|idx| self.options.repeat || *idx < len)
            .map(|idx| order[idx % len])
            .find(|id| !removed.contains(id))
    }

    /// Move positions `range` so the first lands at `to`.
    pub fn move_range(&mut self, range: Range<usize>, to: usize) -> Result<(), QueueError> {
        self.playlist.move_range(range, to)?;
        if !self.options.random {
            self.rebuild_order();
        }
        self.events.queue_changed();
        Ok(())
    }

    pub fn move_id(&mut self, id: SongId, to: usize) -> Result<(), QueueError> {
        let pos = self.playlist.position_of(id).ok_or(QueueError::NoSuchSong)?;
        self.move_range(pos..pos + 1, to)
    }

    /// Shuffle the playlist order itself.
    pub fn shuffle(&mut self) {
        self.playlist.shuffle(&mut self.rng);
        if !self.options.random {
            self.rebuild_order();
        }
        self.events.queue_changed();
    }

    // --- playback control -----------------------------------------------------------

    pub fn play(&mut self) {
        if self.awaiting.is_some() && self.current.is_some() {
            self.change_song(self.current, PlayState::Playing);
            return;
        }
        match self.reported_state() {
            PlayState::Paused => self.resume(),
            PlayState::Playing => {}
            PlayState::Stopped => {
                self.rebuild_play_queue(None);
                if let Some(first) = self.play_queue.first() {
                    self.change_song(Some(first), PlayState::Playing);
                }
            }
        }
    }

    pub fn play_position(&mut self, position: usize) -> Result<(), QueueError> {
        let id = self
            .playlist
            .at(position)
            .ok_or(QueueError::BadPosition(position))?
            .id;
        self.change_song(Some(id), PlayState::Playing);
        Ok(())
    }

    pub fn play_id(&mut self, id: SongId) -> Result<(), QueueError> {
        self.playlist.get(id).ok_or(QueueError::NoSuchSong)?;
        self.change_song(Some(id), PlayState::Playing);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.awaiting == Some(PlayState::Playing) {
            self.awaiting = Some(PlayState::Paused);
            self.player_changed();
            return;
        }
        if self.reported_state() != PlayState::Playing {
            return;
        }
        self.buffering_paused = false;
        if let Err(e) = self.backend.set_state(PlayState::Paused) {
            self.backend_failed("pause", e);
        }
        self.player_changed();
    }

    pub fn resume(&mut self) {
        if self.awaiting == Some(PlayState::Paused) {
            self.awaiting = Some(PlayState::Playing);
            self.player_changed();
            return;
        }
        if self.reported_state() != PlayState::Paused {
            return;
        }
        if let Err(e) = self.backend.set_state(PlayState::Playing) {
            self.backend_failed("resume", e);
        }
        self.player_changed();
    }

    pub fn toggle_pause(&mut self) {
        match self.reported_state() {
            PlayState::Playing => self.pause(),
            PlayState::Paused => self.resume(),
            PlayState::Stopped => {}
        }
    }

    pub fn stop(&mut self) {
        let was_active = self.current.is_some() || self.backend.state() != PlayState::Stopped;
        self.current = None;
        self.awaiting = None;
        self.buffering_paused = false;
        self.teardown_backend();
        if was_active {
            self.player_changed();
        }
    }

    pub fn next(&mut self) {
        let state = self.continue_state();
        let target = self.select_step(true);
        self.change_to_or_stop(target, state);
    }

    pub fn previous(&mut self) {
        let state = self.continue_state();
        let target = self.select_step(false);
        self.change_to_or_stop(target, state);
    }

    fn continue_state(&self) -> PlayState {
        match self.reported_state() {
            PlayState::Stopped => PlayState::Playing,
            other => other,
        }
    }

    fn change_to_or_stop(&mut self, target: Option<SongId>, state: PlayState) {
        match target {
            Some(id) => self.change_song(Some(id), state),
            None => self.change_song(None, PlayState::Stopped),
        }
    }

    // --- options --------------------------------------------------------------------

    pub fn set_random(&mut self, random: bool) {
        if self.options.random != random {
            self.options.random = random;
            if random {
                self.play_queue.shuffle(self.current, &mut self.rng);
            } else {
                self.rebuild_order();
            }
        }
        self.events.options_changed();
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.options.repeat = repeat;
        self.events.options_changed();
    }

    pub fn set_consume(&mut self, consume: bool) {
        self.options.consume = consume;
        self.events.options_changed();
    }

    pub fn set_single(&mut self, single: SingleMode) {
        self.options.single = single;
        self.events.options_changed();
    }

    /// Set linear volume, clamped to `0.0..=1.0`.
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
        self.backend.set_volume(self.volume);
        self.events.volume_changed();
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
        self.events.player_changed();
    }

    // --- reporting ------------------------------------------------------------------

    /// Playback as clients see it. A song whose resolution failed reports `stop` with the
    /// error until a retry starts it, but stays the current song.
    pub fn status(&self) -> PlaybackStatus {
        let state = if self.awaiting.is_some() {
            PlayState::Stopped
        } else {
            self.reported_state()
        };
        let current = self
            .current_song()
            .filter(|_| state != PlayState::Stopped || self.awaiting.is_some());
        let song = current.and_then(|song| {
            self.playlist
                .position_of(song.id)
                .map(|pos| (pos, song.id))
        });
        let elapsed = if song.is_some() {
            self.backend.position().unwrap_or_default()
        } else {
            Duration::ZERO
        };
        let duration = self
            .backend
            .duration()
            .filter(|d| !d.is_zero() && song.is_some())
            .or_else(|| current.map(|s| s.duration))
            .unwrap_or_default();
        let next = self
            .peek_next()
            .and_then(|id| self.playlist.position_of(id).map(|pos| (pos, id)));

        PlaybackStatus {
            state,
            volume: self.volume_percent(),
            options: self.options,
            playlist_version: self.playlist.version(),
            playlist_length: self.playlist.len(),
            song,
            elapsed,
            duration,
            next,
            error: self.last_error.clone(),
        }
    }

    pub fn stats(&self) -> EngineStats {
        let running = self.playing_since.map(|at| at.elapsed()).unwrap_or_default();
        let mut artists = BTreeSet::new();
        let mut albums = BTreeSet::new();
        let mut db_playtime = Duration::ZERO;
        for song in self.playlist.iter() {
            db_playtime += song.duration;
            if let Some(artist) = song.tags.get("Artist") {
                artists.insert(artist.as_str());
            }
            if let Some(album) = song.tags.get("Album") {
                albums.insert(album.as_str());
            }
        }
        EngineStats {
            uptime: self.started_at.elapsed(),
            playtime: self.play_time + running,
            songs: self.playlist.len(),
            db_playtime,
            artists: artists.len(),
            albums: albums.len(),
        }
    }

    /// Song that will play after the current one ends naturally.
    pub fn peek_next(&self) -> Option<SongId> {
        match self.options.single {
            SingleMode::Oneshot => self.current,
            SingleMode::On if self.options.repeat => self.current,
            SingleMode::On => None,
            SingleMode::Off => self.peek_step(true),
        }
    }

    /// State the controls act on: the requested state while playback waits on resolution.
    fn reported_state(&self) -> PlayState {
        if let Some(state) = self.awaiting {
            return state;
        }
        if self.buffering_paused {
            return PlayState::Playing;
        }
        self.backend.state()
    }

    // --- tick -----------------------------------------------------------------------

    /// Periodic housekeeping: backend signals, finished resolutions, stale URLs.
    pub fn update(&mut self) {
        self.backend.poll();
        while let Ok(event) = self.backend_events.try_recv() {
            self.handle_backend_event(event);
        }
        self.poll_resolutions();
        let now = SystemTime::now();
        self.refresh_stale(now);
        self.retry_awaiting(now);
    }

    /// Stop playback and join the resolver workers.
    pub fn shutdown(&mut self) {
        self.teardown_backend();
        self.pool.shutdown();
    }

    fn handle_backend_event(&mut self, event: BackendEvent) {
        if Some(event.stream()) != self.active_stream {
            tracing::trace!(stream = event.stream().0, ?event, "ignoring event for replaced stream");
            return;
        }
        match event {
            BackendEvent::Buffering { percent, .. } => self.on_buffering(percent),
            BackendEvent::DurationChanged { duration, .. } => {
                if let Some(id) = self.current {
                    if let Some(song) = self.playlist.get_mut(id) {
                        song.duration = duration;
                        self.playlist.touch(id);
                        self.events.queue_changed();
                    }
                }
            }
            BackendEvent::StateChanged { state, .. } => {
                if self.reported_state() != self.announced {
                    tracing::debug!(state = state.as_str(), "backend changed state");
                    self.player_changed();
                }
            }
            BackendEvent::AboutToFinish { .. } => self.on_track_end(),
            BackendEvent::Tags { tags, .. } => self.merge_tags(tags),
            BackendEvent::Error { message, .. } => {
                tracing::warn!(error = %message, "backend error");
                self.last_error = Some(message);
                self.player_changed();
            }
            BackendEvent::Warning { message, .. } => {
                tracing::warn!(warning = %message, "backend warning");
            }
        }
    }

    fn on_buffering(&mut self, percent: u8) {
        if percent < 100 {
            if !self.buffering_paused && self.backend.state() == PlayState::Playing {
                match self.backend.set_state(PlayState::Paused) {
                    Ok(()) => self.buffering_paused = true,
                    Err(e) => self.backend_failed("buffering pause", e),
                }
            }
        } else if self.buffering_paused {
            self.buffering_paused = false;
            if let Err(e) = self.backend.set_state(PlayState::Playing) {
                self.backend_failed("buffering resume", e);
                self.player_changed();
            }
        }
    }

    fn on_track_end(&mut self) {
        let Some(current) = self.current else {
            return;
        };
        tracing::debug!(song = %current, single = self.options.single.as_str(), "track ending");
        match self.options.single {
            SingleMode::Oneshot => {
                self.options.single = SingleMode::Off;
                self.events.options_changed();
                self.change_song(Some(current), PlayState::Playing);
            }
            SingleMode::On if !self.options.repeat => self.change_song(None, PlayState::Stopped),
            SingleMode::On => self.change_song(Some(current), PlayState::Playing),
            SingleMode::Off => {
                let next = self.select_step(true);
                self.change_to_or_stop(next, PlayState::Playing);
            }
        }
    }

    fn merge_tags(&mut self, tags: BTreeMap<String, String>) {
        let Some(id) = self.current else {
            return;
        };
        let Some(song) = self.playlist.get_mut(id) else {
            return;
        };
        for (name, value) in tags {
            let name = protocol_tag_name(&name);
            if name == "Title" {
                if song.title.is_empty() {
                    song.title = value;
                }
                continue;
            }
            song.tags.insert(name, value);
        }
        self.playlist.touch(id);
        self.events.queue_changed();
    }

    // --- song change ----------------------------------------------------------------

    /// Switch to `target` and drive the backend to `state`.
    fn change_song(&mut self, target: Option<SongId>, state: PlayState) {
        if let Some(current) = self.current {
            if self.options.consume && Some(current) != target {
                if let Some(song) = self.playlist.remove(current) {
                    if let Some(handle) = song.pending {
                        handle.cancel();
                    }
                    tracing::debug!(song = %current, "consumed");
                }
                self.play_queue.remove(current);
            }
        }

        self.current = target;
        self.awaiting = None;
        self.buffering_paused = false;

        let Some(id) = target else {
            self.teardown_backend();
            self.player_changed();
            self.events.queue_changed();
            return;
        };

        if !self.play_queue.contains(id) {
            if self.options.random {
                self.play_queue.insert_random(id, &mut self.rng);
            } else {
                self.rebuild_order();
            }
        }

        if let Err(message) = self.ensure_resolved(id) {
            tracing::warn!(song = %id, error = %message, "song not playable yet");
            self.last_error = Some(message);
            self.teardown_backend();
            self.awaiting = (state != PlayState::Stopped).then_some(state);
            self.player_changed();
            self.events.queue_changed();
            return;
        }

        let (url, headers, known) = match self.playlist.get(id) {
            Some(song) => (
                song.resolved_url.clone(),
                song.resolved_headers.clone(),
                song.duration,
            ),
            None => (String::new(), BTreeMap::new(), Duration::ZERO),
        };
        match self.load_stream(&url, &headers, known, state) {
            Ok(()) => {
                tracing::info!(song = %id, state = state.as_str(), "song changed");
                self.last_error = None;
            }
            Err(e) => self.backend_failed("song change", e),
        }
        self.player_changed();
        self.events.queue_changed();
    }

    fn load_stream(
        &mut self,
        url: &str,
        headers: &BTreeMap<String, String>,
        known_duration: Duration,
        state: PlayState,
    ) -> Result<(), BackendError> {
        if state == PlayState::Stopped {
            self.teardown_backend();
            return Ok(());
        }
        if self.backend.state() == PlayState::Playing {
            self.backend.signal_end_of_stream();
        }
        self.active_stream = None;
        let stream = self.backend.set_uri(url, headers)?;
        self.active_stream = Some(stream);
        self.backend.expect_duration(known_duration);
        self.backend.set_state(state)
    }

    fn teardown_backend(&mut self) {
        if self.backend.state() != PlayState::Stopped || self.active_stream.is_some() {
            if let Err(e) = self.backend.set_state(PlayState::Stopped) {
                tracing::warn!(error = %e, "backend stop failed");
            }
        }
        self.active_stream = None;
    }

    fn backend_failed(&mut self, action: &str, error: BackendError) {
        tracing::warn!(action, error = %error, "backend failure");
        self.last_error = Some(error.to_string());
    }

    fn player_changed(&mut self) {
        self.announced = self.reported_state();
        let playing = self.backend.state() == PlayState::Playing;
        match (playing, self.playing_since) {
            (true, None) => self.playing_since = Some(Instant::now()),
            (false, Some(since)) => {
                self.play_time += since.elapsed();
                self.playing_since = None;
            }
            _ => {}
        }
        self.events.player_changed();
    }

    // --- play order -----------------------------------------------------------------

    fn rebuild_order(&mut self) {
        self.play_queue
            .rebuild(self.playlist.ids(), false, None, &mut self.rng);
    }

    fn rebuild_play_queue(&mut self, front: Option<SongId>) {
        self.play_queue
            .rebuild(self.playlist.ids(), self.options.random, front, &mut self.rng);
    }

    /// Adjacent entry in play order, rebuilding or reshuffling on wrap as needed.
    fn select_step(&mut self, forward: bool) -> Option<SongId> {
        if self.play_queue.is_empty() {
            if !self.options.repeat || self.playlist.is_empty() {
                return None;
            }
            self.rebuild_play_queue(None);
        }
        let Some(current) = self.current else {
            return if forward {
                self.play_queue.first()
            } else {
                self.play_queue.last()
            };
        };
        let len = self.play_queue.len();
        let idx = self.play_queue.position(current).unwrap_or(0);
        if forward {
            if idx + 1 < len {
                return self.play_queue.get(idx + 1);
            }
            if !self.options.repeat {
                return None;
            }
            if self.options.random {
                self.play_queue.reshuffle_avoiding(Some(current), &mut self.rng);
            }
            self.play_queue.first()
        } else {
            if idx > 0 {
                return self.play_queue.get(idx - 1);
            }
            if !self.options.repeat {
                return None;
            }
            self.play_queue.last()
        }
    }

    fn peek_step(&self, forward: bool) -> Option<SongId> {
        let Some(current) = self.current else {
            return if forward {
                self.play_queue.first()
            } else {
                self.play_queue.last()
            };
        };
        let len = self.play_queue.len();
        if len == 0 {
            return None;
        }
        let idx = self.play_queue.position(current).unwrap_or(0);
        match (forward, idx) {
            (true, idx) if idx + 1 < len => self.play_queue.get(idx + 1),
            (true, _) if self.options.repeat => self.play_queue.first(),
            (false, idx) if idx > 0 => self.play_queue.get(idx - 1),
            (false, _) if self.options.repeat => self.play_queue.last(),
            _ => None,
        }
    }

    // --- resolution -----------------------------------------------------------------

    fn schedule_resolution(&mut self, id: SongId) {
        let Some(song) = self.playlist.get_mut(id) else {
            return;
        };
        if song.direct || song.pending.is_some() {
            return;
        }
        let resolver = Arc::clone(&self.resolver);
        let url = song.source_url.clone();
        tracing::debug!(song = %id, url = %url, "scheduling resolution");
        song.pending = Some(self.pool.submit(move || resolver.resolve(&url)));
    }

    /// Block until `id` has a fresh playable URL, resolving now if needed.
    fn ensure_resolved(&mut self, id: SongId) -> Result<(), String> {
        let now = SystemTime::now();
        let song = self.playlist.get(id).ok_or_else(|| QueueError::NoSuchSong.to_string())?;
        if song.is_fresh(now) {
            return Ok(());
        }
        if song.pending.is_none() {
            self.schedule_resolution(id);
        }
        let handle = self
            .playlist
            .get(id)
            .and_then(|song| song.pending.clone())
            .ok_or_else(|| "resolution could not be scheduled".to_string())?;
        let result = handle.wait();
        self.finish_resolution(id, result)
    }

    fn finish_resolution(
        &mut self,
        id: SongId,
        result: Result<Result<Resolved, ResolveError>, TaskError>,
    ) -> Result<(), String> {
        let now = SystemTime::now();
        let Some(song) = self.playlist.get_mut(id) else {
            return Err(QueueError::NoSuchSong.to_string());
        };
        song.pending = None;
        let outcome = result.unwrap_or_else(|e| Err(ResolveError::Aborted(e.to_string())));
        match outcome {
            Ok(resolved) => {
                song.apply_resolution(resolved, now, self.settings.refresh_interval);
                tracing::info!(song = %id, title = %song.display_title(), "song resolved");
                self.playlist.touch(id);
                self.events.queue_changed();
                Ok(())
            }
            Err(e) => {
                song.mark_resolution_failed(now, self.settings.retry_interval);
                tracing::warn!(song = %id, url = %song.source_url, error = %e, "resolution failed");
                Err(e.to_string())
            }
        }
    }

    fn poll_resolutions(&mut self) {
        let finished: Vec<_> = self
            .playlist
            .iter()
            .filter_map(|song| {
                let result = song.pending.as_ref()?.try_take()?;
                Some((song.id, result))
            })
            .collect();
        for (id, result) in finished {
            let outcome = self.finish_resolution(id, result);
            if let Err(message) = outcome {
                if self.current == Some(id) {
                    self.last_error = Some(message);
                    self.player_changed();
                }
            }
        }
    }

    fn refresh_stale(&mut self, now: SystemTime) {
        let stale: Vec<SongId> = self
            .playlist
            .iter()
            .filter(|song| song.needs_resolution(now))
            .map(|song| song.id)
            .collect();
        for id in stale {
            self.schedule_resolution(id);
        }
    }

    fn retry_awaiting(&mut self, now: SystemTime) {
        let (Some(state), Some(id)) = (self.awaiting, self.current) else {
            return;
        };
        if self.playlist.get(id).is_some_and(|song| song.is_fresh(now)) {
            tracing::info!(song = %id, "resolution succeeded, retrying playback");
            self.change_song(Some(id), state);
        }
    }

    #[cfg(test)]
    fn active_stream(&self) -> Option<StreamId> {
        self.active_stream
    }
}

/// `artist` / `ARTIST` -> `Artist`.
fn protocol_tag_name(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DirectResolver;
    use crossbeam_channel::{unbounded, Sender};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct RecordingBackend {
        log: CallLog,
        events: Sender<BackendEvent>,
        state: PlayState,
        stream: Option<StreamId>,
        next_stream: u64,
        volume: f64,
    }

    impl AudioBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        fn set_uri(
            &mut self,
            url: &str,
            _headers: &BTreeMap<String, String>,
        ) -> Result<StreamId, BackendError> {
            self.log.lock().unwrap().push(format!("uri:{url}"));
            let id = StreamId(self.next_stream);
            self.next_stream += 1;
            self.stream = Some(id);
            Ok(id)
        }

        fn signal_end_of_stream(&mut self) {
            self.log.lock().unwrap().push("eos".to_string());
            if let Some(stream) = self.stream {
                self.events.send(BackendEvent::AboutToFinish { stream }).unwrap();
            }
        }

        fn set_state(&mut self, state: PlayState) -> Result<(), BackendError> {
            self.log.lock().unwrap().push(format!("state:{}", state.as_str()));
            if state != PlayState::Stopped && self.stream.is_none() {
                return Err(BackendError::NoStream);
            }
            if state == PlayState::Stopped {
                self.stream = None;
            }
            self.state = state;
            Ok(())
        }

        fn state(&self) -> PlayState {
            self.state
        }

        fn position(&self) -> Option<Duration> {
            self.stream.map(|_| Duration::from_secs(3))
        }

        fn duration(&self) -> Option<Duration> {
            None
        }

        fn set_volume(&mut self, volume: f64) {
            self.volume = volume;
        }

        fn volume(&self) -> f64 {
            self.volume
        }
    }

    /// Fails while `fail` is set, otherwise passes the URL through.
    struct FlakyResolver {
        fail: Arc<AtomicBool>,
    }

    impl Resolver for FlakyResolver {
        fn name(&self) -> &str {
            "flaky"
        }

        fn resolve(&self, url: &str) -> Result<Resolved, ResolveError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ResolveError::Parse("scripted failure".to_string()));
            }
            Ok(Resolved {
                title: "Remote Title".to_string(),
                duration_secs: 30.0,
                download_url: format!("{url}#resolved"),
                ..Resolved::default()
            })
        }
    }

    struct Harness {
        engine: QueueEngine,
        events: Sender<BackendEvent>,
        log: CallLog,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_resolver(Arc::new(DirectResolver), EngineSettings::default())
        }

        fn with_resolver(resolver: Arc<dyn Resolver>, settings: EngineSettings) -> Self {
            let (tx, rx) = unbounded();
            let log = CallLog::default();
            let backend = RecordingBackend {
                log: Arc::clone(&log),
                events: tx.clone(),
                state: PlayState::Stopped,
                stream: None,
                next_stream: 1,
                volume: 1.0,
            };
            let pool = WorkerPool::new("test-resolve", 1).unwrap();
            let engine = QueueEngine::new(Box::new(backend), rx, resolver, pool, settings)
                .with_seed(11);
            Self {
                engine,
                events: tx,
                log,
            }
        }

        fn add(&mut self, urls: &[&str]) -> Vec<SongId> {
            urls.iter()
                .map(|url| self.engine.add_song(url, None).unwrap())
                .collect()
        }

        fn finish_track(&mut self) {
            let stream = self.engine.active_stream().unwrap();
            self.events.send(BackendEvent::AboutToFinish { stream }).unwrap();
            self.engine.update();
        }

        fn state(&self) -> PlayState {
            self.engine.status().state
        }

        fn assert_consistent(&self) {
            let mut in_playlist: Vec<SongId> = self.engine.playlist().ids().collect();
            let mut in_queue = self.engine.play_queue().ids().to_vec();
            in_playlist.sort();
            in_queue.sort();
            assert_eq!(in_playlist, in_queue);
        }
    }

    #[test]
    fn add_assigns_ids_and_keeps_play_queue_consistent() {
        let mut h = Harness::new();
        let ids = h.add(&["/tmp/a.mp3", "/tmp/b.mp3"]);
        assert_eq!(ids, vec![SongId(1), SongId(2)]);
        let inserted = h.engine.add_song("/tmp/c.mp3", Some(0)).unwrap();
        assert_eq!(inserted, SongId(3));
        assert_eq!(h.engine.play_queue().ids(), &[SongId(3), SongId(1), SongId(2)]);
        h.assert_consistent();
        assert_eq!(
            h.engine.drain_events(),
            vec![QueueEvent::QueueChanged; 3]
        );
    }

    #[test]
    fn play_from_stopped_starts_first_entry() {
        let mut h = Harness::new();
        let ids = h.add(&["/tmp/a.mp3", "/tmp/b.mp3"]);
        h.engine.play();
        let status = h.engine.status();
        assert_eq!(status.state, PlayState::Playing);
        assert_eq!(status.song, Some((0, ids[0])));
        assert_eq!(status.next, Some((1, ids[1])));
        assert_eq!(
            h.log.lock().unwrap().as_slice(),
            &["uri:file:///tmp/a.mp3".to_string(), "state:play".to_string()]
        );
    }

    #[test]
    fn pause_and_resume_respect_preconditions() {
        let mut h = Harness::new();
        h.add(&["/tmp/a.mp3"]);
        h.engine.resume();
        assert_eq!(h.state(), PlayState::Stopped);
        h.engine.play();
        h.engine.pause();
        assert_eq!(h.state(), PlayState::Paused);
        h.engine.pause();
        assert_eq!(h.state(), PlayState::Paused);
        h.engine.play();
        assert_eq!(h.state(), PlayState::Playing);
        h.engine.stop();
        assert_eq!(h.state(), PlayState::Stopped);
        assert_eq!(h.engine.status().song, None);
    }

    #[test]
    fn repeat_wraps_after_last_song() {
        let mut h = Harness::new();
        let ids = h.add(&["/a.mp3", "/b.mp3", "/c.mp3"]);
        h.engine.set_repeat(true);
        let mut visited = Vec::new();
        for _ in 0..4 {
            h.engine.next();
            visited.push(h.engine.current().unwrap());
        }
        assert_eq!(visited, vec![ids[0], ids[1], ids[2], ids[0]]);
        h.engine.previous();
        assert_eq!(h.engine.current(), Some(ids[2]));
    }

    #[test]
    fn next_past_the_end_without_repeat_stops() {
        let mut h = Harness::new();
        h.add(&["/a.mp3", "/b.mp3"]);
        h.engine.play_position(1).unwrap();
        h.engine.next();
        assert_eq!(h.engine.current(), None);
        assert_eq!(h.state(), PlayState::Stopped);
    }

    #[test]
    fn natural_end_advances_to_next_song() {
        let mut h = Harness::new();
        let ids = h.add(&["/a.mp3", "/b.mp3"]);
        h.engine.play();
        h.finish_track();
        assert_eq!(h.engine.current(), Some(ids[1]));
        assert_eq!(h.state(), PlayState::Playing);
    }

    #[test]
    fn live_swap_end_of_stream_is_not_a_track_end() {
        let mut h = Harness::new();
        let ids = h.add(&["/a.mp3", "/b.mp3", "/c.mp3"]);
        h.engine.play();
        h.engine.next();
        {
            let log = h.log.lock().unwrap();
            let eos = log.iter().position(|c| c == "eos").unwrap();
            let swap = log.iter().position(|c| c == "uri:file:///b.mp3").unwrap();
            assert!(eos < swap);
        }
        // The artificial end-of-stream for a.mp3 is still queued; it must not advance again.
        h.engine.update();
        assert_eq!(h.engine.current(), Some(ids[1]));
    }

    #[test]
    fn single_without_repeat_stops_at_track_end() {
        let mut h = Harness::new();
        h.add(&["/a.mp3", "/b.mp3"]);
        h.engine.set_single(SingleMode::On);
        h.engine.play();
        h.finish_track();
        assert_eq!(h.state(), PlayState::Stopped);
        assert_eq!(h.engine.current(), None);
    }

    #[test]
    fn single_with_repeat_replays_current_song() {
        let mut h = Harness::new();
        let ids = h.add(&["/a.mp3", "/b.mp3"]);
        h.engine.set_single(SingleMode::On);
        h.engine.set_repeat(true);
        h.engine.play();
        h.finish_track();
        h.finish_track();
        assert_eq!(h.engine.current(), Some(ids[0]));
        assert_eq!(h.state(), PlayState::Playing);
    }

    #[test]
    fn oneshot_repeats_once_then_behaves_as_off() {
        let mut h = Harness::new();
        let ids = h.add(&["/a.mp3", "/b.mp3"]);
        h.engine.play();
        h.engine.set_single(SingleMode::Oneshot);
        h.engine.drain_events();

        h.finish_track();
        assert_eq!(h.engine.current(), Some(ids[0]));
        assert_eq!(h.engine.options().single, SingleMode::Off);
        assert!(h.engine.drain_events().contains(&QueueEvent::OptionsChanged));

        h.finish_track();
        assert_eq!(h.engine.current(), Some(ids[1]));
    }

    #[test]
    fn oneshot_replays_even_with_repeat_on() {
        let mut h = Harness::new();
        let ids = h.add(&["/a.mp3", "/b.mp3"]);
        h.engine.set_repeat(true);
        h.engine.set_single(SingleMode::Oneshot);
        h.engine.play_position(1).unwrap();
        h.finish_track();
        assert_eq!(h.engine.current(), Some(ids[1]));
        h.finish_track();
        assert_eq!(h.engine.current(), Some(ids[0]));
    }

    #[test]
    fn consume_removes_finished_song_exactly_once() {
        let mut h = Harness::new();
        let ids = h.add(&["/a.mp3", "/b.mp3", "/c.mp3"]);
        h.engine.set_consume(true);
        h.engine.play();
        h.finish_track();

        assert_eq!(h.engine.current(), Some(ids[1]));
        assert!(h.engine.playlist().get(ids[0]).is_none());
        assert!(!h.engine.play_queue().contains(ids[0]));
        assert_eq!(h.engine.playlist().len(), 2);
        h.assert_consistent();

        // The swap's artificial end-of-stream must not consume b.mp3.
        h.engine.update();
        assert_eq!(h.engine.playlist().len(), 2);
    }

    #[test]
    fn removing_current_song_moves_to_follower() {
        let mut h = Harness::new();
        let ids = h.add(&["/a.mp3", "/b.mp3", "/c.mp3"]);
        h.engine.play_position(1).unwrap();
        h.engine.pause();
        h.engine.remove_song(SongRef::Id(ids[1])).unwrap();
        assert_eq!(h.engine.current(), Some(ids[2]));
        assert_eq!(h.state(), PlayState::Paused);
        h.assert_consistent();

        h.engine.remove_song(SongRef::Position(1)).unwrap();
        assert_eq!(h.engine.current(), None);
        assert_eq!(h.state(), PlayState::Stopped);
        assert_eq!(
            h.engine.remove_song(SongRef::Id(ids[1])),
            Err(QueueError::NoSuchSong)
        );
    }

    #[test]
    fn removing_last_song_with_repeat_wraps_to_first() {
        let mut h = Harness::new();
        let ids = h.add(&["/a.mp3", "/b.mp3"]);
        h.engine.set_repeat(true);
        h.engine.play_position(1).unwrap();
        h.engine.remove_song(SongRef::Search("/b.mp3".to_string())).unwrap();
        assert_eq!(h.engine.current(), Some(ids[0]));
        assert_eq!(h.state(), PlayState::Playing);
    }

    #[test]
    fn remove_range_and_clear() {
        let mut h = Harness::new();
        h.add(&["/a.mp3", "/b.mp3", "/c.mp3", "/d.mp3"]);
        h.engine.remove_range(1..3).unwrap();
        assert_eq!(h.engine.playlist().len(), 2);
        assert_eq!(h.engine.remove_range(1..3), Err(QueueError::BadRange));
        h.assert_consistent();

        h.engine.play();
        h.engine.remove_all();
        assert!(h.engine.playlist().is_empty());
        assert!(h.engine.play_queue().is_empty());
        assert_eq!(h.state(), PlayState::Stopped);
        assert_eq!(h.engine.add_song("/e.mp3", None), Ok(SongId(5)));
    }

    #[test]
    fn random_toggle_keeps_the_same_songs() {
        let mut h = Harness::new();
        h.add(&["/a", "/b", "/c", "/d", "/e", "/f"]);
        let mut before = h.engine.play_queue().ids().to_vec();
        h.engine.set_random(false);
        h.engine.set_random(true);
        let mut after = h.engine.play_queue().ids().to_vec();
        before.sort();
        after.sort();
        assert_eq!(before, after);

        h.engine.add_song("/g", None).unwrap();
        h.assert_consistent();
        h.engine.set_random(false);
        let in_order: Vec<SongId> = h.engine.playlist().ids().collect();
        assert_eq!(h.engine.play_queue().ids(), in_order.as_slice());
    }

    #[test]
    fn move_keeps_order_in_sync() {
        let mut h = Harness::new();
        let ids = h.add(&["/a", "/b", "/c"]);
        h.engine.move_id(ids[2], 0).unwrap();
        assert_eq!(h.engine.play_queue().ids(), &[ids[2], ids[0], ids[1]]);
        assert_eq!(h.engine.move_id(SongId(99), 0), Err(QueueError::NoSuchSong));
    }

    #[test]
    fn volume_is_clamped_and_reported_in_percent() {
        let mut h = Harness::new();
        h.engine.drain_events();
        h.engine.set_volume(0.5);
        assert_eq!(h.engine.status().volume, 50);
        h.engine.set_volume(3.0);
        assert_eq!(h.engine.volume_percent(), 100);
        assert_eq!(
            h.engine.drain_events(),
            vec![QueueEvent::VolumeChanged, QueueEvent::VolumeChanged]
        );
    }

    #[test]
    fn buffering_pauses_backend_but_reports_playing() {
        let mut h = Harness::new();
        h.add(&["/a.mp3"]);
        h.engine.play();
        let stream = h.engine.active_stream().unwrap();
        h.events.send(BackendEvent::Buffering { stream, percent: 40 }).unwrap();
        h.engine.update();
        assert_eq!(h.state(), PlayState::Playing);
        assert!(h.log.lock().unwrap().contains(&"state:pause".to_string()));

        h.events.send(BackendEvent::Buffering { stream, percent: 100 }).unwrap();
        h.engine.update();
        assert_eq!(h.log.lock().unwrap().last().map(String::as_str), Some("state:play"));
    }

    #[test]
    fn tags_and_errors_from_backend() {
        let mut h = Harness::new();
        let ids = h.add(&["/a.mp3"]);
        h.engine.play();
        let stream = h.engine.active_stream().unwrap();
        let tags = BTreeMap::from([
            ("title".to_string(), "Live Title".to_string()),
            ("ARTIST".to_string(), "Band".to_string()),
        ]);
        h.events.send(BackendEvent::Tags { stream, tags }).unwrap();
        h.events
            .send(BackendEvent::Error { stream, message: "decoder died".to_string() })
            .unwrap();
        // Events for a stream that is no longer active are dropped.
        h.events
            .send(BackendEvent::Error { stream: StreamId(999), message: "stale".to_string() })
            .unwrap();
        h.engine.update();

        let song = h.engine.playlist().get(ids[0]).unwrap();
        assert_eq!(song.title, "Live Title");
        assert_eq!(song.tags.get("Artist").map(String::as_str), Some("Band"));
        assert_eq!(h.engine.last_error(), Some("decoder died"));
        h.engine.clear_error();
        assert_eq!(h.engine.status().error, None);
    }

    #[test]
    fn remote_song_is_resolved_before_playback() {
        let fail = Arc::new(AtomicBool::new(false));
        let mut h = Harness::with_resolver(
            Arc::new(FlakyResolver { fail: Arc::clone(&fail) }),
            EngineSettings::default(),
        );
        let id = h.engine.add_song("https://video.example/watch?v=1", None).unwrap();
        h.engine.play_id(id).unwrap();
        let song = h.engine.playlist().get(id).unwrap();
        assert_eq!(song.title, "Remote Title");
        assert_eq!(song.duration, Duration::from_secs(30));
        assert!(h
            .log
            .lock()
            .unwrap()
            .contains(&"uri:https://video.example/watch?v=1#resolved".to_string()));
    }

    #[test]
    fn failed_resolution_sets_error_and_retries() {
        let fail = Arc::new(AtomicBool::new(true));
        let settings = EngineSettings {
            retry_interval: Duration::ZERO,
            ..EngineSettings::default()
        };
        let mut h =
            Harness::with_resolver(Arc::new(FlakyResolver { fail: Arc::clone(&fail) }), settings);
        let id = h.engine.add_song("https://video.example/watch?v=2", None).unwrap();
        h.engine.play_id(id).unwrap();
        assert!(h.engine.last_error().is_some());
        assert!(h.engine.active_stream().is_none());
        assert_eq!(h.engine.current(), Some(id));
        let status = h.engine.status();
        assert_eq!(status.state, PlayState::Stopped);
        assert_eq!(status.song, Some((0, id)));
        assert!(status.error.is_some());

        fail.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(5);
        while h.engine.active_stream().is_none() && Instant::now() < deadline {
            h.engine.update();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(h.engine.active_stream().is_some());
        assert_eq!(h.engine.last_error(), None);
        assert_eq!(h.state(), PlayState::Playing);
        assert_eq!(h.engine.status().state, PlayState::Playing);
    }

    #[test]
    fn simulated_remote_stream_advances_at_known_duration() {
        let (tx, rx) = unbounded();
        let mut engine = QueueEngine::new(
            Box::new(crate::backend::SimulatedBackend::new(tx)),
            rx,
            Arc::new(DirectResolver),
            WorkerPool::new("test-resolve", 1).unwrap(),
            EngineSettings::default(),
        );
        let first = engine.add_song("https://radio.example/one.mp3", None).unwrap();
        let second = engine.add_song("https://radio.example/two.mp3", None).unwrap();
        engine.seed_metadata(
            first,
            SongSeed {
                duration: Duration::from_millis(30),
                ..SongSeed::default()
            },
        );
        engine.play_id(first).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.current() != Some(second) && Instant::now() < deadline {
            engine.update();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(engine.current(), Some(second));
        assert_eq!(engine.status().state, PlayState::Playing);
    }

    #[test]
    fn stats_count_songs_and_tags() {
        let mut h = Harness::new();
        let ids = h.add(&["/a.mp3", "/b.mp3"]);
        h.engine.seed_metadata(
            ids[0],
            SongSeed {
                duration: Duration::from_secs(10),
                tags: BTreeMap::from([("Artist".to_string(), "X".to_string())]),
                ..SongSeed::default()
            },
        );
        let stats = h.engine.stats();
        assert_eq!(stats.songs, 2);
        assert_eq!(stats.artists, 1);
        assert_eq!(stats.albums, 0);
        assert_eq!(stats.db_playtime, Duration::from_secs(10));
    }
}
