//! Audio backend abstraction.
//!
//! The engine drives a backend through [`AudioBackend`] and receives asynchronous signals
//! as [`BackendEvent`]s on a channel it drains once per tick. Every event names the stream
//! it belongs to so signals from a replaced stream can be told apart from the live one.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::local_tags;
use crate::song::local_path_from_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

impl PlayState {
    /// Protocol spelling used by `status`.
    pub fn as_str(self) -> &'static str {
        match self {
            PlayState::Stopped => "stop",
            PlayState::Paused => "pause",
            PlayState::Playing => "play",
        }
    }
}

/// Identifies one `set_uri` call on a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    Buffering { stream: StreamId, percent: u8 },
    DurationChanged { stream: StreamId, duration: Duration },
    StateChanged { stream: StreamId, state: PlayState },
    /// The stream is about to end; also sent for a stream replaced mid-play.
    AboutToFinish { stream: StreamId },
    Tags { stream: StreamId, tags: BTreeMap<String, String> },
    Error { stream: StreamId, message: String },
    Warning { stream: StreamId, message: String },
}

impl BackendEvent {
    pub fn stream(&self) -> StreamId {
        match self {
            BackendEvent::Buffering { stream, .. }
            | BackendEvent::DurationChanged { stream, .. }
            | BackendEvent::StateChanged { stream, .. }
            | BackendEvent::AboutToFinish { stream }
            | BackendEvent::Tags { stream, .. }
            | BackendEvent::Error { stream, .. }
            | BackendEvent::Warning { stream, .. } => *stream,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("no stream loaded")]
    NoStream,
    #[error("unsupported url: {0}")]
    UnsupportedUrl(String),
    #[error("state change failed: {0}")]
    StateChange(String),
}

pub trait AudioBackend: Send {
    fn name(&self) -> &str;

    /// Load a new stream and return its id. The play state is kept.
    fn set_uri(
        &mut self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<StreamId, BackendError>;

    /// Duration already known from song metadata for the loaded stream. Backends that
    /// measure the stream themselves can ignore it.
    fn expect_duration(&mut self, _duration: Duration) {}

    /// Signal end-of-stream on the current stream ahead of a live swap.
    fn signal_end_of_stream(&mut self);

    fn set_state(&mut self, state: PlayState) -> Result<(), BackendError>;
    fn state(&self) -> PlayState;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;

    /// Linear volume in `0.0..=1.0`.
    fn set_volume(&mut self, volume: f64);
    fn volume(&self) -> f64;

    /// Periodic housekeeping from the event loop.
    fn poll(&mut self) {}
}

#[derive(Debug)]
struct LoadedStream {
    id: StreamId,
    duration: Option<Duration>,
    played: Duration,
    resumed_at: Option<Instant>,
    finish_sent: bool,
}

impl LoadedStream {
    fn position(&self) -> Duration {
        let running = self.resumed_at.map(|at| at.elapsed()).unwrap_or_default();
        let position = self.played + running;
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn freeze(&mut self) {
        if let Some(at) = self.resumed_at.take() {
            self.played += at.elapsed();
        }
    }
}

/// Backend without audio output. Tracks state and a wall-clock position; when
/// `finishes_tracks` is set it reports natural end-of-track once the position reaches the
/// known duration.
pub struct SimulatedBackend {
    name: String,
    events: Sender<BackendEvent>,
    finishes_tracks: bool,
    state: PlayState,
    volume: f64,
    stream: Option<LoadedStream>,
    next_stream: u64,
}

impl SimulatedBackend {
    pub fn new(events: Sender<BackendEvent>) -> Self {
        Self {
            name: "simulated".to_string(),
            events,
            finishes_tracks: true,
            state: PlayState::Stopped,
            volume: 1.0,
            stream: None,
            next_stream: 1,
        }
    }

    /// Variant that never reaches the end of a track.
    pub fn null(events: Sender<BackendEvent>) -> Self {
        Self {
            name: "null".to_string(),
            finishes_tracks: false,
            ..Self::new(events)
        }
    }

    fn emit(&self, event: BackendEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(backend = %self.name, "backend event receiver gone");
        }
    }
}

impl AudioBackend for SimulatedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_uri(
        &mut self,
        url: &str,
        _headers: &BTreeMap<String, String>,
    ) -> Result<StreamId, BackendError> {
        if url.is_empty() {
            return Err(BackendError::UnsupportedUrl(url.to_string()));
        }
        let id = StreamId(self.next_stream);
        self.next_stream += 1;

        let duration = local_path_from_url(url).and_then(|path| local_tags::probe_duration(&path));
        let resumed_at = (self.state == PlayState::Playing).then(Instant::now);
        self.stream = Some(LoadedStream {
            id,
            duration,
            played: Duration::ZERO,
            resumed_at,
            finish_sent: false,
        });
        tracing::debug!(backend = %self.name, stream = id.0, url, "stream loaded");
        if let Some(duration) = duration {
            self.emit(BackendEvent::DurationChanged { stream: id, duration });
        }
        Ok(id)
    }

    fn expect_duration(&mut self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        if let Some(stream) = self.stream.as_mut() {
            stream.duration.get_or_insert(duration);
        }
    }

    fn signal_end_of_stream(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            stream.freeze();
            stream.finish_sent = true;
            let id = stream.id;
            self.emit(BackendEvent::AboutToFinish { stream: id });
        }
    }

    fn set_state(&mut self, state: PlayState) -> Result<(), BackendError> {
        match state {
            PlayState::Stopped => {
                self.stream = None;
            }
            PlayState::Paused => {
                let stream = self.stream.as_mut().ok_or(BackendError::NoStream)?;
                stream.freeze();
            }
            PlayState::Playing => {
                let stream = self.stream.as_mut().ok_or(BackendError::NoStream)?;
                if stream.resumed_at.is_none() {
                    stream.resumed_at = Some(Instant::now());
                }
            }
        }
        if self.state != state {
            self.state = state;
            let stream = self.stream.as_ref().map(|s| s.id).unwrap_or(StreamId(0));
            self.emit(BackendEvent::StateChanged { stream, state });
        }
        Ok(())
    }

    fn state(&self) -> PlayState {
        self.state
    }

    fn position(&self) -> Option<Duration> {
        self.stream.as_ref().map(LoadedStream::position)
    }

    fn duration(&self) -> Option<Duration> {
        self.stream.as_ref().and_then(|s| s.duration)
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn poll(&mut self) {
        if !self.finishes_tracks || self.state != PlayState::Playing {
            return;
        }
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        let Some(duration) = stream.duration else {
            return;
        };
        if !stream.finish_sent && stream.position() >= duration {
            stream.finish_sent = true;
            let id = stream.id;
            self.emit(BackendEvent::AboutToFinish { stream: id });
        }
    }
}
