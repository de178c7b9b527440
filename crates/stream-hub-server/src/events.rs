//! Change events produced by the queue engine.
//!
//! The engine appends to an [`EventRelay`]; the server drains it once per tick and turns
//! each event into an idle category for waiting clients.

use std::collections::VecDeque;

use mpd_proto::IdleFlags;

/// Engine-side change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    StateChanged,
    QueueChanged,
    VolumeChanged,
    OptionsChanged,
}

impl QueueEvent {
    /// Idle category raised by this event.
    pub fn idle_flag(self) -> IdleFlags {
        match self {
            QueueEvent::StateChanged => IdleFlags::PLAYER,
            QueueEvent::QueueChanged => IdleFlags::PLAYLIST,
            QueueEvent::VolumeChanged => IdleFlags::MIXER,
            QueueEvent::OptionsChanged => IdleFlags::OPTIONS,
        }
    }
}

/// FIFO of pending events, in production order.
#[derive(Debug, Default)]
pub struct EventRelay {
    pending: VecDeque<QueueEvent>,
}

impl EventRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify that playback state or the current song changed.
    pub fn player_changed(&mut self) {
        self.pending.push_back(QueueEvent::StateChanged);
    }

    /// Notify that queue contents changed.
    pub fn queue_changed(&mut self) {
        self.pending.push_back(QueueEvent::QueueChanged);
    }

    pub fn volume_changed(&mut self) {
        self.pending.push_back(QueueEvent::VolumeChanged);
    }

    pub fn options_changed(&mut self) {
        self.pending.push_back(QueueEvent::OptionsChanged);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every pending event, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = QueueEvent> + '_ {
        self.pending.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_production_order() {
        let mut relay = EventRelay::new();
        relay.queue_changed();
        relay.player_changed();
        relay.volume_changed();
        let drained: Vec<QueueEvent> = relay.drain().collect();
        assert_eq!(
            drained,
            vec![
                QueueEvent::QueueChanged,
                QueueEvent::StateChanged,
                QueueEvent::VolumeChanged
            ]
        );
        assert!(relay.is_empty());
    }

    #[test]
    fn events_map_to_idle_categories() {
        assert_eq!(QueueEvent::StateChanged.idle_flag(), IdleFlags::PLAYER);
        assert_eq!(QueueEvent::QueueChanged.idle_flag(), IdleFlags::PLAYLIST);
        assert_eq!(QueueEvent::VolumeChanged.idle_flag(), IdleFlags::MIXER);
        assert_eq!(QueueEvent::OptionsChanged.idle_flag(), IdleFlags::OPTIONS);
    }
}
