//! Stream Hub: an MPD-compatible daemon whose queue plays local files and resolved
//! web streams.
//!
//! The crate is split into the playback queue engine (`queue_engine` and the types it
//! owns) and the protocol server (`server`, `commands`) that drives it.

pub mod backend;
pub mod commands;
pub mod config;
pub mod events;
pub mod local_tags;
pub mod play_queue;
pub mod playlist;
pub mod queue_engine;
pub mod resolver;
pub mod server;
pub mod song;
pub mod startup;
pub mod stored_playlists;
pub mod worker_pool;
pub mod zeroconf;
