//! Server startup and wiring.
//!
//! Resolves configuration, builds the engine with its backend and resolver, and runs the
//! protocol server until shutdown is requested.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;

use crate::backend::{AudioBackend, SimulatedBackend};
use crate::config::{self, BackendKind, ServerConfig};
use crate::queue_engine::{EngineSettings, QueueEngine};
use crate::resolver::resolver_for_command;
use crate::server::{MpdServer, ServerSettings};
use crate::stored_playlists::PlaylistStore;
use crate::worker_pool::WorkerPool;
use crate::zeroconf;

/// Command-line overrides.
#[derive(Debug, Default, Clone)]
pub struct StartupOptions {
    pub config: Option<PathBuf>,
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
}

/// Load config, start serving and block until `shutdown` is set.
pub fn run(options: StartupOptions, shutdown: Arc<AtomicBool>) -> Result<()> {
    let (cfg, source) = ServerConfig::discover(options.config.as_deref())?;
    match source.as_ref() {
        Some(path) => tracing::info!(path = %path.display(), "loaded config"),
        None => tracing::info!("no config file found, using defaults"),
    }
    if !config::mpd_enabled_from_config(&cfg) {
        tracing::warn!("mpd listener disabled in config; nothing to serve");
        return Ok(());
    }
    let bind = config::bind_from_config(&cfg, options.bind, options.port)?;
    let server = build_server(&cfg, bind, shutdown)?;

    let advertiser = match config::zeroconf_name_from_config(&cfg) {
        Some(name) => {
            let local = server.local_addr().context("read listener address")?;
            zeroconf::advertise(&name, local)
        }
        None => None,
    };

    let result = server.run();
    if let Some(advertiser) = advertiser {
        advertiser.shutdown();
    }
    tracing::info!("stream-hub stopped");
    result
}

/// Engine plus listener, ready to [`MpdServer::run`].
pub fn build_server(
    cfg: &ServerConfig,
    bind: SocketAddr,
    shutdown: Arc<AtomicBool>,
) -> Result<MpdServer> {
    let engine = build_engine(cfg)?;
    let store = PlaylistStore::new(config::playlists_dir_from_config(cfg));
    let settings = ServerSettings {
        default_permissions: config::default_permissions_from_config(cfg)?,
        max_clients: config::max_clients_from_config(cfg),
        max_output_buffer: config::max_output_buffer_from_config(cfg),
        tick: config::tick_from_config(cfg),
    };
    tracing::info!(
        bind = %bind,
        playlists = %store.dir().display(),
        backend = engine.backend_name(),
        "starting stream-hub"
    );
    MpdServer::bind(bind, engine, store, settings, shutdown)
}

pub fn build_engine(cfg: &ServerConfig) -> Result<QueueEngine> {
    let (events_tx, events_rx) = unbounded();
    let backend: Box<dyn AudioBackend> = match config::backend_from_config(cfg)? {
        BackendKind::Simulated => Box::new(SimulatedBackend::new(events_tx)),
        BackendKind::Null => Box::new(SimulatedBackend::null(events_tx)),
    };
    let command = config::resolver_command_from_config(cfg);
    let resolver = resolver_for_command(&command);
    let workers = config::resolver_workers_from_config(cfg);
    let pool = WorkerPool::new("resolve", workers).context("start resolver workers")?;
    let (refresh_interval, retry_interval, local_refresh_interval) =
        config::resolver_intervals_from_config(cfg);
    tracing::info!(
        resolver = resolver.name(),
        workers,
        refresh_secs = refresh_interval.as_secs(),
        "resolver configured"
    );
    let settings = EngineSettings {
        refresh_interval,
        retry_interval,
        local_refresh_interval,
        initial_volume: config::initial_volume_from_config(cfg),
    };
    Ok(QueueEngine::new(backend, events_rx, resolver, pool, settings))
}
