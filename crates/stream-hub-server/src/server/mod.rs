//! MPD protocol server.
//!
//! One event-loop thread owns the listener, every session and the queue engine. Each tick it
//! accepts pending connections, handles bytes forwarded by the per-client reader threads,
//! lets the engine do its housekeeping and fans engine events out to idle clients. Replies
//! are queued to per-client writer threads; the loop itself only blocks waiting for input.

pub mod listener;
pub mod session;

use std::collections::HashMap;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use mpd_proto::{command_table, tokenize, Ack, AckCode, IdleFlags, Permissions, LIST_OK, OK};

use crate::commands::{Context, Registry, Reply};
use crate::queue_engine::QueueEngine;
use crate::stored_playlists::PlaylistStore;
use listener::{spawn_reader, spawn_writer, Inbound};
use session::{ClientSession, CommandList};

#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Permissions granted to every new connection.
    pub default_permissions: Permissions,
    pub max_clients: usize,
    /// Unsent bytes a client may accumulate before it is disconnected.
    pub max_output_buffer: usize,
    /// Longest wait for client input before the engine gets its housekeeping call.
    pub tick: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            default_permissions: Permissions::ALL,
            max_clients: 64,
            max_output_buffer: 8 * 1024 * 1024,
            tick: Duration::from_millis(50),
        }
    }
}

pub struct MpdServer {
    listener: TcpListener,
    engine: QueueEngine,
    store: PlaylistStore,
    registry: Registry,
    settings: ServerSettings,
    sessions: HashMap<u64, ClientSession>,
    inbound_tx: Sender<Inbound>,
    inbound_rx: Receiver<Inbound>,
    next_client: u64,
    shutdown: Arc<AtomicBool>,
    /// Idle categories raised by handlers rather than the engine.
    changed: IdleFlags,
}

impl MpdServer {
    pub fn bind(
        addr: SocketAddr,
        engine: QueueEngine,
        store: PlaylistStore,
        settings: ServerSettings,
        shutdown: Arc<AtomicBool>,
    ) -> anyhow::Result<Self> {
        let listener =
            TcpListener::bind(addr).with_context(|| format!("bind mpd listener on {addr}"))?;
        listener
            .set_nonblocking(true)
            .context("set listener nonblocking")?;
        let (inbound_tx, inbound_rx) = crossbeam_channel::unbounded();
        tracing::info!(
            addr = %listener.local_addr().unwrap_or(addr),
            max_clients = settings.max_clients,
            "mpd server listening"
        );
        Ok(Self {
            listener,
            engine,
            store,
            registry: Registry::new(),
            settings,
            sessions: HashMap::new(),
            inbound_tx,
            inbound_rx,
            next_client: 1,
            shutdown,
            changed: IdleFlags::NONE,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn client_count(&self) -> usize {
        self.sessions.len()
    }

    /// Serve until the shutdown flag is set, then close every session and stop the engine.
    pub fn run(mut self) -> anyhow::Result<()> {
        while !self.shutdown.load(Ordering::SeqCst) {
            self.tick();
        }
        tracing::info!(clients = self.sessions.len(), "mpd server stopping");
        for (_, mut session) in self.sessions.drain() {
            session.close();
        }
        self.engine.shutdown();
        Ok(())
    }

    /// One loop iteration.
    pub fn tick(&mut self) {
        self.accept_connections();
        match self.inbound_rx.recv_timeout(self.settings.tick) {
            Ok(message) => self.handle_inbound(message),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("inbound channel disconnected");
            }
        }
        while let Ok(message) = self.inbound_rx.try_recv() {
            self.handle_inbound(message);
        }
        self.engine.update();
        self.fan_out();
        self.reap_closed();
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.on_accept(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn on_accept(&mut self, mut stream: TcpStream, peer: SocketAddr) {
        if self.sessions.len() >= self.settings.max_clients {
            tracing::warn!(%peer, max = self.settings.max_clients, "rejecting client: too many connections");
            let ack = Ack::new(AckCode::Unknown, "", "too many connections");
            let _ = stream.write_all(ack.to_line().as_bytes());
            let _ = stream.shutdown(std::net::Shutdown::Both);
            return;
        }
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!(%peer, error = %e, "could not make client socket blocking");
            return;
        }
        let (read_half, hangup) = match (stream.try_clone(), stream.try_clone()) {
            (Ok(read_half), Ok(hangup)) => (read_half, hangup),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(%peer, error = %e, "failed to clone client socket");
                return;
            }
        };
        let client = self.next_client;
        self.next_client += 1;
        if let Err(e) = spawn_reader(client, read_half, self.inbound_tx.clone()) {
            tracing::error!(%peer, error = %e, "failed to start reader thread");
            return;
        }
        let writer = match spawn_writer(client, stream, self.settings.max_output_buffer) {
            Ok(writer) => writer.with_socket(hangup),
            Err(e) => {
                tracing::error!(%peer, error = %e, "failed to start writer thread");
                let _ = hangup.shutdown(std::net::Shutdown::Both);
                return;
            }
        };

        let mut session = ClientSession::new(
            client,
            Some(peer),
            Box::new(writer),
            self.settings.default_permissions,
        );
        session.send(&mpd_proto::greeting());
        tracing::info!(client, %peer, "client connected");
        self.sessions.insert(client, session);
    }

    fn handle_inbound(&mut self, message: Inbound) {
        match message {
            Inbound::Data { client, bytes } => {
                let Some(mut session) = self.sessions.remove(&client) else {
                    return;
                };
                session.buffer.extend(&bytes);
                while !session.is_closing() {
                    let Some(line) = session.buffer.next_line() else {
                        break;
                    };
                    self.process_line(&mut session, &line);
                }
                if session.buffer.overflowed() {
                    tracing::warn!(client, "line too long, closing");
                    session.close();
                }
                self.sessions.insert(client, session);
            }
            Inbound::Closed { client } => {
                if let Some(mut session) = self.sessions.remove(&client) {
                    session.close();
                    tracing::info!(client, peer = ?session.peer, "client disconnected");
                }
            }
        }
    }

    fn process_line(&mut self, session: &mut ClientSession, line: &str) {
        let tokens = match tokenize(line) {
            Ok(tokens) => tokens,
            Err(e) => {
                session.command_list = None;
                session.send(&Ack::new(AckCode::Arg, "", e.to_string()).to_line());
                return;
            }
        };
        let verb = tokens.first().map(String::as_str).unwrap_or("");

        if session.is_idle() {
            if verb == "noidle" {
                self.execute(session, &tokens);
            } else {
                tracing::warn!(client = session.id, command = verb, "command while idle, closing");
                session.close();
            }
            return;
        }

        if let Some(list) = session.command_list.as_mut() {
            if verb == "command_list_end" {
                if let Some(list) = session.command_list.take() {
                    self.replay(session, list);
                }
            } else {
                list.lines.push(tokens);
            }
            return;
        }

        self.execute(session, &tokens);
    }

    fn dispatch(
        &mut self,
        session: &mut ClientSession,
        tokens: &[String],
        out: &mut String,
    ) -> Result<Reply, Ack> {
        let mut ctx = Context {
            engine: &mut self.engine,
            session,
            store: &self.store,
            shutdown: &self.shutdown,
            changed: &mut self.changed,
            out,
        };
        self.registry.dispatch(&mut ctx, tokens)
    }

    fn execute(&mut self, session: &mut ClientSession, tokens: &[String]) {
        let mut out = String::new();
        match self.dispatch(session, tokens, &mut out) {
            Ok(Reply::Ok) => {
                out.push_str(OK);
                session.send(&out);
            }
            Ok(Reply::Silent) => session.send(&out),
            Ok(Reply::Close) => {
                session.send(&out);
                session.close();
            }
            Err(ack) => {
                tracing::debug!(client = session.id, %ack, "command failed");
                out.push_str(&ack.to_line());
                session.send(&out);
            }
        }
    }

    /// Run a finished command list; the first failure ends it and is reported with its index.
    fn replay(&mut self, session: &mut ClientSession, list: CommandList) {
        let mut out = String::new();
        for (index, tokens) in list.lines.iter().enumerate() {
            let verb = tokens.first().map(String::as_str).unwrap_or("");
            let result = match command_table::find(verb) {
                Some(spec) if !spec.allowed_in_list => Err(Ack::arg(
                    verb,
                    format!("{verb} not allowed in command list"),
                )),
                _ => self.dispatch(session, tokens, &mut out),
            };
            match result {
                Ok(Reply::Close) => {
                    session.send(&out);
                    session.close();
                    return;
                }
                Ok(_) => {
                    if list.verbose {
                        out.push_str(LIST_OK);
                    }
                }
                Err(ack) => {
                    tracing::debug!(client = session.id, index, %ack, "command list aborted");
                    out.push_str(&ack.at_index(index).to_line());
                    session.send(&out);
                    return;
                }
            }
        }
        out.push_str(OK);
        session.send(&out);
    }

    fn fan_out(&mut self) {
        let mut changed = std::mem::replace(&mut self.changed, IdleFlags::NONE);
        for event in self.engine.drain_events() {
            changed |= event.idle_flag();
        }
        if changed.is_empty() {
            return;
        }
        tracing::debug!(
            changed = %changed.names().collect::<Vec<_>>().join(","),
            "fan out"
        );
        for session in self.sessions.values_mut() {
            session.raise(changed);
            if let Some(mut delivery) = session.take_idle_delivery() {
                delivery.push_str(OK);
                session.send(&delivery);
            }
        }
    }

    fn reap_closed(&mut self) {
        let closed: Vec<u64> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_closing())
            .map(|(id, _)| *id)
            .collect();
        for client in closed {
            if let Some(mut session) = self.sessions.remove(&client) {
                session.close();
                tracing::info!(client, peer = ?session.peer, "client closed");
            }
        }
    }
}
