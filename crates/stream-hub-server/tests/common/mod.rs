#![allow(dead_code)]
//! Test harness utilities: a server on an ephemeral port and a line-oriented client.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use stream_hub_server::config::ServerConfig;
use stream_hub_server::startup;

/// Server running the null backend and the pass-through resolver on a background thread.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<anyhow::Result<()>>>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub fn start() -> Self {
        Self::start_with("")
    }

    /// Start with extra TOML appended to the base config (e.g. an `[mpd]` section).
    pub fn start_with(extra: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = format!(
            "[playback]\nbackend = \"null\"\ntick_ms = 10\n\n\
             [resolver]\ncommand = \"\"\nworkers = 1\n\n\
             [playlists]\ndir = {:?}\n\n{extra}\n",
            dir.path().join("playlists")
        );
        let cfg: ServerConfig = toml::from_str(&raw).expect("test config");
        let shutdown = Arc::new(AtomicBool::new(false));
        let server = startup::build_server(
            &cfg,
            "127.0.0.1:0".parse().expect("addr"),
            shutdown.clone(),
        )
        .expect("build server");
        let addr = server.local_addr().expect("local addr");
        let handle = thread::spawn(move || server.run());
        Self {
            addr,
            shutdown,
            handle: Some(handle),
            _dir: dir,
        }
    }

    pub fn connect(&self) -> Client {
        Client::connect(self.addr)
    }

    /// Wait for the server thread to exit on its own (after `kill`).
    pub fn wait_stopped(&mut self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if self.handle.as_ref().is_some_and(|h| h.is_finished()) {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    /// Connect and consume the greeting.
    pub fn connect(addr: SocketAddr) -> Self {
        let (client, greeting) = Self::connect_raw(addr);
        assert!(
            greeting.as_deref().is_some_and(|g| g.starts_with("OK MPD ")),
            "unexpected greeting {greeting:?}"
        );
        client
    }

    /// Connect and return the first line the server sends.
    pub fn connect_raw(addr: SocketAddr) -> (Self, Option<String>) {
        let stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout");
        let writer = stream.try_clone().expect("clone");
        let mut client = Self {
            reader: BufReader::new(stream),
            writer,
        };
        let first = client.read_line();
        (client, first)
    }

    pub fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .expect("write");
    }

    /// Next line without its newline; `None` on EOF.
    pub fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => None,
            Err(e) => panic!("read failed: {e}"),
        }
    }

    /// Lines up to and including the terminating `OK` or `ACK ...`.
    pub fn read_response(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().expect("connection closed mid-response");
            let done = line == "OK" || line.starts_with("ACK ");
            lines.push(line);
            if done {
                return lines;
            }
        }
    }

    pub fn command(&mut self, line: &str) -> Vec<String> {
        self.send(line);
        self.read_response()
    }

    /// Value of `key` in the response to `line`.
    pub fn field(&mut self, line: &str, key: &str) -> Option<String> {
        let prefix = format!("{key}: ");
        self.command(line)
            .into_iter()
            .find_map(|l| l.strip_prefix(&prefix).map(str::to_string))
    }
}
