//! Per-client protocol state.

use std::io::{self, Write};
use std::net::SocketAddr;

use mpd_proto::{IdleFlags, LineBuffer, Permissions};

/// Write half of a client connection.
pub trait Connection: Write + Send {
    /// Close both directions so the reader thread unblocks.
    fn shutdown(&self);
}

/// Commands collected between `command_list_begin` and `command_list_end`.
#[derive(Debug, Default)]
pub struct CommandList {
    /// `command_list_ok_begin`: emit `list_OK` after each command.
    pub verbose: bool,
    pub lines: Vec<Vec<String>>,
}

impl CommandList {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            lines: Vec::new(),
        }
    }
}

pub struct ClientSession {
    pub id: u64,
    pub peer: Option<SocketAddr>,
    conn: Box<dyn Connection>,
    pub buffer: LineBuffer,
    pub permissions: Permissions,
    /// Categories the client is waiting on; empty when not idle.
    idle: IdleFlags,
    /// Changes seen since the client last collected them.
    pending: IdleFlags,
    pub command_list: Option<CommandList>,
    closing: bool,
}

impl ClientSession {
    pub fn new(
        id: u64,
        peer: Option<SocketAddr>,
        conn: Box<dyn Connection>,
        permissions: Permissions,
    ) -> Self {
        Self {
            id,
            peer,
            conn,
            buffer: LineBuffer::new(),
            permissions,
            idle: IdleFlags::NONE,
            pending: IdleFlags::NONE,
            command_list: None,
            closing: false,
        }
    }

    /// Write raw protocol text. A failed write marks the session for removal.
    pub fn send(&mut self, text: &str) {
        if self.closing || text.is_empty() {
            return;
        }
        let result = self
            .conn
            .write_all(text.as_bytes())
            .and_then(|()| self.conn.flush());
        match result {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                tracing::warn!(client = self.id, "output buffer full, closing");
                self.closing = true;
            }
            Err(e) => {
                tracing::debug!(client = self.id, error = %e, "write failed");
                self.closing = true;
            }
        }
    }

    pub fn close(&mut self) {
        self.closing = true;
        self.conn.shutdown();
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn is_idle(&self) -> bool {
        !self.idle.is_empty()
    }

    /// Record changes for this client.
    pub fn raise(&mut self, changed: IdleFlags) {
        self.pending |= changed;
    }

    /// Enter idle on `mask`. Changes already pending in `mask` are returned at once as
    /// `changed:` lines instead of waiting.
    pub fn begin_idle(&mut self, mask: IdleFlags) -> Option<String> {
        self.idle = mask;
        self.take_idle_delivery()
    }

    /// `changed:` lines for pending changes the idle mask covers; leaves idle when any.
    pub fn take_idle_delivery(&mut self) -> Option<String> {
        let hit = self.pending & self.idle;
        if hit.is_empty() {
            return None;
        }
        self.pending.remove(hit);
        self.idle = IdleFlags::NONE;
        Some(hit.names().map(|name| format!("changed: {name}\n")).collect())
    }

    pub fn end_idle(&mut self) {
        self.idle = IdleFlags::NONE;
    }
}

/// Session writing into a shared buffer, for handler tests.
#[cfg(test)]
pub(crate) fn test_session(
    permissions: Permissions,
) -> (ClientSession, std::sync::Arc<std::sync::Mutex<Vec<u8>>>) {
    use std::sync::{Arc, Mutex};

    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Connection for Captured {
        fn shutdown(&self) {}
    }

    let output = Arc::new(Mutex::new(Vec::new()));
    let session = ClientSession::new(1, None, Box::new(Captured(output.clone())), permissions);
    (session, output)
}
