//! Per-client I/O threads.
//!
//! A reader thread forwards client bytes to the event loop. A writer thread drains queued
//! replies, so a client that stops reading only ever stalls its own writer.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use super::session::Connection;

const READ_CHUNK: usize = 4096;

#[derive(Debug)]
pub enum Inbound {
    Data { client: u64, bytes: Vec<u8> },
    /// EOF or read error; always the last message for a client.
    Closed { client: u64 },
}

/// Start a thread that forwards everything read from `stream` as [`Inbound`] messages.
pub fn spawn_reader(client: u64, stream: TcpStream, tx: Sender<Inbound>) -> io::Result<()> {
    thread::Builder::new()
        .name(format!("mpd-client-{client}"))
        .spawn(move || client_reader_thread(client, stream, tx))?;
    Ok(())
}

fn client_reader_thread(client: u64, mut stream: TcpStream, tx: Sender<Inbound>) {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let bytes = chunk[..n].to_vec();
                if tx.send(Inbound::Data { client, bytes }).is_err() {
                    // event loop gone
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if e.kind() != io::ErrorKind::ConnectionReset {
                    tracing::debug!(client, error = %e, "read error");
                }
                break;
            }
        }
    }
    let _ = tx.send(Inbound::Closed { client });
    tracing::trace!(client, "reader thread exiting");
}

/// Write half handed to a session. Writes are queued for the writer thread and fail with
/// `WouldBlock` once more than `limit` bytes are waiting.
pub struct ClientWriter {
    tx: Sender<Vec<u8>>,
    queued: Arc<AtomicUsize>,
    limit: usize,
    socket: Option<TcpStream>,
}

impl ClientWriter {
    /// Socket to shut down when the session closes.
    pub fn with_socket(mut self, socket: TcpStream) -> Self {
        self.socket = Some(socket);
        self
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }
}

impl Write for ClientWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.queued().saturating_add(buf.len()) > self.limit {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "output buffer full",
            ));
        }
        self.queued.fetch_add(buf.len(), Ordering::AcqRel);
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "writer thread gone"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Connection for ClientWriter {
    fn shutdown(&self) {
        if let Some(socket) = &self.socket {
            let _ = socket.shutdown(Shutdown::Both);
        }
    }
}

/// Start a thread writing queued output to `sink`. The thread ends when the returned
/// writer is dropped or a write fails.
pub fn spawn_writer<W>(client: u64, sink: W, limit: usize) -> io::Result<ClientWriter>
where
    W: Write + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let queued = Arc::new(AtomicUsize::new(0));
    let counter = queued.clone();
    thread::Builder::new()
        .name(format!("mpd-writer-{client}"))
        .spawn(move || client_writer_thread(client, sink, rx, counter))?;
    Ok(ClientWriter {
        tx,
        queued,
        limit,
        socket: None,
    })
}

fn client_writer_thread<W: Write>(
    client: u64,
    mut sink: W,
    rx: Receiver<Vec<u8>>,
    queued: Arc<AtomicUsize>,
) {
    for chunk in rx.iter() {
        if let Err(e) = sink.write_all(&chunk).and_then(|()| sink.flush()) {
            tracing::debug!(client, error = %e, "write error");
            break;
        }
        queued.fetch_sub(chunk.len(), Ordering::AcqRel);
    }
    tracing::trace!(client, "writer thread exiting");
}
