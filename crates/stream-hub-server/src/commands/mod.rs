//! Command registry and handlers.
//!
//! The registry maps each command name from [`mpd_proto::COMMANDS`] to a handler function.
//! Dispatch checks permission and argument count against the table entry before the handler
//! runs; handlers only parse argument values and talk to the engine.

mod connection;
mod playback;
mod queue;
mod status;
mod stored;

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::AtomicBool;

use mpd_proto::{Ack, AckCode, CommandSpec, IdleFlags, COMMANDS};

use crate::playlist::QueueError;
use crate::queue_engine::QueueEngine;
use crate::server::session::ClientSession;
use crate::stored_playlists::PlaylistStore;

/// What the server should do after a handler succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Write the collected output followed by `OK`.
    Ok,
    /// Write only the collected output (if any); no success marker.
    Silent,
    /// Flush output and close the connection.
    Close,
}

/// Everything a handler may touch.
pub struct Context<'a> {
    pub engine: &'a mut QueueEngine,
    pub session: &'a mut ClientSession,
    pub store: &'a PlaylistStore,
    pub shutdown: &'a AtomicBool,
    /// Idle categories to raise on every session, beyond what the engine reports.
    pub changed: &'a mut IdleFlags,
    /// Response lines, without the trailing `OK`.
    pub out: &'a mut String,
}

impl Context<'_> {
    /// Append one `key: value` line.
    pub fn line(&mut self, key: &str, value: impl std::fmt::Display) {
        self.out.push_str(&format!("{key}: {value}\n"));
    }
}

pub type Handler = fn(&mut Context<'_>, &[String]) -> Result<Reply, Ack>;

#[derive(Clone, Copy)]
pub struct CommandEntry {
    pub spec: &'static CommandSpec,
    pub handler: Handler,
}

/// Name -> handler lookup, built once at startup.
pub struct Registry {
    entries: HashMap<&'static str, CommandEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let handlers: HashMap<&'static str, Handler> = connection::HANDLERS
            .iter()
            .chain(playback::HANDLERS)
            .chain(queue::HANDLERS)
            .chain(status::HANDLERS)
            .chain(stored::HANDLERS)
            .copied()
            .collect();

        let mut entries = HashMap::with_capacity(COMMANDS.len());
        for spec in COMMANDS {
            match handlers.get(spec.name) {
                Some(handler) => {
                    entries.insert(
                        spec.name,
                        CommandEntry {
                            spec,
                            handler: *handler,
                        },
                    );
                }
                None => tracing::warn!(command = spec.name, "command has no handler"),
            }
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate and run one tokenized command.
    pub fn dispatch(&self, ctx: &mut Context<'_>, tokens: &[String]) -> Result<Reply, Ack> {
        let Some((verb, args)) = tokens.split_first() else {
            return Err(Ack::new(AckCode::Unknown, "", "No command given"));
        };
        let entry = self
            .entries
            .get(verb.as_str())
            .ok_or_else(|| Ack::unknown_command(verb))?;
        if !ctx.session.permissions.allows(entry.spec.permission) {
            return Err(Ack::permission_denied(verb));
        }
        if !entry.spec.accepts_arg_count(args.len()) {
            return Err(Ack::wrong_arg_count(verb));
        }
        tracing::debug!(client = ctx.session.id, command = %verb, ?args, "dispatch");
        (entry.handler)(ctx, args)
    }
}

pub(crate) fn parse_int(command: &str, arg: &str) -> Result<i64, Ack> {
    arg.trim()
        .parse::<i64>()
        .map_err(|_| Ack::arg(command, format!("Integer expected: {arg}")))
}

pub(crate) fn parse_unsigned(command: &str, arg: &str) -> Result<u32, Ack> {
    let value = parse_int(command, arg)?;
    u32::try_from(value).map_err(|_| Ack::arg(command, format!("Number too large: {arg}")))
}

pub(crate) fn parse_bool(command: &str, arg: &str) -> Result<bool, Ack> {
    match arg {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(Ack::arg(command, format!("Boolean (0/1) expected: {arg}"))),
    }
}

/// Position range argument: `N` means `N..N+1`, `N:M` means `N..M`, `N:` runs to the end
/// (`None`).
pub(crate) fn parse_range(command: &str, arg: &str) -> Result<(usize, Option<usize>), Ack> {
    let bad = || Ack::arg(command, "Bad song index");
    let parse = |raw: &str| {
        raw.trim()
            .parse::<usize>()
            .map_err(|_| Ack::arg(command, format!("Integer expected: {raw}")))
    };
    match arg.split_once(':') {
        None => {
            let start = parse(arg)?;
            let end = start.checked_add(1).ok_or_else(bad)?;
            Ok((start, Some(end)))
        }
        Some((start, "")) => Ok((parse(start)?, None)),
        Some((start, end)) => {
            let (start, end) = (parse(start)?, parse(end)?);
            if end < start {
                return Err(bad());
            }
            Ok((start, Some(end)))
        }
    }
}

/// Clamp a parsed range to `len`; an empty or out-of-bounds start is an error.
pub(crate) fn clamp_range(
    command: &str,
    (start, end): (usize, Option<usize>),
    len: usize,
) -> Result<Range<usize>, Ack> {
    let end = end.unwrap_or(len).min(len);
    if start >= end {
        return Err(Ack::arg(command, "Bad song index"));
    }
    Ok(start..end)
}

pub(crate) fn queue_ack(command: &str, err: QueueError) -> Ack {
    match err {
        QueueError::NoSuchSong => Ack::no_exist(command, err.to_string()),
        QueueError::BadPosition(_) | QueueError::BadRange => Ack::arg(command, err.to_string()),
    }
}
