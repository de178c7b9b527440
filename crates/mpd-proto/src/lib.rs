//! Wire-level primitives for the MPD-style control protocol.
//!
//! Protocol shape:
//! - server greets every connection with `OK MPD <major>.<minor>.<patch>`
//! - client sends one command per line, arguments separated by whitespace,
//!   arguments containing whitespace wrapped in double quotes
//! - server answers with optional `key: value` lines followed by `OK`, or a single
//!   `ACK [code@index] {command} message` line on failure
//!
//! This crate holds the pieces that do not depend on server state: line framing and
//! tokenizing, ACK codes, idle categories, permission bits and the static command table.

pub mod ack;
pub mod command_table;
pub mod idle;
pub mod permission;
pub mod tokenizer;

pub use ack::{Ack, AckCode};
pub use command_table::{CommandSpec, COMMANDS};
pub use idle::IdleFlags;
pub use permission::Permissions;
pub use tokenizer::{tokenize, LineBuffer, TokenizeError};

/// Product name announced in the greeting. Clients key compatibility off this string.
pub const PRODUCT: &str = "MPD";

/// Protocol version announced in the greeting.
pub const PROTOCOL_VERSION: (u32, u32, u32) = (0, 21, 0);

/// Success marker terminating every response.
pub const OK: &str = "OK\n";

/// Per-command success marker inside `command_list_ok_begin` lists.
pub const LIST_OK: &str = "list_OK\n";

/// Greeting line written once on accept.
pub fn greeting() -> String {
    let (major, minor, patch) = PROTOCOL_VERSION;
    format!("OK {PRODUCT} {major}.{minor}.{patch}\n")
}
