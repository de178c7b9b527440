//! Static registry of supported commands: name, permission, arity.
//!
//! Handlers are bound to these entries by the server; this table is the single source for
//! argument-count validation, permission checks and `commands` / `notcommands` listings.

use crate::permission::Permissions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub permission: Permissions,
    pub min_args: usize,
    /// `None` means any number of arguments.
    pub max_args: Option<usize>,
    /// Whether the command may be recorded inside a command list.
    pub allowed_in_list: bool,
}

impl CommandSpec {
    const fn new(
        name: &'static str,
        permission: Permissions,
        min_args: usize,
        max_args: Option<usize>,
    ) -> Self {
        Self {
            name,
            permission,
            min_args,
            max_args,
            allowed_in_list: true,
        }
    }

    const fn session_only(mut self) -> Self {
        self.allowed_in_list = false;
        self
    }

    pub fn accepts_arg_count(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.is_none_or(|max| count <= max)
    }
}

const NONE: Permissions = Permissions::NONE;
const READ: Permissions = Permissions::READ;
const ADD: Permissions = Permissions::ADD;
const CONTROL: Permissions = Permissions::CONTROL;
const ADMIN: Permissions = Permissions::ADMIN;

/// Every command the server understands, sorted by name.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("add", ADD, 1, Some(2)),
    CommandSpec::new("addid", ADD, 1, Some(2)),
    CommandSpec::new("clear", CONTROL, 0, Some(0)),
    CommandSpec::new("clearerror", CONTROL, 0, Some(0)),
    CommandSpec::new("close", NONE, 0, Some(0)),
    CommandSpec::new("command_list_begin", NONE, 0, Some(0)).session_only(),
    CommandSpec::new("command_list_end", NONE, 0, Some(0)).session_only(),
    CommandSpec::new("command_list_ok_begin", NONE, 0, Some(0)).session_only(),
    CommandSpec::new("commands", NONE, 0, Some(0)),
    CommandSpec::new("consume", CONTROL, 1, Some(1)),
    CommandSpec::new("currentsong", READ, 0, Some(0)),
    CommandSpec::new("decoders", READ, 0, Some(0)),
    CommandSpec::new("delete", CONTROL, 1, Some(1)),
    CommandSpec::new("deleteid", CONTROL, 1, Some(1)),
    CommandSpec::new("getvol", READ, 0, Some(0)),
    CommandSpec::new("idle", READ, 0, None).session_only(),
    CommandSpec::new("kill", ADMIN, 0, Some(0)),
    CommandSpec::new("listplaylists", READ, 0, Some(0)),
    CommandSpec::new("load", ADD, 1, Some(1)),
    CommandSpec::new("move", CONTROL, 2, Some(2)),
    CommandSpec::new("moveid", CONTROL, 2, Some(2)),
    CommandSpec::new("next", CONTROL, 0, Some(0)),
    CommandSpec::new("noidle", READ, 0, Some(0)).session_only(),
    CommandSpec::new("notcommands", NONE, 0, Some(0)),
    CommandSpec::new("outputs", READ, 0, Some(0)),
    CommandSpec::new("pause", CONTROL, 0, Some(1)),
    CommandSpec::new("ping", NONE, 0, Some(0)),
    CommandSpec::new("play", CONTROL, 0, Some(1)),
    CommandSpec::new("playid", CONTROL, 0, Some(1)),
    CommandSpec::new("playlistfind", READ, 2, Some(2)),
    CommandSpec::new("playlistid", READ, 0, Some(1)),
    CommandSpec::new("playlistinfo", READ, 0, Some(1)),
    CommandSpec::new("playlistsearch", READ, 2, Some(2)),
    CommandSpec::new("plchanges", READ, 1, Some(1)),
    CommandSpec::new("plchangesposid", READ, 1, Some(1)),
    CommandSpec::new("previous", CONTROL, 0, Some(0)),
    CommandSpec::new("random", CONTROL, 1, Some(1)),
    CommandSpec::new("repeat", CONTROL, 1, Some(1)),
    CommandSpec::new("rm", CONTROL, 1, Some(1)),
    CommandSpec::new("save", CONTROL, 1, Some(1)),
    CommandSpec::new("setvol", CONTROL, 1, Some(1)),
    CommandSpec::new("shuffle", CONTROL, 0, Some(0)),
    CommandSpec::new("single", CONTROL, 1, Some(1)),
    CommandSpec::new("stats", READ, 0, Some(0)),
    CommandSpec::new("status", READ, 0, Some(0)),
    CommandSpec::new("stop", CONTROL, 0, Some(0)),
    CommandSpec::new("tagtypes", READ, 0, Some(0)),
    CommandSpec::new("urlhandlers", READ, 0, Some(0)),
    CommandSpec::new("volume", CONTROL, 1, Some(1)),
];

/// Exact, case-sensitive lookup.
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .binary_search_by(|spec| spec.name.cmp(name))
        .ok()
        .map(|idx| &COMMANDS[idx])
}
