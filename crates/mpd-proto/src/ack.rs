//! Protocol error replies.
//!
//! Every failure is reported as one line:
//! `ACK [<code>@<command list index>] {<command>} <message>`.

use std::fmt;

/// Numeric error codes understood by clients.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    NotList = 1,
    Arg = 2,
    Password = 3,
    Permission = 4,
    Unknown = 5,

    NoExist = 50,
    PlaylistMax = 51,
    System = 52,
    PlaylistLoad = 53,
    UpdateAlready = 54,
    PlayerSync = 55,
    Exist = 56,
}

impl AckCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// A failed command, ready to be written back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub code: AckCode,
    /// Position of the failing command inside a command list (0 outside lists).
    pub list_index: usize,
    /// Command name; empty when the verb itself was not recognized.
    pub command: String,
    pub message: String,
}

impl Ack {
    pub fn new(code: AckCode, command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            list_index: 0,
            command: command.into(),
            message: message.into(),
        }
    }

    /// Unrecognized verb.
    pub fn unknown_command(verb: &str) -> Self {
        Self::new(AckCode::Unknown, "", format!("unknown command \"{verb}\""))
    }

    /// Argument count outside the command's declared range.
    pub fn wrong_arg_count(command: &str) -> Self {
        Self::new(
            AckCode::Arg,
            command,
            format!("wrong number of arguments for \"{command}\""),
        )
    }

    /// Session lacks a permission bit the command requires.
    pub fn permission_denied(command: &str) -> Self {
        Self::new(
            AckCode::Permission,
            command,
            format!("you don't have permission for \"{command}\""),
        )
    }

    pub fn arg(command: &str, message: impl Into<String>) -> Self {
        Self::new(AckCode::Arg, command, message)
    }

    pub fn no_exist(command: &str, message: impl Into<String>) -> Self {
        Self::new(AckCode::NoExist, command, message)
    }

    pub fn system(command: &str, message: impl Into<String>) -> Self {
        Self::new(AckCode::System, command, message)
    }

    /// Attach the command-list position of the failing command.
    pub fn at_index(mut self, index: usize) -> Self {
        self.list_index = index;
        self
    }

    /// Render with the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ACK [{}@{}] {{{}}} {}",
            self.code.as_u16(),
            self.list_index,
            self.command,
            self.message
        )
    }
}

impl std::error::Error for Ack {}
