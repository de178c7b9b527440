//! Permission bits checked before dispatch.

use std::ops::BitOr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Permissions(u8);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);
    pub const READ: Permissions = Permissions(1);
    pub const ADD: Permissions = Permissions(2);
    pub const CONTROL: Permissions = Permissions(4);
    pub const ADMIN: Permissions = Permissions(8);
    pub const ALL: Permissions = Permissions(1 | 2 | 4 | 8);

    /// Parse a config-file permission name.
    pub fn from_name(name: &str) -> Option<Permissions> {
        match name.trim().to_ascii_lowercase().as_str() {
            "read" => Some(Self::READ),
            "add" => Some(Self::ADD),
            "control" => Some(Self::CONTROL),
            "admin" => Some(Self::ADMIN),
            _ => None,
        }
    }

    /// True when every bit of `required` is granted.
    pub fn allows(self, required: Permissions) -> bool {
        self.0 & required.0 == required.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Permissions) -> Permissions {
        Permissions(self.0 | rhs.0)
    }
}
