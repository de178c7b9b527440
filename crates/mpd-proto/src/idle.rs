//! Idle categories as a bitmask.
//!
//! A client long-polls on a set of categories; server-side changes raise bits that are
//! delivered as `changed: <name>` lines.

use std::ops::{BitAnd, BitOr, BitOrAssign};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IdleFlags(u16);

impl IdleFlags {
    pub const NONE: IdleFlags = IdleFlags(0);
    pub const DATABASE: IdleFlags = IdleFlags(1 << 0);
    pub const UPDATE: IdleFlags = IdleFlags(1 << 1);
    pub const STORED_PLAYLIST: IdleFlags = IdleFlags(1 << 2);
    pub const PLAYLIST: IdleFlags = IdleFlags(1 << 3);
    pub const PLAYER: IdleFlags = IdleFlags(1 << 4);
    pub const MIXER: IdleFlags = IdleFlags(1 << 5);
    pub const OUTPUT: IdleFlags = IdleFlags(1 << 6);
    pub const OPTIONS: IdleFlags = IdleFlags(1 << 7);
    pub const PARTITION: IdleFlags = IdleFlags(1 << 8);
    pub const STICKER: IdleFlags = IdleFlags(1 << 9);
    pub const SUBSCRIPTION: IdleFlags = IdleFlags(1 << 10);
    pub const MESSAGE: IdleFlags = IdleFlags(1 << 11);
    pub const ALL: IdleFlags = IdleFlags((1 << 12) - 1);

    /// Protocol names in delivery order.
    const NAMES: [(IdleFlags, &'static str); 12] = [
        (Self::DATABASE, "database"),
        (Self::UPDATE, "update"),
        (Self::STORED_PLAYLIST, "stored_playlist"),
        (Self::PLAYLIST, "playlist"),
        (Self::PLAYER, "player"),
        (Self::MIXER, "mixer"),
        (Self::OUTPUT, "output"),
        (Self::OPTIONS, "options"),
        (Self::PARTITION, "partition"),
        (Self::STICKER, "sticker"),
        (Self::SUBSCRIPTION, "subscription"),
        (Self::MESSAGE, "message"),
    ];

    /// Parse one category name (case-insensitive).
    pub fn from_name(name: &str) -> Option<IdleFlags> {
        Self::NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(flag, _)| *flag)
    }

    /// Names of all bits set, in delivery order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(flag, _)| self.intersects(*flag))
            .map(|(_, name)| name)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn intersects(self, other: IdleFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn remove(&mut self, other: IdleFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for IdleFlags {
    type Output = IdleFlags;

    fn bitor(self, rhs: IdleFlags) -> IdleFlags {
        IdleFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for IdleFlags {
    fn bitor_assign(&mut self, rhs: IdleFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for IdleFlags {
    type Output = IdleFlags;

    fn bitand(self, rhs: IdleFlags) -> IdleFlags {
        IdleFlags(self.0 & rhs.0)
    }
}
