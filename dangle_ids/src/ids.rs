//! Generational node identifiers for the scene arena.
//! u64 = index (low 32 bits) | generation (high 32 bits). Index 0 = nil.
//! Ids are handed out by the arena; a freed slot bumps its generation, so an id
//! held across a delete never resolves to whatever reuses the slot.
//!
//! A `NodeID` is the stable identity of a scene node: renames and reparents
//! never change it, which is what cross-structure links rely on.

use std::fmt;

/// Node ID allocated by `NodeArena`: index plus generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeID(pub u64);

impl NodeID {
    #[inline]
    pub const fn nil() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self((index as u64) | ((generation as u64) << 32))
    }

    #[inline]
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }

    /// Same slot, next generation. Used by the arena when a slot is freed.
    #[inline]
    pub const fn next_generation(self) -> Self {
        Self::from_parts(self.index(), self.generation().wrapping_add(1))
    }
}

impl Default for NodeID {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Debug for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeID({}:{})", self.index(), self.generation())
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index(), self.generation())
    }
}
