//! Shared domain DTOs for the estimation client.
//!
//! Wire-facing types mirror the server's JSON field names (`isDone`,
//! `playerCount`, `canLock`) via serde renames so fetch code stays
//! schema-driven.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};

pub use protocol::RevealedGuess;

/// Role of the local user within a room.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Role {
    /// Submits tickets and controls the round lifecycle.
    ProductOwner,
    /// Submits guesses for announced tickets.
    Developer,
    /// Not yet joined to any room.
    #[default]
    Unjoined,
}

impl Role {
    /// URL path segment for the room endpoint; `None` when the role cannot
    /// join a room.
    #[must_use]
    pub fn url_segment(self) -> Option<&'static str> {
        match self {
            Self::ProductOwner => Some("product-owner"),
            Self::Developer => Some("developer"),
            Self::Unjoined => None,
        }
    }
}

/// A roster entry as served by `GET room/{id}/users`, tagged by role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum UserEntry {
    ProductOwner {
        name: String,
    },
    Developer {
        name: String,
        /// Whether this developer has guessed or skipped in the active round.
        #[serde(rename = "isDone", default)]
        is_done: bool,
    },
}

impl UserEntry {
    /// Display name of the entry regardless of role.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ProductOwner { name } | Self::Developer { name, .. } => name,
        }
    }
}

/// Phase of the estimation round lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoundPhase {
    /// No ticket announced yet.
    #[default]
    Waiting,
    /// A ticket is being estimated.
    InProgress,
    /// Every developer has guessed or skipped.
    End,
}

/// Local view of one estimation round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Round {
    pub phase: RoundPhase,
    /// Ticket under estimation; empty while `Waiting`.
    pub ticket: String,
    /// The local developer's submitted guess; `0` when not yet guessed.
    pub own_guess: i64,
    /// True when the local developer abstained; mutually exclusive with a
    /// non-zero `own_guess`.
    pub own_skipped: bool,
    /// Per-developer results, populated only after a reveal event.
    pub revealed: Vec<RevealedGuess>,
}

/// Capability mirror for the current user in the current room.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub room: RoomPermissions,
}

/// Room-scoped capabilities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPermissions {
    /// Whether the user may lock or unlock the room.
    #[serde(rename = "canLock", default)]
    pub can_lock: bool,
    /// Lock/unlock key, granted only to the room creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A joinable room as listed by `GET room/rooms`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: String,
    #[serde(rename = "playerCount")]
    pub player_count: u32,
}

/// One entry of the configured guess catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessOption {
    pub guess: i64,
    pub description: String,
}

/// Snapshot of everything the session store mirrors for one room.
///
/// Published wholesale through a watch channel; observers never see a
/// partially applied transition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    /// Name chosen at join time; immutable for the session's lifetime.
    pub username: String,
    pub role: Role,
    pub room_id: String,
    /// True exactly while a transport is open.
    pub connected: bool,
    /// Server-side roster, replaced wholesale on membership events.
    pub users: Vec<UserEntry>,
    pub round: Round,
    pub permissions: Permissions,
    pub room_locked: bool,
}
