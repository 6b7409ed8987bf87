use serde::{Deserialize, Serialize};

/// Unique identifier for a connected player.
pub type PlayerId = u64;

/// A player's side for the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Seeker,
    Runner,
    #[default]
    Spectator,
}

impl Role {
    /// Seekers and Runners take part in the round; spectators do not.
    pub fn is_participant(self) -> bool {
        matches!(self, Role::Seeker | Role::Runner)
    }

    /// Spawn class used when placing this role at round start.
    pub fn spawn_class(self) -> Option<SpawnClass> {
        match self {
            Role::Seeker => Some(SpawnClass::Seeker),
            Role::Runner => Some(SpawnClass::Runner),
            Role::Spectator => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Seeker => write!(f, "seeker"),
            Role::Runner => write!(f, "runner"),
            Role::Spectator => write!(f, "spectator"),
        }
    }
}

/// Spawn region requested from the map subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnClass {
    Seeker,
    Runner,
}

/// Whether a player can currently move and be targeted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreezeState {
    #[default]
    Active,
    Frozen,
}

/// What caused a freeze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FreezeCause {
    /// Caught in a Seeker's detection cone.
    Seeker(PlayerId),
    /// Exposure to the out-of-bounds cold zones reached the limit.
    Environment,
}

impl FreezeCause {
    pub fn seeker(self) -> Option<PlayerId> {
        match self {
            FreezeCause::Seeker(id) => Some(id),
            FreezeCause::Environment => None,
        }
    }
}
