//! Narrow interfaces to the subsystems the round logic depends on but does
//! not own: the player queue, map spawns, power-up effects, the detection
//! tool inventory, stance, body poses, and movement locks.
//!
//! Every query is infallible from the caller's point of view. An
//! unavailable subsystem answers `None`/`false` and the caller falls back to
//! defaults or skips the subject for the current tick.

pub mod memory;

use std::sync::Arc;

use crate::geometry::BodyPose;
use crate::player::{PlayerId, SpawnClass};
use crate::powerup::Effect;

/// Queue of players waiting for (or currently in) a round.
pub trait Roster: Send + Sync {
    fn queued_count(&self) -> usize;
    /// Queued players in queue order.
    fn queued_players(&self) -> Vec<PlayerId>;
    /// Move every queued player into the running game. Returns the moved ids.
    fn mark_queued_as_in_game(&self) -> Vec<PlayerId>;
    /// Return every in-game player to the queue.
    fn mark_in_game_as_queued(&self);
    fn enqueue(&self, player: PlayerId);
    fn remove(&self, player: PlayerId);
}

/// Map/spawn subsystem.
pub trait SpawnService: Send + Sync {
    fn spawn_at(&self, player: PlayerId, class: SpawnClass);
}

/// Power-up effect subsystem.
pub trait EffectService: Send + Sync {
    fn has_effect(&self, player: PlayerId, effect: Effect) -> bool;
    /// Use up one shield. `was_defensive` is true when it blocked a freeze,
    /// false when a Seeker spent it to force one. Returns false if the player
    /// held no shield.
    fn consume_shield(&self, player: PlayerId, was_defensive: bool) -> bool;
}

/// Detection tool inventory.
pub trait InventoryService: Send + Sync {
    fn is_tool_equipped(&self, player: PlayerId) -> bool;
    /// `(range, full cone angle in degrees)` of the equipped tool tier.
    fn detection_range_and_angle(&self, player: PlayerId) -> Option<(f32, f32)>;
}

/// Stance subsystem.
pub trait StanceService: Send + Sync {
    fn is_crouching(&self, player: PlayerId) -> bool;
    /// How far a crouch lowers the detection target point.
    fn detection_height_offset(&self, player: PlayerId) -> Option<f32>;
}

/// Host-engine body query. `None` while the body is not spawned.
pub trait BodyProvider: Send + Sync {
    fn pose(&self, player: PlayerId) -> Option<BodyPose>;
}

/// Administrative movement lock.
pub trait MovementGate: Send + Sync {
    fn set_movement_locked(&self, player: PlayerId, locked: bool);
}

/// Collaborators resolved once at startup and injected into the round logic.
#[derive(Clone)]
pub struct Services {
    pub roster: Arc<dyn Roster>,
    pub spawns: Arc<dyn SpawnService>,
    pub effects: Arc<dyn EffectService>,
    pub inventory: Arc<dyn InventoryService>,
    pub stance: Arc<dyn StanceService>,
    pub bodies: Arc<dyn BodyProvider>,
    pub movement: Arc<dyn MovementGate>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
