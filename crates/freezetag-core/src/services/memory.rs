//! In-process implementations of the collaborator traits. The hosted server
//! uses these, with the WebSocket layer feeding poses and stance updates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::geometry::BodyPose;
use crate::player::{PlayerId, SpawnClass};
use crate::powerup::Effect;

use super::{
    BodyProvider, EffectService, InventoryService, MovementGate, Roster, Services, SpawnService,
    StanceService,
};

#[derive(Debug, Default)]
struct RosterInner {
    queued: Vec<PlayerId>,
    in_game: Vec<PlayerId>,
}

/// FIFO player queue.
#[derive(Debug, Default)]
pub struct QueueRoster {
    inner: Mutex<RosterInner>,
}

impl QueueRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_game_players(&self) -> Vec<PlayerId> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_game
            .clone()
    }
}

impl Roster for QueueRoster {
    fn queued_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .queued
            .len()
    }

    fn queued_players(&self) -> Vec<PlayerId> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .queued
            .clone()
    }

    fn mark_queued_as_in_game(&self) -> Vec<PlayerId> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let moved = std::mem::take(&mut inner.queued);
        inner.in_game.extend_from_slice(&moved);
        moved
    }

    fn mark_in_game_as_queued(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let returning = std::mem::take(&mut inner.in_game);
        inner.queued.extend(returning);
    }

    fn enqueue(&self, player: PlayerId) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !inner.queued.contains(&player) && !inner.in_game.contains(&player) {
            inner.queued.push(player);
        }
    }

    fn remove(&self, player: PlayerId) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.queued.retain(|&p| p != player);
        inner.in_game.retain(|&p| p != player);
    }
}

/// Unspent effects held by each player. A player may hold several shields.
#[derive(Debug, Default)]
pub struct EffectLedger {
    active: Mutex<HashMap<PlayerId, Vec<Effect>>>,
    /// `(player, was_defensive)` for every consumed shield, in order.
    shield_log: Mutex<Vec<(PlayerId, bool)>>,
}

impl EffectLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, player: PlayerId, effect: Effect) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(player)
            .or_default()
            .push(effect);
    }

    pub fn clear_player(&self, player: PlayerId) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&player);
    }

    pub fn shield_log(&self) -> Vec<(PlayerId, bool)> {
        self.shield_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EffectService for EffectLedger {
    fn has_effect(&self, player: PlayerId, effect: Effect) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player)
            .is_some_and(|effects| effects.contains(&effect))
    }

    fn consume_shield(&self, player: PlayerId, was_defensive: bool) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(effects) = active.get_mut(&player) else {
            return false;
        };
        let Some(idx) = effects.iter().position(|e| *e == Effect::Shield) else {
            return false;
        };
        effects.swap_remove(idx);
        if effects.is_empty() {
            active.remove(&player);
        }
        drop(active);
        tracing::debug!(player_id = player, was_defensive, "Shield consumed");
        self.shield_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((player, was_defensive));
        true
    }
}

/// Detection tool tier held by a player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolTier {
    pub range: f32,
    pub angle_deg: f32,
}

#[derive(Debug, Clone, Default)]
struct BodyEntry {
    pose: Option<BodyPose>,
    crouching: bool,
    crouch_offset: Option<f32>,
    tool_equipped: bool,
    tool: Option<ToolTier>,
    movement_locked: bool,
    last_spawn: Option<SpawnClass>,
    spawn_count: u32,
}

/// Spawn positions handed out round-robin per class.
#[derive(Debug, Clone, Default)]
pub struct SpawnLayout {
    pub seekers: Vec<BodyPose>,
    pub runners: Vec<BodyPose>,
}

/// Per-player body, stance, inventory and movement state.
#[derive(Debug, Default)]
pub struct PlayerWorld {
    bodies: RwLock<HashMap<PlayerId, BodyEntry>>,
    layout: RwLock<SpawnLayout>,
}

impl PlayerWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: SpawnLayout) -> Self {
        Self {
            bodies: RwLock::default(),
            layout: RwLock::new(layout),
        }
    }

    fn update(&self, player: PlayerId, f: impl FnOnce(&mut BodyEntry)) {
        let mut bodies = self.bodies.write().unwrap_or_else(PoisonError::into_inner);
        f(bodies.entry(player).or_default());
    }

    fn read<T>(&self, player: PlayerId, f: impl FnOnce(&BodyEntry) -> T) -> Option<T> {
        self.bodies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player)
            .map(f)
    }

    pub fn set_pose(&self, player: PlayerId, pose: BodyPose) {
        self.update(player, |e| e.pose = Some(pose));
    }

    pub fn clear_pose(&self, player: PlayerId) {
        self.update(player, |e| e.pose = None);
    }

    pub fn set_crouching(&self, player: PlayerId, crouching: bool) {
        self.update(player, |e| e.crouching = crouching);
    }

    pub fn set_crouch_offset(&self, player: PlayerId, offset: Option<f32>) {
        self.update(player, |e| e.crouch_offset = offset);
    }

    pub fn set_tool_equipped(&self, player: PlayerId, equipped: bool) {
        self.update(player, |e| e.tool_equipped = equipped);
    }

    pub fn set_tool_tier(&self, player: PlayerId, tier: Option<ToolTier>) {
        self.update(player, |e| e.tool = tier);
    }

    pub fn is_movement_locked(&self, player: PlayerId) -> bool {
        self.read(player, |e| e.movement_locked).unwrap_or(false)
    }

    pub fn last_spawn(&self, player: PlayerId) -> Option<SpawnClass> {
        self.read(player, |e| e.last_spawn).flatten()
    }

    pub fn spawn_count(&self, player: PlayerId) -> u32 {
        self.read(player, |e| e.spawn_count).unwrap_or(0)
    }

    pub fn remove_player(&self, player: PlayerId) {
        self.bodies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&player);
    }
}

impl SpawnService for PlayerWorld {
    fn spawn_at(&self, player: PlayerId, class: SpawnClass) {
        let pose = {
            let layout = self.layout.read().unwrap_or_else(PoisonError::into_inner);
            let points = match class {
                SpawnClass::Seeker => &layout.seekers,
                SpawnClass::Runner => &layout.runners,
            };
            let n = self.spawn_count(player) as usize;
            if points.is_empty() {
                None
            } else {
                Some(points[(player as usize + n) % points.len()])
            }
        };
        self.update(player, |e| {
            e.last_spawn = Some(class);
            e.spawn_count += 1;
            if let Some(pose) = pose {
                e.pose = Some(pose);
            }
        });
    }
}

impl InventoryService for PlayerWorld {
    fn is_tool_equipped(&self, player: PlayerId) -> bool {
        self.read(player, |e| e.tool_equipped).unwrap_or(false)
    }

    fn detection_range_and_angle(&self, player: PlayerId) -> Option<(f32, f32)> {
        self.read(player, |e| e.tool.map(|t| (t.range, t.angle_deg)))
            .flatten()
    }
}

impl StanceService for PlayerWorld {
    fn is_crouching(&self, player: PlayerId) -> bool {
        self.read(player, |e| e.crouching).unwrap_or(false)
    }

    fn detection_height_offset(&self, player: PlayerId) -> Option<f32> {
        self.read(player, |e| e.crouch_offset).flatten()
    }
}

impl BodyProvider for PlayerWorld {
    fn pose(&self, player: PlayerId) -> Option<BodyPose> {
        self.read(player, |e| e.pose).flatten()
    }
}

impl MovementGate for PlayerWorld {
    fn set_movement_locked(&self, player: PlayerId, locked: bool) {
        self.update(player, |e| e.movement_locked = locked);
    }
}

/// Concrete handles to the in-memory collaborators, kept alongside the
/// trait-object bundle so callers can drive them directly.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServices {
    pub roster: Arc<QueueRoster>,
    pub effects: Arc<EffectLedger>,
    pub world: Arc<PlayerWorld>,
}

impl InMemoryServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: SpawnLayout) -> Self {
        Self {
            world: Arc::new(PlayerWorld::with_layout(layout)),
            ..Self::default()
        }
    }

    /// Bundle the concrete collaborators as trait objects.
    pub fn services(&self) -> Services {
        Services {
            roster: Arc::clone(&self.roster) as Arc<dyn Roster>,
            spawns: Arc::clone(&self.world) as Arc<dyn SpawnService>,
            effects: Arc::clone(&self.effects) as Arc<dyn EffectService>,
            inventory: Arc::clone(&self.world) as Arc<dyn InventoryService>,
            stance: Arc::clone(&self.world) as Arc<dyn StanceService>,
            bodies: Arc::clone(&self.world) as Arc<dyn BodyProvider>,
            movement: Arc::clone(&self.world) as Arc<dyn MovementGate>,
        }
    }

    /// Forget everything about a departed player.
    pub fn forget(&self, player: PlayerId) {
        self.roster.remove(player);
        self.effects.clear_player(player);
        self.world.remove_player(player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;

    #[test]
    fn roster_moves_between_queue_and_game() {
        let roster = QueueRoster::new();
        roster.enqueue(1);
        roster.enqueue(2);
        roster.enqueue(2);
        assert_eq!(roster.queued_count(), 2);

        let moved = roster.mark_queued_as_in_game();
        assert_eq!(moved, vec![1, 2]);
        assert_eq!(roster.queued_count(), 0);

        roster.enqueue(3);
        roster.enqueue(1);
        assert_eq!(roster.queued_players(), vec![3], "in-game player is not re-queued");

        roster.mark_in_game_as_queued();
        assert_eq!(roster.queued_players(), vec![3, 1, 2]);

        roster.remove(1);
        assert_eq!(roster.queued_players(), vec![3, 2]);
    }

    #[test]
    fn shield_is_consumed_once() {
        let ledger = EffectLedger::new();
        ledger.grant(5, Effect::Shield);
        assert!(ledger.has_effect(5, Effect::Shield));
        assert!(ledger.consume_shield(5, true));
        assert!(!ledger.has_effect(5, Effect::Shield));
        assert!(!ledger.consume_shield(5, true));
        assert_eq!(ledger.shield_log(), vec![(5, true)]);
    }

    #[test]
    fn shields_stack_and_are_spent_one_at_a_time() {
        let ledger = EffectLedger::new();
        ledger.grant(1, Effect::Shield);
        ledger.grant(1, Effect::Shield);
        assert!(ledger.consume_shield(1, false));
        assert!(ledger.has_effect(1, Effect::Shield));
        assert!(ledger.consume_shield(1, true));
        assert!(!ledger.has_effect(1, Effect::Shield));
        assert_eq!(ledger.shield_log(), vec![(1, false), (1, true)]);
    }

    #[test]
    fn unknown_player_queries_fall_back() {
        let world = PlayerWorld::new();
        assert!(world.pose(9).is_none());
        assert!(!world.is_tool_equipped(9));
        assert!(world.detection_range_and_angle(9).is_none());
        assert!(!world.is_crouching(9));
        assert!(world.detection_height_offset(9).is_none());
        assert!(!world.is_movement_locked(9));
    }

    #[test]
    fn spawn_uses_layout_for_class() {
        let seeker_pose = BodyPose::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        let runner_pose = BodyPose::new(Vec3::new(-5.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        let world = PlayerWorld::with_layout(SpawnLayout {
            seekers: vec![seeker_pose],
            runners: vec![runner_pose],
        });

        world.spawn_at(7, SpawnClass::Runner);
        assert_eq!(world.pose(7), Some(runner_pose));
        assert_eq!(world.last_spawn(7), Some(SpawnClass::Runner));

        world.spawn_at(7, SpawnClass::Seeker);
        assert_eq!(world.pose(7), Some(seeker_pose));
        assert_eq!(world.spawn_count(7), 2);
    }

    #[test]
    fn bundle_shares_state_with_handles() {
        let mem = InMemoryServices::new();
        let services = mem.services();
        mem.world
            .set_pose(3, BodyPose::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0)));
        services.movement.set_movement_locked(3, true);
        assert!(services.bodies.pose(3).is_some());
        assert!(mem.world.is_movement_locked(3));

        mem.forget(3);
        assert!(services.bodies.pose(3).is_none());
    }
}
