use std::collections::BTreeMap;

use freezetag_core::events::{EventHub, GameEvent};
use freezetag_core::player::{FreezeCause, FreezeState, PlayerId};
use freezetag_core::powerup::Effect;
use freezetag_core::services::EffectService;

use crate::teams::TeamAssigner;

/// Result of a freeze request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeOutcome {
    /// The player is now frozen.
    Frozen { all_runners_frozen: bool },
    /// The player was already frozen; nothing happened.
    AlreadyFrozen,
    /// The target's shield absorbed the freeze.
    Shielded,
    /// Tracker disarmed, or the player holds no round role.
    Ineligible,
}

impl FreezeOutcome {
    pub fn froze(self) -> bool {
        matches!(self, FreezeOutcome::Frozen { .. })
    }
}

/// Sole authority over who is frozen.
///
/// Freezes are accepted only while the tracker is armed (Hiding and
/// Active). Every state change is published on the event hub in the order
/// it happens.
#[derive(Debug, Default)]
pub struct FreezeTracker {
    frozen: BTreeMap<PlayerId, FreezeCause>,
    armed: bool,
}

impl FreezeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_armed(&mut self, armed: bool) {
        self.armed = armed;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_frozen(&self, player: PlayerId) -> bool {
        self.frozen.contains_key(&player)
    }

    pub fn state(&self, player: PlayerId) -> FreezeState {
        if self.is_frozen(player) {
            FreezeState::Frozen
        } else {
            FreezeState::Active
        }
    }

    /// Who froze `player`, if frozen.
    pub fn frozen_by(&self, player: PlayerId) -> Option<FreezeCause> {
        self.frozen.get(&player).copied()
    }

    pub fn frozen_players(&self) -> Vec<PlayerId> {
        self.frozen.keys().copied().collect()
    }

    /// True when at least one Runner exists and every Runner is frozen.
    pub fn all_runners_frozen(&self, teams: &TeamAssigner) -> bool {
        let runners = teams.runners();
        !runners.is_empty() && runners.iter().all(|r| self.is_frozen(*r))
    }

    pub fn frozen_runner_count(&self, teams: &TeamAssigner) -> usize {
        teams
            .runners()
            .iter()
            .filter(|r| self.is_frozen(**r))
            .count()
    }

    /// Freeze `player`.
    ///
    /// A Seeker holding a shield spends it to force the freeze through.
    /// Otherwise a shield on the target is spent and the freeze is
    /// cancelled. Environment freezes can only hit the second case.
    pub fn freeze(
        &mut self,
        player: PlayerId,
        cause: FreezeCause,
        teams: &TeamAssigner,
        effects: &dyn EffectService,
        events: &mut EventHub,
    ) -> FreezeOutcome {
        if !self.armed || !teams.role(player).is_participant() {
            tracing::trace!(player_id = player, armed = self.armed, "Freeze ignored");
            return FreezeOutcome::Ineligible;
        }
        if self.is_frozen(player) {
            return FreezeOutcome::AlreadyFrozen;
        }

        let seeker_shield = cause
            .seeker()
            .is_some_and(|s| effects.has_effect(s, Effect::Shield));
        if seeker_shield {
            if let Some(s) = cause.seeker() {
                effects.consume_shield(s, false);
            }
        } else if effects.has_effect(player, Effect::Shield) {
            effects.consume_shield(player, true);
            tracing::debug!(player_id = player, ?cause, "Freeze absorbed by shield");
            return FreezeOutcome::Shielded;
        }

        self.frozen.insert(player, cause);
        tracing::info!(player_id = player, ?cause, "Player frozen");
        events.emit(GameEvent::PlayerFrozen { player, cause });

        FreezeOutcome::Frozen {
            all_runners_frozen: self.all_runners_frozen(teams),
        }
    }

    /// Unfreeze `player`. Returns false if they were not frozen.
    pub fn unfreeze(
        &mut self,
        player: PlayerId,
        rescuer: Option<PlayerId>,
        events: &mut EventHub,
    ) -> bool {
        if self.frozen.remove(&player).is_none() {
            return false;
        }
        tracing::info!(player_id = player, ?rescuer, "Player unfrozen");
        events.emit(GameEvent::PlayerUnfrozen { player, rescuer });
        true
    }

    /// Unfreeze everyone. Returns the players that were frozen.
    pub fn reset_all(&mut self, events: &mut EventHub) -> Vec<PlayerId> {
        let thawed = self.frozen_players();
        for &p in &thawed {
            self.unfreeze(p, None, events);
        }
        thawed
    }

    /// Drop a departing player, publishing an implicit unfreeze if needed.
    pub fn remove_player(&mut self, player: PlayerId, events: &mut EventHub) -> bool {
        self.unfreeze(player, None, events)
    }
}
