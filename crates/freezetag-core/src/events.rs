use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::BoundaryZone;
use crate::match_state::MatchState;
use crate::player::{FreezeCause, PlayerId, Role};
use crate::round::{PhaseData, RoundPhase, RoundSummary};

/// Notifications published by the round lifecycle to external collaborators
/// (UI, audio, scoring, currency).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    StateChanged {
        new: MatchState,
        old: MatchState,
    },
    PhaseChanged {
        phase: RoundPhase,
        data: PhaseData,
    },
    /// Once per second during Countdown, Hiding and the tail of Active.
    CountdownTick {
        seconds_remaining: u32,
        phase: RoundPhase,
    },
    /// Sub-second cadence while Active.
    RoundTimerUpdate {
        seconds_remaining: f32,
    },
    /// Once per second while the next round's join window is open.
    JoinCountdown {
        seconds_remaining: u32,
    },
    PlayerFrozen {
        player: PlayerId,
        cause: FreezeCause,
    },
    PlayerUnfrozen {
        player: PlayerId,
        rescuer: Option<PlayerId>,
    },
    RoundEnded(RoundSummary),
    TeamChanged {
        player: PlayerId,
        role: Role,
    },
    ExposureChanged {
        player: PlayerId,
        level: f32,
        zone: BoundaryZone,
    },
}

/// Discriminant used to key observer lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateChanged,
    PhaseChanged,
    CountdownTick,
    RoundTimerUpdate,
    JoinCountdown,
    PlayerFrozen,
    PlayerUnfrozen,
    RoundEnded,
    TeamChanged,
    ExposureChanged,
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::StateChanged { .. } => EventKind::StateChanged,
            GameEvent::PhaseChanged { .. } => EventKind::PhaseChanged,
            GameEvent::CountdownTick { .. } => EventKind::CountdownTick,
            GameEvent::RoundTimerUpdate { .. } => EventKind::RoundTimerUpdate,
            GameEvent::JoinCountdown { .. } => EventKind::JoinCountdown,
            GameEvent::PlayerFrozen { .. } => EventKind::PlayerFrozen,
            GameEvent::PlayerUnfrozen { .. } => EventKind::PlayerUnfrozen,
            GameEvent::RoundEnded(_) => EventKind::RoundEnded,
            GameEvent::TeamChanged { .. } => EventKind::TeamChanged,
            GameEvent::ExposureChanged { .. } => EventKind::ExposureChanged,
        }
    }
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&GameEvent) + Send>;

/// Observer lists, one per event kind plus a catch-all list.
///
/// Delivery order for an event: the observers of its kind in registration
/// order, then the catch-all observers in registration order. Observers must
/// not rely on being called before or after any other observer.
#[derive(Default)]
pub struct EventHub {
    by_kind: HashMap<EventKind, Vec<(SubscriptionId, Observer)>>,
    all: Vec<(SubscriptionId, Observer)>,
    next_id: u64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    /// Subscribe to every event of one kind.
    pub fn subscribe(
        &mut self,
        kind: EventKind,
        observer: impl FnMut(&GameEvent) + Send + 'static,
    ) -> SubscriptionId {
        let id = self.alloc_id();
        self.by_kind
            .entry(kind)
            .or_default()
            .push((id, Box::new(observer)));
        id
    }

    /// Subscribe to every event regardless of kind.
    pub fn subscribe_all(
        &mut self,
        observer: impl FnMut(&GameEvent) + Send + 'static,
    ) -> SubscriptionId {
        let id = self.alloc_id();
        self.all.push((id, Box::new(observer)));
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observer_count();
        for list in self.by_kind.values_mut() {
            list.retain(|(sid, _)| *sid != id);
        }
        self.all.retain(|(sid, _)| *sid != id);
        self.observer_count() != before
    }

    pub fn observer_count(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum::<usize>() + self.all.len()
    }

    /// Deliver an event to its observers synchronously.
    pub fn emit(&mut self, event: GameEvent) {
        tracing::trace!(kind = ?event.kind(), "emit");
        if let Some(list) = self.by_kind.get_mut(&event.kind()) {
            for (_, observer) in list.iter_mut() {
                observer(&event);
            }
        }
        for (_, observer) in self.all.iter_mut() {
            observer(&event);
        }
    }

    pub fn on_state_changed(
        &mut self,
        mut f: impl FnMut(MatchState, MatchState) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventKind::StateChanged, move |e| {
            if let GameEvent::StateChanged { new, old } = e {
                f(*new, *old);
            }
        })
    }

    pub fn on_phase_changed(
        &mut self,
        mut f: impl FnMut(RoundPhase, &PhaseData) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventKind::PhaseChanged, move |e| {
            if let GameEvent::PhaseChanged { phase, data } = e {
                f(*phase, data);
            }
        })
    }

    pub fn on_countdown_tick(
        &mut self,
        mut f: impl FnMut(u32, RoundPhase) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventKind::CountdownTick, move |e| {
            if let GameEvent::CountdownTick {
                seconds_remaining,
                phase,
            } = e
            {
                f(*seconds_remaining, *phase);
            }
        })
    }

    pub fn on_round_timer_update(
        &mut self,
        mut f: impl FnMut(f32) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventKind::RoundTimerUpdate, move |e| {
            if let GameEvent::RoundTimerUpdate { seconds_remaining } = e {
                f(*seconds_remaining);
            }
        })
    }

    pub fn on_player_frozen(
        &mut self,
        mut f: impl FnMut(PlayerId, FreezeCause) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventKind::PlayerFrozen, move |e| {
            if let GameEvent::PlayerFrozen { player, cause } = e {
                f(*player, *cause);
            }
        })
    }

    pub fn on_player_unfrozen(
        &mut self,
        mut f: impl FnMut(PlayerId, Option<PlayerId>) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventKind::PlayerUnfrozen, move |e| {
            if let GameEvent::PlayerUnfrozen { player, rescuer } = e {
                f(*player, *rescuer);
            }
        })
    }

    pub fn on_round_ended(
        &mut self,
        mut f: impl FnMut(&RoundSummary) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventKind::RoundEnded, move |e| {
            if let GameEvent::RoundEnded(summary) = e {
                f(summary);
            }
        })
    }

    pub fn on_player_team_changed(
        &mut self,
        mut f: impl FnMut(PlayerId, Role) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventKind::TeamChanged, move |e| {
            if let GameEvent::TeamChanged { player, role } = e {
                f(*player, *role);
            }
        })
    }

    pub fn on_join_countdown(
        &mut self,
        mut f: impl FnMut(u32) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventKind::JoinCountdown, move |e| {
            if let GameEvent::JoinCountdown { seconds_remaining } = e {
                f(*seconds_remaining);
            }
        })
    }

    pub fn on_exposure_changed(
        &mut self,
        mut f: impl FnMut(PlayerId, f32, BoundaryZone) + Send + 'static,
    ) -> SubscriptionId {
        self.subscribe(EventKind::ExposureChanged, move |e| {
            if let GameEvent::ExposureChanged { player, level, zone } = e {
                f(*player, *level, *zone);
            }
        })
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("observers", &self.observer_count())
            .finish()
    }
}
