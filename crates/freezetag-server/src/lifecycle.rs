//! Outer match state machine: Lobby, TeamSelection, Gameplay, Results.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use freezetag_arena::{LineOfSight, TeamAssigner};
use freezetag_core::config::GameConfig;
use freezetag_core::events::{EventHub, GameEvent};
use freezetag_core::match_state::MatchState;
use freezetag_core::player::PlayerId;
use freezetag_core::services::Services;

use crate::round::{RoundController, RoundEnv};
use crate::timers::{ManualScheduler, Scheduler, TimerFired, TimerKind, TimerScope};

const SECOND: Duration = Duration::from_secs(1);

/// Owns the match: roles, the live round, the event hub and the timers.
///
/// All methods are synchronous. Time enters only through `now` arguments
/// and timer firings, so the same code runs under the tokio actor and under
/// [`ManualScheduler`].
pub struct GameStateLifecycle<S: Scheduler> {
    config: GameConfig,
    state: MatchState,
    teams: TeamAssigner,
    services: Services,
    sight: Arc<dyn LineOfSight>,
    events: EventHub,
    scheduler: S,
    round: Option<RoundController>,
    join_countdown: Option<u32>,
    rounds_played: u64,
}

impl<S: Scheduler> GameStateLifecycle<S> {
    pub fn new(
        config: GameConfig,
        services: Services,
        sight: Arc<dyn LineOfSight>,
        teams: TeamAssigner,
        scheduler: S,
    ) -> Self {
        Self {
            config,
            state: MatchState::Lobby,
            teams,
            services,
            sight,
            events: EventHub::new(),
            scheduler,
            round: None,
            join_countdown: None,
            rounds_played: 0,
        }
    }

    /// Begin polling the lobby.
    pub fn start(&mut self) {
        tracing::info!(min_players = self.config.lifecycle.min_players, "Lobby open");
        self.scheduler.schedule_every(
            TimerKind::LobbyCheck,
            self.config.lifecycle.lobby_check_interval(),
        );
    }

    /// Cancel every timer. The lifecycle is inert afterwards.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn teams(&self) -> &TeamAssigner {
        &self.teams
    }

    pub fn round(&self) -> Option<&RoundController> {
        self.round.as_ref()
    }

    pub fn join_countdown(&self) -> Option<u32> {
        self.join_countdown
    }

    pub fn rounds_played(&self) -> u64 {
        self.rounds_played
    }

    pub fn events_mut(&mut self) -> &mut EventHub {
        &mut self.events
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    fn enough_players(&self) -> bool {
        self.services.roster.queued_count() >= self.config.lifecycle.min_players
    }

    pub fn player_joined(&mut self, player: PlayerId) {
        self.services.roster.enqueue(player);
        self.teams.add_player(player);
        tracing::info!(player_id = player, state = %self.state, "Player joined");
    }

    pub fn player_left(&mut self, player: PlayerId, now: Instant) {
        self.services.roster.remove(player);
        let role = self.teams.remove_player(player).unwrap_or_default();
        tracing::info!(player_id = player, %role, state = %self.state, "Player left");

        if self.state == MatchState::Gameplay {
            let ended = self.with_round(now, |round, env| round.player_removed(player, role, env));
            if ended.is_some() {
                self.round_finished(now);
            }
        }
    }

    /// Forward a rescue request to the live round.
    pub fn rescue(&mut self, rescuer: PlayerId, target: PlayerId, now: Instant) -> bool {
        if self.state != MatchState::Gameplay {
            tracing::debug!(rescuer, target, state = %self.state, "Rescue outside gameplay");
            return false;
        }
        self.with_round(now, |round, env| round.rescue(rescuer, target, env).then_some(()))
            .is_some()
    }

    pub fn on_timer(&mut self, fired: TimerFired, now: Instant) {
        if !self.scheduler.accept(&fired) {
            tracing::trace!(kind = ?fired.kind, "Stale timer dropped");
            return;
        }
        match fired.kind {
            TimerKind::LobbyCheck => {
                if self.state == MatchState::Lobby && self.enough_players() {
                    self.request_transition(MatchState::TeamSelection, now);
                }
            },
            TimerKind::SelectionTick => self.on_selection_tick(now),
            TimerKind::ResultsDone => self.leave_results(now),
            TimerKind::PhaseCountdown
            | TimerKind::RoundClock
            | TimerKind::DetectionTick
            | TimerKind::BoundaryTick => {
                let ended = self.with_round(now, |round, env| round.on_timer(fired.kind, env));
                if ended.is_some() {
                    self.round_finished(now);
                }
            },
        }
    }

    fn with_round<R>(
        &mut self,
        now: Instant,
        f: impl FnOnce(&mut RoundController, &mut RoundEnv<'_>) -> Option<R>,
    ) -> Option<R> {
        let round = self.round.as_mut()?;
        let mut env = RoundEnv {
            teams: &self.teams,
            services: &self.services,
            sight: self.sight.as_ref(),
            events: &mut self.events,
            scheduler: &mut self.scheduler,
            now,
        };
        f(round, &mut env)
    }

    fn round_finished(&mut self, now: Instant) {
        self.rounds_played += 1;
        self.request_transition(MatchState::Results, now);
    }

    /// Move to `target` if the edge is legal. Re-entering the current state
    /// is a no-op with no side effects.
    pub(crate) fn request_transition(&mut self, target: MatchState, now: Instant) -> bool {
        let old = self.state;
        if old == target {
            tracing::trace!(state = %old, "Already in state");
            return false;
        }
        if !old.can_transition_to(target) {
            tracing::warn!(from = %old, to = %target, "Rejected state transition");
            return false;
        }

        self.exit_state(old, target);
        self.state = target;
        tracing::info!(from = %old, to = %target, "Match state changed");
        self.events.emit(GameEvent::StateChanged { new: target, old });
        self.enter_state(target, now);
        true
    }

    fn exit_state(&mut self, old: MatchState, target: MatchState) {
        match old {
            MatchState::Lobby => self.scheduler.cancel_scope(TimerScope::Lobby),
            MatchState::Results => {
                self.scheduler.cancel_scope(TimerScope::Results);
                self.round = None;
            },
            MatchState::TeamSelection | MatchState::Gameplay => {},
        }
        if target == MatchState::Lobby {
            self.scheduler.cancel_scope(TimerScope::Selection);
            self.join_countdown = None;
        }
    }

    fn enter_state(&mut self, new: MatchState, now: Instant) {
        match new {
            MatchState::Lobby => {
                self.scheduler.schedule_every(
                    TimerKind::LobbyCheck,
                    self.config.lifecycle.lobby_check_interval(),
                );
            },
            MatchState::TeamSelection => {
                self.teams.start_selection();
                match self.join_countdown {
                    Some(0) => self.finalize_teams(now),
                    Some(_) => {},
                    None => {
                        self.start_join_countdown(self.config.lifecycle.team_selection_secs);
                        if self.join_countdown == Some(0) {
                            self.finalize_teams(now);
                        }
                    },
                }
            },
            MatchState::Gameplay => {
                self.round = Some(RoundController::new(&self.config));
                let ended = self.with_round(now, |round, env| round.start(env));
                if ended.is_some() {
                    self.round_finished(now);
                }
            },
            MatchState::Results => {
                let results_secs = self.config.lifecycle.results_secs;
                self.scheduler.schedule_once(
                    TimerKind::ResultsDone,
                    Duration::from_secs(u64::from(results_secs)),
                );
                // The next join window opens now and closes once Results
                // and TeamSelection have both run their course.
                self.start_join_countdown(results_secs + self.config.lifecycle.team_selection_secs);
            },
        }
    }

    fn start_join_countdown(&mut self, secs: u32) {
        self.scheduler.cancel_scope(TimerScope::Selection);
        self.join_countdown = Some(secs);
        self.events.emit(GameEvent::JoinCountdown {
            seconds_remaining: secs,
        });
        if secs > 0 {
            self.scheduler.schedule_every(TimerKind::SelectionTick, SECOND);
        }
    }

    fn on_selection_tick(&mut self, now: Instant) {
        let Some(remaining) = self.join_countdown.as_mut() else {
            return;
        };
        *remaining = remaining.saturating_sub(1);
        let secs = *remaining;
        self.events.emit(GameEvent::JoinCountdown {
            seconds_remaining: secs,
        });
        if secs == 0 {
            self.scheduler.cancel_scope(TimerScope::Selection);
            if self.state == MatchState::TeamSelection {
                self.finalize_teams(now);
            }
        }
    }

    fn finalize_teams(&mut self, now: Instant) {
        self.scheduler.cancel_scope(TimerScope::Selection);
        self.join_countdown = None;

        let eligible = self.services.roster.queued_players();
        match self.teams.finalize(&eligible) {
            Ok(split) => {
                for &player in split.seekers.iter().chain(&split.runners) {
                    self.events.emit(GameEvent::TeamChanged {
                        player,
                        role: self.teams.role(player),
                    });
                }
                self.services.roster.mark_queued_as_in_game();
                self.request_transition(MatchState::Gameplay, now);
            },
            Err(e) => {
                tracing::warn!(error = %e, "Team selection aborted");
                self.request_transition(MatchState::Lobby, now);
            },
        }
    }

    fn leave_results(&mut self, now: Instant) {
        if self.state != MatchState::Results {
            return;
        }
        self.services.roster.mark_in_game_as_queued();
        let target = if self.enough_players() {
            MatchState::TeamSelection
        } else {
            MatchState::Lobby
        };
        self.request_transition(target, now);
    }
}

impl GameStateLifecycle<ManualScheduler> {
    /// Fire every timer due up to `t` on the simulated clock.
    pub fn run_until(&mut self, t: Duration) {
        while let Some(fired) = self.scheduler.next_due(t) {
            let now = self.scheduler.now();
            self.on_timer(fired, now);
        }
        self.scheduler.advance_to(t);
    }

    pub fn run_for(&mut self, d: Duration) {
        let t = self.scheduler.elapsed() + d;
        self.run_until(t);
    }

    pub fn now(&self) -> Instant {
        self.scheduler.now()
    }
}
