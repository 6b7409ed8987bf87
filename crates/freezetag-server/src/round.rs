use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use freezetag_arena::{
    BoundaryMonitor, DetectionEngine, FreezeOutcome, FreezeTracker, LineOfSight, TeamAssigner,
};
use freezetag_core::config::{GameConfig, RoundConfig};
use freezetag_core::events::{EventHub, GameEvent};
use freezetag_core::player::{PlayerId, Role};
use freezetag_core::round::{EndReason, PhaseData, RoundPhase, RoundSummary, Winner};
use freezetag_core::services::Services;

use crate::timers::{Scheduler, TimerKind, TimerScope};

const SECOND: Duration = Duration::from_secs(1);

/// Everything a round borrows from its owner for the duration of one call.
pub struct RoundEnv<'a> {
    pub teams: &'a TeamAssigner,
    pub services: &'a Services,
    pub sight: &'a dyn LineOfSight,
    pub events: &'a mut EventHub,
    pub scheduler: &'a mut dyn Scheduler,
    pub now: Instant,
}

/// Drives one round through Countdown, Hiding and Active, and terminates
/// it exactly once.
///
/// Every method that can end the round returns the summary when, and only
/// when, that call was the one that ended it.
pub struct RoundController {
    id: Uuid,
    config: RoundConfig,
    rescue_radius: f32,
    phase: RoundPhase,
    countdown: u32,
    tracker: FreezeTracker,
    detection: DetectionEngine,
    boundary: BoundaryMonitor,
    last_boundary_tick: Option<Instant>,
    active_since: Option<Instant>,
    last_final_tick: Option<u32>,
    summary: Option<RoundSummary>,
}

impl RoundController {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config: config.round.clone(),
            rescue_radius: config.rescue.radius,
            phase: RoundPhase::None,
            countdown: 0,
            tracker: FreezeTracker::new(),
            detection: DetectionEngine::new(config.detection.clone()),
            boundary: BoundaryMonitor::new(config.boundary.clone()),
            last_boundary_tick: None,
            active_since: None,
            last_final_tick: None,
            summary: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_ended(&self) -> bool {
        self.summary.is_some()
    }

    pub fn summary(&self) -> Option<&RoundSummary> {
        self.summary.as_ref()
    }

    pub fn tracker(&self) -> &FreezeTracker {
        &self.tracker
    }

    pub fn boundary(&self) -> &BoundaryMonitor {
        &self.boundary
    }

    /// Time spent in Active so far.
    pub fn active_elapsed(&self, now: Instant) -> Duration {
        self.active_since
            .map_or(Duration::ZERO, |since| now.saturating_duration_since(since))
    }

    /// Spawn every participant, lock them in place and open the countdown.
    pub fn start(&mut self, env: &mut RoundEnv<'_>) -> Option<RoundSummary> {
        tracing::info!(
            round_id = %self.id,
            seekers = ?env.teams.seekers(),
            runners = ?env.teams.runners(),
            "Round starting"
        );
        for player in env.teams.participants() {
            if let Some(class) = env.teams.role(player).spawn_class() {
                env.services.spawns.spawn_at(player, class);
            }
            env.services.movement.set_movement_locked(player, true);
        }
        self.enter_phase(RoundPhase::Countdown, env)
    }

    pub fn on_timer(&mut self, kind: TimerKind, env: &mut RoundEnv<'_>) -> Option<RoundSummary> {
        if self.is_ended() {
            return None;
        }
        match kind {
            TimerKind::PhaseCountdown => self.on_countdown(env),
            TimerKind::RoundClock => self.on_round_clock(env),
            TimerKind::DetectionTick => self.on_detection(env),
            TimerKind::BoundaryTick => self.on_boundary(env),
            TimerKind::LobbyCheck | TimerKind::SelectionTick | TimerKind::ResultsDone => None,
        }
    }

    fn enter_phase(&mut self, phase: RoundPhase, env: &mut RoundEnv<'_>) -> Option<RoundSummary> {
        if phase <= self.phase {
            tracing::warn!(from = %self.phase, to = %phase, "Phase cannot move backwards");
            return None;
        }
        env.scheduler.cancel_scope(TimerScope::Phase);
        self.phase = phase;

        let duration_secs = match phase {
            RoundPhase::None => 0,
            RoundPhase::Countdown => self.config.countdown_secs,
            RoundPhase::Hiding => self.config.hiding_secs,
            RoundPhase::Active => self.config.round_secs,
        };

        match phase {
            RoundPhase::Hiding => {
                for runner in env.teams.runners() {
                    env.services.movement.set_movement_locked(runner, false);
                }
                self.tracker.set_armed(true);
                self.last_boundary_tick = Some(env.now);
                env.scheduler
                    .schedule_every(TimerKind::BoundaryTick, self.boundary.config().tick_interval());
            },
            RoundPhase::Active => {
                for seeker in env.teams.seekers() {
                    if !self.tracker.is_frozen(seeker) {
                        env.services.movement.set_movement_locked(seeker, false);
                    }
                }
                self.active_since = Some(env.now);
                env.scheduler
                    .schedule_every(TimerKind::RoundClock, self.config.timer_update_interval());
                env.scheduler.schedule_every(
                    TimerKind::DetectionTick,
                    self.detection.config().tick_interval(),
                );
            },
            RoundPhase::None | RoundPhase::Countdown => {},
        }

        tracing::info!(round_id = %self.id, %phase, duration_secs, "Phase started");
        env.events.emit(GameEvent::PhaseChanged {
            phase,
            data: PhaseData {
                duration_secs,
                seekers: env.teams.seekers(),
                runners: env.teams.runners(),
            },
        });

        if phase == RoundPhase::Active {
            return self.on_round_clock(env);
        }

        self.countdown = duration_secs;
        env.events.emit(GameEvent::CountdownTick {
            seconds_remaining: duration_secs,
            phase,
        });
        if duration_secs == 0 {
            return self.advance(env);
        }
        env.scheduler.schedule_every(TimerKind::PhaseCountdown, SECOND);
        None
    }

    fn advance(&mut self, env: &mut RoundEnv<'_>) -> Option<RoundSummary> {
        match self.phase.next() {
            Some(next) => self.enter_phase(next, env),
            None => None,
        }
    }

    fn on_countdown(&mut self, env: &mut RoundEnv<'_>) -> Option<RoundSummary> {
        if !matches!(self.phase, RoundPhase::Countdown | RoundPhase::Hiding) {
            return None;
        }
        self.countdown = self.countdown.saturating_sub(1);
        env.events.emit(GameEvent::CountdownTick {
            seconds_remaining: self.countdown,
            phase: self.phase,
        });
        if self.countdown == 0 {
            return self.advance(env);
        }
        None
    }

    fn on_round_clock(&mut self, env: &mut RoundEnv<'_>) -> Option<RoundSummary> {
        if self.phase != RoundPhase::Active {
            return None;
        }
        let elapsed = self.active_elapsed(env.now).as_secs_f64();
        let remaining = (f64::from(self.config.round_secs) - elapsed).max(0.0);
        env.events.emit(GameEvent::RoundTimerUpdate {
            seconds_remaining: remaining as f32,
        });

        let whole = remaining.ceil() as u32;
        if whole <= self.config.final_countdown_secs && self.last_final_tick != Some(whole) {
            self.last_final_tick = Some(whole);
            env.events.emit(GameEvent::CountdownTick {
                seconds_remaining: whole,
                phase: RoundPhase::Active,
            });
        }

        if remaining <= 0.0 {
            return self.end_round(Winner::Runners, EndReason::TimeUp, env);
        }
        None
    }

    fn on_detection(&mut self, env: &mut RoundEnv<'_>) -> Option<RoundSummary> {
        if self.phase != RoundPhase::Active {
            return None;
        }
        let hits = self.detection.tick(
            env.teams,
            &mut self.tracker,
            env.services,
            env.sight,
            env.events,
        );
        for hit in &hits {
            tracing::info!(
                round_id = %self.id,
                seeker = hit.seeker,
                runner = hit.runner,
                "Runner caught"
            );
            env.services.movement.set_movement_locked(hit.runner, true);
        }
        if hits.iter().any(|h| h.all_runners_frozen) {
            return self.end_round(Winner::Seekers, EndReason::AllFrozen, env);
        }
        None
    }

    fn on_boundary(&mut self, env: &mut RoundEnv<'_>) -> Option<RoundSummary> {
        if !self.phase.allows_movement() {
            return None;
        }
        // Late ticks still accrue exposure for the full wall-clock gap.
        let dt = match self.last_boundary_tick.replace(env.now) {
            Some(last) => env.now.saturating_duration_since(last),
            None => self.boundary.config().tick_interval(),
        };
        let frozen = self.boundary.tick(
            dt.as_secs_f32(),
            env.teams,
            &mut self.tracker,
            env.services,
            env.events,
        );
        for (player, outcome) in &frozen {
            if outcome.froze() {
                env.services.movement.set_movement_locked(*player, true);
            }
        }
        let all_frozen = frozen.iter().any(|(_, outcome)| {
            matches!(
                outcome,
                FreezeOutcome::Frozen {
                    all_runners_frozen: true
                }
            )
        });
        if all_frozen {
            return self.end_round(Winner::Seekers, EndReason::AllFrozen, env);
        }
        None
    }

    /// Terminate the round. Only the first call has any effect.
    pub fn end_round(
        &mut self,
        winner: Winner,
        reason: EndReason,
        env: &mut RoundEnv<'_>,
    ) -> Option<RoundSummary> {
        if self.is_ended() {
            tracing::debug!(round_id = %self.id, %reason, "Round already ended");
            return None;
        }
        env.scheduler.cancel_scope(TimerScope::Phase);
        env.scheduler.cancel_scope(TimerScope::Systems);

        let frozen_count = self.tracker.frozen_runner_count(env.teams) as u32;
        let total_runners = env.teams.runners().len() as u32;
        let duration_secs = self.active_elapsed(env.now).as_secs_f32();

        self.tracker.reset_all(env.events);
        self.tracker.set_armed(false);
        self.boundary.reset();
        for player in env.teams.participants() {
            env.services.movement.set_movement_locked(player, false);
        }

        let summary = RoundSummary {
            winner,
            reason,
            frozen_count,
            total_runners,
            duration_secs,
        };
        self.summary = Some(summary.clone());
        tracing::info!(
            round_id = %self.id,
            %winner,
            %reason,
            frozen_count,
            total_runners,
            duration_secs,
            "Round ended"
        );
        env.events.emit(GameEvent::RoundEnded(summary.clone()));
        Some(summary)
    }

    /// Clean up after a player who left mid-round. `role` is the role they
    /// held; they must already be gone from the team assigner.
    pub fn player_removed(
        &mut self,
        player: PlayerId,
        role: Role,
        env: &mut RoundEnv<'_>,
    ) -> Option<RoundSummary> {
        if self.is_ended() {
            return None;
        }
        if self.tracker.remove_player(player, env.events) {
            env.services.movement.set_movement_locked(player, false);
        }
        self.boundary.remove_player(player);

        match role {
            Role::Seeker if env.teams.seekers().is_empty() => {
                self.end_round(Winner::Runners, EndReason::SeekersDisconnected, env)
            },
            Role::Runner if env.teams.runners().is_empty() => {
                self.end_round(Winner::Seekers, EndReason::RunnersDisconnected, env)
            },
            Role::Runner if self.tracker.all_runners_frozen(env.teams) => {
                self.end_round(Winner::Seekers, EndReason::AllFrozen, env)
            },
            _ => None,
        }
    }

    /// Unfreeze `target` if `rescuer` is an active Runner standing close
    /// enough. Returns true if the rescue happened.
    pub fn rescue(&mut self, rescuer: PlayerId, target: PlayerId, env: &mut RoundEnv<'_>) -> bool {
        if self.is_ended() || !self.phase.allows_movement() {
            tracing::debug!(rescuer, target, phase = %self.phase, "Rescue outside live play");
            return false;
        }
        if !env.teams.is_runner(rescuer) || self.tracker.is_frozen(rescuer) {
            tracing::debug!(rescuer, target, "Rescuer cannot rescue");
            return false;
        }
        if !env.teams.is_runner(target) || !self.tracker.is_frozen(target) {
            tracing::debug!(rescuer, target, "Rescue target is not a frozen runner");
            return false;
        }
        let (Some(a), Some(b)) = (
            env.services.bodies.pose(rescuer),
            env.services.bodies.pose(target),
        ) else {
            tracing::debug!(rescuer, target, "Rescue without poses");
            return false;
        };
        let distance = a.center.horizontal_distance(b.center);
        if distance > self.rescue_radius {
            tracing::debug!(rescuer, target, distance, "Rescue out of reach");
            return false;
        }
        if !self.tracker.unfreeze(target, Some(rescuer), env.events) {
            return false;
        }
        env.services.movement.set_movement_locked(target, false);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freezetag_arena::detection::OpenField;
    use freezetag_core::events::EventKind;
    use freezetag_core::geometry::Vec3;
    use freezetag_core::player::FreezeCause;
    use freezetag_core::services::memory::InMemoryServices;
    use freezetag_core::test_helpers::{EventRecorder, pose_at, scenario_config};

    use crate::timers::ManualScheduler;

    const SEEKER: PlayerId = 1;
    const RUNNERS: [PlayerId; 3] = [2, 3, 4];

    struct Fixture {
        round: RoundController,
        teams: TeamAssigner,
        mem: InMemoryServices,
        services: Services,
        events: EventHub,
        rec: EventRecorder,
        scheduler: ManualScheduler,
    }

    fn fixture(config: &GameConfig) -> Fixture {
        let mut teams = TeamAssigner::with_seed(1, 2, 0);
        teams.force_role(SEEKER, Role::Seeker);
        for r in RUNNERS {
            teams.force_role(r, Role::Runner);
        }
        let mem = InMemoryServices::new();
        let services = mem.services();
        let mut events = EventHub::new();
        let rec = EventRecorder::attach(&mut events);
        Fixture {
            round: RoundController::new(config),
            teams,
            mem,
            services,
            events,
            rec,
            scheduler: ManualScheduler::new(),
        }
    }

    impl Fixture {
        fn with_env<R>(&mut self, f: impl FnOnce(&mut RoundController, &mut RoundEnv<'_>) -> R) -> R {
            let now = self.scheduler.now();
            let mut env = RoundEnv {
                teams: &self.teams,
                services: &self.services,
                sight: &OpenField,
                events: &mut self.events,
                scheduler: &mut self.scheduler,
                now,
            };
            f(&mut self.round, &mut env)
        }

        fn start(&mut self) {
            self.with_env(|round, env| round.start(env));
        }

        /// Fire every due timer up to `secs` of simulated time.
        fn run_until(&mut self, secs: f64) -> Vec<RoundSummary> {
            let deadline = Duration::from_secs_f64(secs);
            let mut ended = Vec::new();
            while let Some(fired) = self.scheduler.next_due(deadline) {
                if !self.scheduler.accept(&fired) {
                    continue;
                }
                if let Some(s) = self.with_env(|round, env| round.on_timer(fired.kind, env)) {
                    ended.push(s);
                }
            }
            self.scheduler.advance_to(deadline);
            ended
        }

        fn countdown_ticks(&self, phase: RoundPhase) -> Vec<u32> {
            self.rec
                .of_kind(EventKind::CountdownTick)
                .into_iter()
                .filter_map(|e| match e {
                    GameEvent::CountdownTick {
                        seconds_remaining,
                        phase: p,
                    } if p == phase => Some(seconds_remaining),
                    _ => None,
                })
                .collect()
        }

        fn place(&self, player: PlayerId, x: f32, z: f32) {
            self.mem
                .world
                .set_pose(player, pose_at(x, z, Vec3::new(1.0, 0.0, 0.0)));
        }

        /// Seeker at the origin looking along +X, runners out of sight behind it.
        fn face_off(&self) {
            self.mem.world.set_tool_equipped(SEEKER, true);
            self.place(SEEKER, 0.0, 0.0);
            for (i, r) in RUNNERS.iter().enumerate() {
                self.place(*r, -10.0, i as f32 * 2.0);
            }
        }

        fn freeze(&mut self, player: PlayerId) {
            let Fixture {
                round,
                teams,
                services,
                events,
                ..
            } = self;
            round.tracker.freeze(
                player,
                FreezeCause::Environment,
                teams,
                services.effects.as_ref(),
                events,
            );
        }
    }

    #[test]
    fn phases_tick_down_and_advance() {
        let mut f = fixture(&scenario_config());
        f.start();
        assert_eq!(f.round.phase(), RoundPhase::Countdown);
        assert_eq!(f.countdown_ticks(RoundPhase::Countdown), vec![5]);

        f.run_until(5.0);
        assert_eq!(f.countdown_ticks(RoundPhase::Countdown), vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(f.round.phase(), RoundPhase::Hiding);

        f.run_until(20.0);
        let hiding: Vec<u32> = (0..=15).rev().collect();
        assert_eq!(f.countdown_ticks(RoundPhase::Hiding), hiding);
        assert_eq!(f.round.phase(), RoundPhase::Active);
    }

    #[test]
    fn phase_changes_are_monotonic() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.run_until(400.0);
        let phases: Vec<RoundPhase> = f
            .rec
            .of_kind(EventKind::PhaseChanged)
            .into_iter()
            .filter_map(|e| match e {
                GameEvent::PhaseChanged { phase, .. } => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![RoundPhase::Countdown, RoundPhase::Hiding, RoundPhase::Active]
        );
    }

    #[test]
    fn movement_locks_follow_phases() {
        let mut f = fixture(&scenario_config());
        f.start();
        let world = std::sync::Arc::clone(&f.mem.world);
        assert!(world.is_movement_locked(SEEKER));
        assert!(world.is_movement_locked(RUNNERS[0]));

        f.run_until(5.0);
        assert!(world.is_movement_locked(SEEKER), "seekers wait through hiding");
        assert!(!world.is_movement_locked(RUNNERS[0]));

        f.run_until(20.0);
        assert!(!world.is_movement_locked(SEEKER));
    }

    #[test]
    fn zero_hiding_skips_straight_to_active() {
        let mut config = scenario_config();
        config.round.hiding_secs = 0;
        let mut f = fixture(&config);
        f.start();
        f.run_until(5.0);
        assert_eq!(f.round.phase(), RoundPhase::Active);
        assert_eq!(f.countdown_ticks(RoundPhase::Hiding), vec![0]);
        assert!(f.round.tracker().is_armed());
    }

    #[test]
    fn clock_runs_out_for_runners() {
        let mut f = fixture(&scenario_config());
        f.start();
        let ended = f.run_until(20.0 + 180.0);
        assert_eq!(ended.len(), 1);
        let summary = &ended[0];
        assert_eq!(summary.winner, Winner::Runners);
        assert_eq!(summary.reason, EndReason::TimeUp);
        assert_eq!(summary.total_runners, 3);
        assert!((summary.duration_secs - 180.0).abs() < 1e-3);

        let finals = f.countdown_ticks(RoundPhase::Active);
        let expected: Vec<u32> = (0..=15).rev().collect();
        assert_eq!(finals, expected);
        assert_eq!(f.scheduler.live_count(), 0, "every round timer is cancelled");
    }

    #[test]
    fn detection_win_reports_duration() {
        let mut f = fixture(&scenario_config());
        f.mem.world.set_tool_equipped(SEEKER, true);
        f.start();
        f.run_until(20.0);
        assert_eq!(f.round.phase(), RoundPhase::Active);

        // Seeker looks along +X; runners hide behind it.
        f.mem
            .world
            .set_pose(SEEKER, pose_at(0.0, 0.0, Vec3::new(1.0, 0.0, 0.0)));
        for (i, r) in RUNNERS.iter().enumerate() {
            f.mem
                .world
                .set_pose(*r, pose_at(-10.0, i as f32 * 2.0, Vec3::new(1.0, 0.0, 0.0)));
        }
        assert!(f.run_until(20.0 + 89.95).is_empty());

        for (i, r) in RUNNERS.iter().enumerate() {
            f.mem
                .world
                .set_pose(*r, pose_at(10.0, i as f32 - 1.0, Vec3::new(1.0, 0.0, 0.0)));
        }
        let ended = f.run_until(20.0 + 95.0);
        assert_eq!(ended.len(), 1);
        let s = &ended[0];
        assert_eq!((s.winner, s.reason), (Winner::Seekers, EndReason::AllFrozen));
        assert_eq!((s.frozen_count, s.total_runners), (3, 3));
        assert!((s.duration_secs - 90.0).abs() < 1e-3, "{}", s.duration_secs);
        assert_eq!(f.rec.count(EventKind::PlayerUnfrozen), 3, "reset thaws everyone");
    }

    #[test]
    fn termination_happens_once() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.run_until(30.0);
        let first = f.with_env(|round, env| round.end_round(Winner::Runners, EndReason::TimeUp, env));
        assert!(first.is_some());
        for _ in 0..5 {
            let again = f.with_env(|round, env| {
                round.end_round(Winner::Seekers, EndReason::AllFrozen, env)
            });
            assert!(again.is_none());
        }
        assert!(f.run_until(400.0).is_empty());
        assert_eq!(f.rec.round_summaries().len(), 1);
    }

    #[test]
    fn last_seeker_leaving_hands_runners_the_win() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.run_until(25.0);
        f.teams.remove_player(SEEKER);
        let s = f
            .with_env(|round, env| round.player_removed(SEEKER, Role::Seeker, env))
            .unwrap();
        assert_eq!(
            (s.winner, s.reason),
            (Winner::Runners, EndReason::SeekersDisconnected)
        );
    }

    #[test]
    fn last_runners_leaving_hands_seekers_the_win() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.run_until(25.0);
        for r in &RUNNERS[..2] {
            f.teams.remove_player(*r);
            assert!(f.with_env(|round, env| round.player_removed(*r, Role::Runner, env)).is_none());
        }
        f.teams.remove_player(RUNNERS[2]);
        let s = f
            .with_env(|round, env| round.player_removed(RUNNERS[2], Role::Runner, env))
            .unwrap();
        assert_eq!(
            (s.winner, s.reason),
            (Winner::Seekers, EndReason::RunnersDisconnected)
        );
        assert_eq!(s.total_runners, 0);
    }

    #[test]
    fn leaving_unfrozen_runner_can_complete_the_freeze() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.run_until(25.0);
        f.freeze(RUNNERS[0]);
        f.freeze(RUNNERS[1]);
        f.teams.remove_player(RUNNERS[2]);
        let s = f
            .with_env(|round, env| round.player_removed(RUNNERS[2], Role::Runner, env))
            .unwrap();
        assert_eq!((s.winner, s.reason), (Winner::Seekers, EndReason::AllFrozen));
        assert_eq!((s.frozen_count, s.total_runners), (2, 2));
    }

    #[test]
    fn rescue_needs_reach_and_a_free_runner() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.run_until(25.0);
        let (a, b) = (RUNNERS[0], RUNNERS[1]);
        f.mem.world.set_pose(a, pose_at(0.0, 0.0, Vec3::new(1.0, 0.0, 0.0)));
        f.mem.world.set_pose(b, pose_at(3.5, 0.0, Vec3::new(1.0, 0.0, 0.0)));
        f.freeze(b);

        assert!(!f.with_env(|round, env| round.rescue(a, b, env)), "out of reach");
        f.mem.world.set_pose(b, pose_at(3.0, 0.0, Vec3::new(1.0, 0.0, 0.0)));
        assert!(!f.with_env(|round, env| round.rescue(SEEKER, b, env)), "seekers cannot");
        assert!(f.with_env(|round, env| round.rescue(a, b, env)), "reach is inclusive");
        assert!(!f.round.tracker().is_frozen(b));

        let unfrozen = f.rec.of_kind(EventKind::PlayerUnfrozen);
        assert_eq!(
            unfrozen,
            vec![GameEvent::PlayerUnfrozen {
                player: b,
                rescuer: Some(a)
            }]
        );
    }

    #[test]
    fn countdown_has_no_freezes() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.freeze(RUNNERS[0]);
        assert!(!f.round.tracker().is_frozen(RUNNERS[0]));
    }

    #[test]
    fn caught_runner_stays_locked_until_rescued() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.run_until(20.0);
        f.face_off();
        let (a, b) = (RUNNERS[0], RUNNERS[1]);

        f.place(b, 10.0, 0.0);
        f.run_until(20.5);
        assert!(f.round.tracker().is_frozen(b));
        assert!(f.mem.world.is_movement_locked(b));
        assert!(!f.mem.world.is_movement_locked(a));

        f.place(b, -20.0, 0.0);
        f.place(a, -22.0, 0.0);
        assert!(f.with_env(|round, env| round.rescue(a, b, env)));
        assert!(!f.mem.world.is_movement_locked(b));
    }

    #[test]
    fn leaving_frozen_runner_is_unlocked() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.run_until(20.0);
        f.face_off();
        let b = RUNNERS[1];
        f.place(b, 10.0, 0.0);
        f.run_until(20.5);
        assert!(f.mem.world.is_movement_locked(b));

        f.teams.remove_player(b);
        assert!(f.with_env(|round, env| round.player_removed(b, Role::Runner, env)).is_none());
        assert!(!f.mem.world.is_movement_locked(b));
    }

    #[test]
    fn boundary_freeze_keeps_runner_locked_into_active() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.run_until(5.0);
        f.place(RUNNERS[0], 130.0, 0.0);
        f.run_until(16.0);
        assert!(f.round.tracker().is_frozen(RUNNERS[0]));

        f.run_until(20.0);
        assert_eq!(f.round.phase(), RoundPhase::Active);
        assert!(f.mem.world.is_movement_locked(RUNNERS[0]));
        assert!(!f.mem.world.is_movement_locked(RUNNERS[1]));
        assert!(!f.mem.world.is_movement_locked(SEEKER));
    }

    #[test]
    fn late_boundary_tick_accrues_the_whole_gap() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.run_until(5.0);
        assert_eq!(f.round.phase(), RoundPhase::Hiding);
        f.place(RUNNERS[0], 110.0, 0.0);

        // Half a second passes before the first tick is serviced.
        f.scheduler.advance_to(Duration::from_millis(5_500));
        f.with_env(|round, env| round.on_timer(TimerKind::BoundaryTick, env));
        let exposure = f.round.boundary().exposure(RUNNERS[0]);
        assert!((exposure - 5.0).abs() < 1e-3, "exposure was {exposure}");
    }

    #[test]
    fn all_frozen_needs_every_runner_at_once() {
        let mut f = fixture(&scenario_config());
        f.start();
        f.run_until(20.0);
        f.face_off();
        let [a, b, c] = RUNNERS;

        f.place(a, 10.0, 0.0);
        assert!(f.run_until(20.5).is_empty());
        f.place(a, -20.0, 0.0);
        f.place(b, 10.0, 0.0);
        assert!(f.run_until(21.0).is_empty());
        assert_eq!(f.round.tracker().frozen_runner_count(&f.teams), 2);

        // c thaws b, then b is caught again while c is still free.
        f.place(b, -20.0, 2.0);
        f.place(c, -20.0, 4.0);
        assert!(f.with_env(|round, env| round.rescue(c, b, env)));
        f.place(b, 10.0, 0.0);
        assert!(f.run_until(21.5).is_empty(), "one runner is still free");
        assert_eq!(f.round.tracker().frozen_runner_count(&f.teams), 2);
        assert!(!f.round.is_ended());

        f.place(c, 10.0, 1.0);
        let ended = f.run_until(22.0);
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].reason, EndReason::AllFrozen);
        assert_eq!(ended[0].frozen_count, 3);

        // The reset thaw and any later rescue leave the result alone.
        f.place(a, -20.0, 3.0);
        assert!(!f.with_env(|round, env| round.rescue(c, a, env)));
        assert!(f.run_until(400.0).is_empty());
        assert_eq!(f.rec.round_summaries().len(), 1);
    }
}
