//! End-to-end rounds driven through the match actor on paused time.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::time::Instant;

use freezetag_arena::detection::OpenField;
use freezetag_core::geometry::Vec3;
use freezetag_core::match_state::MatchState;
use freezetag_core::net::messages::ServerMessage;
use freezetag_core::net::protocol::decode_server_message;
use freezetag_core::player::{PlayerId, Role};
use freezetag_core::round::{EndReason, RoundPhase, RoundSummary, Winner};
use freezetag_core::services::memory::InMemoryServices;
use freezetag_core::test_helpers::{pose_at, scenario_config};

use freezetag_server::game_loop::{MatchCommand, MatchHandle, MatchSetup, spawn_match};

const PLAYERS: [PlayerId; 4] = [1, 2, 3, 4];

struct Scenario {
    mem: InMemoryServices,
    handle: MatchHandle,
    rx: broadcast::Receiver<Bytes>,
    seekers: Vec<PlayerId>,
    runners: Vec<PlayerId>,
}

impl Scenario {
    fn start() -> Self {
        let mem = InMemoryServices::new();
        let (tx, rx) = broadcast::channel(8192);
        let handle = spawn_match(
            MatchSetup {
                config: scenario_config(),
                services: mem.clone(),
                sight: Arc::new(OpenField),
                seed: Some(11),
            },
            tx,
        );
        for player_id in PLAYERS {
            handle
                .commands
                .send(MatchCommand::PlayerJoined { player_id })
                .unwrap();
        }
        Self {
            mem,
            handle,
            rx,
            seekers: Vec::new(),
            runners: Vec::new(),
        }
    }

    async fn next(&mut self) -> ServerMessage {
        let data = self.rx.recv().await.unwrap();
        decode_server_message(&data).unwrap()
    }

    /// Consume messages until `pred` matches, recording team assignments.
    async fn until(&mut self, mut pred: impl FnMut(&ServerMessage) -> bool) -> ServerMessage {
        loop {
            let msg = self.next().await;
            if let ServerMessage::TeamChanged(t) = &msg {
                match t.role {
                    Role::Seeker => self.seekers.push(t.player_id),
                    Role::Runner => self.runners.push(t.player_id),
                    Role::Spectator => {},
                }
            }
            if pred(&msg) {
                return msg;
            }
        }
    }

    async fn until_phase(&mut self, phase: RoundPhase) {
        self.until(|m| matches!(m, ServerMessage::PhaseChanged(p) if p.phase == phase))
            .await;
    }

    async fn until_round_end(&mut self) -> RoundSummary {
        match self
            .until(|m| matches!(m, ServerMessage::RoundEnded(_)))
            .await
        {
            ServerMessage::RoundEnded(r) => r.summary,
            _ => unreachable!(),
        }
    }

    fn place_runners(&self, x: f32) {
        for (i, r) in self.runners.iter().enumerate() {
            self.mem
                .world
                .set_pose(*r, pose_at(x, i as f32 - 1.0, Vec3::new(1.0, 0.0, 0.0)));
        }
    }

    async fn stop(self) {
        self.handle.commands.send(MatchCommand::Stop).unwrap();
        self.handle.task.await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn seeker_freezes_everyone_ninety_seconds_in() {
    let mut s = Scenario::start();

    s.until_phase(RoundPhase::Countdown).await;
    assert_eq!(s.seekers.len(), 1);
    assert_eq!(s.runners.len(), 3);
    let seeker = s.seekers[0];

    s.mem.world.set_tool_equipped(seeker, true);
    s.mem
        .world
        .set_pose(seeker, pose_at(0.0, 0.0, Vec3::new(1.0, 0.0, 0.0)));
    s.place_runners(-10.0);

    s.until_phase(RoundPhase::Active).await;
    let active_at = Instant::now();

    tokio::time::sleep_until(active_at + Duration::from_millis(89_950)).await;
    s.place_runners(10.0);

    let summary = s.until_round_end().await;
    assert_eq!(summary.winner, Winner::Seekers);
    assert_eq!(summary.reason, EndReason::AllFrozen);
    assert_eq!(summary.frozen_count, 3);
    assert_eq!(summary.total_runners, 3);
    assert!(
        (summary.duration_secs - 90.0).abs() < 0.05,
        "duration was {}",
        summary.duration_secs
    );

    // Results, then the next join window. No second summary for this round.
    let mut extra_ends = 0;
    loop {
        match s.next().await {
            ServerMessage::RoundEnded(_) => extra_ends += 1,
            ServerMessage::StateChanged(c) if c.new == MatchState::TeamSelection => break,
            _ => {},
        }
    }
    assert_eq!(extra_ends, 0);
    s.stop().await;
}

#[tokio::test(start_paused = true)]
async fn runners_win_when_time_runs_out() {
    let mut s = Scenario::start();
    s.until_phase(RoundPhase::Active).await;
    let active_at = Instant::now();

    let mut final_ticks = Vec::new();
    let summary = loop {
        match s.next().await {
            ServerMessage::CountdownTick(t) if t.phase == RoundPhase::Active => {
                final_ticks.push(t.seconds_remaining);
            },
            ServerMessage::RoundEnded(r) => break r.summary,
            _ => {},
        }
    };

    assert_eq!(summary.winner, Winner::Runners);
    assert_eq!(summary.reason, EndReason::TimeUp);
    assert_eq!(summary.frozen_count, 0);
    assert_eq!(final_ticks, (0..=15).rev().collect::<Vec<_>>());
    assert_eq!(Instant::now() - active_at, Duration::from_secs(180));
    s.stop().await;
}

#[tokio::test(start_paused = true)]
async fn seeker_leaving_hands_round_to_runners() {
    let mut s = Scenario::start();
    s.until_phase(RoundPhase::Hiding).await;
    let seeker = s.seekers[0];

    s.handle
        .commands
        .send(MatchCommand::PlayerLeft { player_id: seeker })
        .unwrap();
    let summary = s.until_round_end().await;
    assert_eq!(summary.winner, Winner::Runners);
    assert_eq!(summary.reason, EndReason::SeekersDisconnected);
    s.stop().await;
}

#[tokio::test(start_paused = true)]
async fn rescue_through_actor_unfreezes_teammate() {
    let mut s = Scenario::start();
    s.until_phase(RoundPhase::Countdown).await;
    let seeker = s.seekers[0];
    let (a, b) = (s.runners[0], s.runners[1]);

    s.mem.world.set_tool_equipped(seeker, true);
    s.mem
        .world
        .set_pose(seeker, pose_at(0.0, 0.0, Vec3::new(1.0, 0.0, 0.0)));
    s.place_runners(-10.0);
    // Only `b` stands in the cone.
    s.mem
        .world
        .set_pose(b, pose_at(10.0, 0.0, Vec3::new(1.0, 0.0, 0.0)));

    s.until(|m| matches!(m, ServerMessage::PlayerFrozen(f) if f.player_id == b))
        .await;

    s.mem
        .world
        .set_pose(b, pose_at(-20.0, 0.0, Vec3::new(1.0, 0.0, 0.0)));
    s.mem
        .world
        .set_pose(a, pose_at(-22.0, 0.0, Vec3::new(1.0, 0.0, 0.0)));
    s.handle
        .commands
        .send(MatchCommand::Rescue {
            rescuer: a,
            target: b,
        })
        .unwrap();

    match s
        .until(|m| matches!(m, ServerMessage::PlayerUnfrozen(_)))
        .await
    {
        ServerMessage::PlayerUnfrozen(u) => {
            assert_eq!(u.player_id, b);
            assert_eq!(u.rescuer, Some(a));
        },
        _ => unreachable!(),
    }
    s.stop().await;
}
