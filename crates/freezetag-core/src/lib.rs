pub mod config;
pub mod events;
pub mod geometry;
pub mod match_state;
pub mod net;
pub mod player;
pub mod powerup;
pub mod round;
pub mod services;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::sync::{Arc, Mutex, PoisonError};

    use crate::config::GameConfig;
    use crate::events::{EventHub, EventKind, GameEvent};
    use crate::geometry::{BodyPose, Vec3};
    use crate::player::PlayerId;
    use crate::round::RoundSummary;
    use crate::services::Roster;
    use crate::services::memory::InMemoryServices;

    /// Sequential player ids starting at 1.
    pub fn make_players(n: usize) -> Vec<PlayerId> {
        (1..=n as PlayerId).collect()
    }

    /// In-memory services with `n` players already queued.
    pub fn queued_services(n: usize) -> InMemoryServices {
        let mem = InMemoryServices::new();
        for id in make_players(n) {
            mem.roster.enqueue(id);
        }
        mem
    }

    /// A standing body at ground position `(x, z)` facing `facing`.
    pub fn pose_at(x: f32, z: f32, facing: Vec3) -> BodyPose {
        BodyPose::new(Vec3::new(x, 1.0, z), facing)
    }

    /// Config with the round timings used by the end-to-end scenario:
    /// 5 s countdown, 15 s hiding, 180 s round, one Seeker.
    pub fn scenario_config() -> GameConfig {
        let mut config = GameConfig::default();
        config.lifecycle.seeker_count = 1;
        config.round.countdown_secs = 5;
        config.round.hiding_secs = 15;
        config.round.round_secs = 180;
        config
    }

    /// Records every event delivered through an [`EventHub`].
    #[derive(Debug, Clone, Default)]
    pub struct EventRecorder {
        events: Arc<Mutex<Vec<GameEvent>>>,
    }

    impl EventRecorder {
        /// Subscribe a new recorder to all events on `hub`.
        pub fn attach(hub: &mut EventHub) -> Self {
            let recorder = Self::default();
            let sink = Arc::clone(&recorder.events);
            hub.subscribe_all(move |e| {
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(e.clone());
            });
            recorder
        }

        pub fn events(&self) -> Vec<GameEvent> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn of_kind(&self, kind: EventKind) -> Vec<GameEvent> {
            self.events()
                .into_iter()
                .filter(|e| e.kind() == kind)
                .collect()
        }

        pub fn count(&self, kind: EventKind) -> usize {
            self.of_kind(kind).len()
        }

        pub fn round_summaries(&self) -> Vec<RoundSummary> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    GameEvent::RoundEnded(summary) => Some(summary),
                    _ => None,
                })
                .collect()
        }

        pub fn clear(&self) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }
}
