use std::collections::BTreeMap;

use freezetag_core::config::BoundaryConfig;
use freezetag_core::events::{EventHub, GameEvent};
use freezetag_core::geometry::{BoundaryZone, Vec3};
use freezetag_core::player::{FreezeCause, PlayerId};
use freezetag_core::services::Services;

use crate::freeze::{FreezeOutcome, FreezeTracker};
use crate::teams::TeamAssigner;

/// Upper bound of the exposure meter.
pub const MAX_EXPOSURE: f32 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Exposure {
    level: f32,
    last_reported: f32,
}

/// Passive cold exposure for players outside the play area.
#[derive(Debug, Clone)]
pub struct BoundaryMonitor {
    config: BoundaryConfig,
    exposure: BTreeMap<PlayerId, Exposure>,
}

impl BoundaryMonitor {
    pub fn new(config: BoundaryConfig) -> Self {
        Self {
            config,
            exposure: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &BoundaryConfig {
        &self.config
    }

    /// Zone for a position, by Chebyshev distance from the center on the
    /// ground plane. Both radii are inclusive.
    pub fn classify(&self, position: Vec3) -> BoundaryZone {
        let d = (position.x - self.config.center_x)
            .abs()
            .max((position.z - self.config.center_z).abs());
        if d <= self.config.play_radius {
            BoundaryZone::Play
        } else if d <= self.config.freeze_radius {
            BoundaryZone::Freeze
        } else {
            BoundaryZone::Wall
        }
    }

    pub fn exposure(&self, player: PlayerId) -> f32 {
        self.exposure.get(&player).map_or(0.0, |e| e.level)
    }

    pub fn remove_player(&mut self, player: PlayerId) {
        self.exposure.remove(&player);
    }

    /// Drop every meter.
    pub fn reset(&mut self) {
        self.exposure.clear();
    }

    /// Advance every unfrozen participant's meter by `dt` seconds.
    /// Returns the players this tick froze.
    pub fn tick(
        &mut self,
        dt: f32,
        teams: &TeamAssigner,
        tracker: &mut FreezeTracker,
        services: &Services,
        events: &mut EventHub,
    ) -> Vec<(PlayerId, FreezeOutcome)> {
        let mut frozen = Vec::new();

        for player in teams.participants() {
            if tracker.is_frozen(player) {
                continue;
            }
            let Some(pose) = services.bodies.pose(player) else {
                tracing::trace!(player_id = player, "No pose for exposure, skipped");
                continue;
            };
            let zone = self.classify(pose.center);
            let meter = self.exposure.entry(player).or_default();
            meter.level = match zone {
                BoundaryZone::Play => (meter.level - self.config.thaw_rate * dt).max(0.0),
                BoundaryZone::Freeze | BoundaryZone::Wall => {
                    (meter.level + self.config.freeze_rate * dt).min(MAX_EXPOSURE)
                },
            };

            let level = meter.level;
            if should_report(meter, self.config.report_threshold) {
                meter.last_reported = level;
                events.emit(GameEvent::ExposureChanged {
                    player,
                    level,
                    zone,
                });
            }

            if level >= MAX_EXPOSURE {
                let outcome = tracker.freeze(
                    player,
                    FreezeCause::Environment,
                    teams,
                    services.effects.as_ref(),
                    events,
                );
                tracing::debug!(player_id = player, ?outcome, "Exposure limit reached");
                if let Some(meter) = self.exposure.get_mut(&player) {
                    meter.level = 0.0;
                    meter.last_reported = 0.0;
                }
                events.emit(GameEvent::ExposureChanged {
                    player,
                    level: 0.0,
                    zone,
                });
                frozen.push((player, outcome));
            }
        }
        frozen
    }
}

fn should_report(meter: &Exposure, threshold: f32) -> bool {
    if meter.level == meter.last_reported {
        return false;
    }
    meter.level == 0.0
        || meter.level >= MAX_EXPOSURE
        || (meter.level - meter.last_reported).abs() >= threshold
}
