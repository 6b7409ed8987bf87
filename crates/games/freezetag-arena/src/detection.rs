use smallvec::SmallVec;

use freezetag_core::config::DetectionConfig;
use freezetag_core::events::EventHub;
use freezetag_core::geometry::{BodyPose, Vec3};
use freezetag_core::player::{FreezeCause, PlayerId};
use freezetag_core::services::Services;

use crate::freeze::{FreezeOutcome, FreezeTracker};
use crate::teams::TeamAssigner;

/// Tolerance on the half-angle test, in radians.
pub const ANGLE_TOLERANCE: f32 = 1e-4;

/// Static-geometry visibility between two points. Bodies never block.
pub trait LineOfSight: Send + Sync {
    fn is_clear(&self, from: Vec3, to: Vec3) -> bool;
}

/// Line of sight with no obstacles at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenField;

impl LineOfSight for OpenField {
    fn is_clear(&self, _from: Vec3, _to: Vec3) -> bool {
        true
    }
}

/// A Seeker's cone for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cone {
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
    pub range: f32,
    /// Half of the full cone angle, radians.
    pub half_angle: f32,
}

impl Cone {
    /// Inclusive range and half-angle test. A target on the origin is never
    /// inside.
    pub fn contains(&self, target: Vec3) -> bool {
        let to = target - self.origin;
        let distance = to.length();
        if distance < 1e-6 || distance > self.range {
            return false;
        }
        self.direction
            .angle_between(to)
            .is_some_and(|angle| angle <= self.half_angle + ANGLE_TOLERANCE)
    }
}

/// A freeze landed by the detection cone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionHit {
    pub seeker: PlayerId,
    pub runner: PlayerId,
    pub all_runners_frozen: bool,
}

/// Fixed-tick cone and line-of-sight hit testing for every Seeker.
#[derive(Debug, Clone)]
pub struct DetectionEngine {
    config: DetectionConfig,
}

impl DetectionEngine {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Build the cone for `seeker`, or `None` if they cannot detect this tick.
    pub fn cone_for(&self, seeker: PlayerId, pose: &BodyPose, services: &Services) -> Option<Cone> {
        let direction = pose.facing.normalized()?;
        let origin = pose.hand.unwrap_or_else(|| {
            let forward = pose.facing.flattened().normalized().unwrap_or(Vec3::ZERO);
            pose.center + forward * self.config.hand_forward_offset
                + Vec3::UP * self.config.hand_up_offset
        });
        let (range, angle_deg) = services
            .inventory
            .detection_range_and_angle(seeker)
            .unwrap_or((self.config.default_range, self.config.default_angle_deg));
        Some(Cone {
            origin,
            direction,
            range,
            half_angle: (angle_deg * 0.5).to_radians(),
        })
    }

    /// Point on `runner` the cone aims for, lowered while crouching.
    pub fn target_point(&self, runner: PlayerId, pose: &BodyPose, services: &Services) -> Vec3 {
        if services.stance.is_crouching(runner) {
            let offset = services
                .stance
                .detection_height_offset(runner)
                .unwrap_or(self.config.crouch_offset);
            pose.center - Vec3::UP * offset
        } else {
            pose.center
        }
    }

    /// Run one detection tick. Returns the freezes it landed, in order.
    pub fn tick(
        &self,
        teams: &TeamAssigner,
        tracker: &mut FreezeTracker,
        services: &Services,
        los: &dyn LineOfSight,
        events: &mut EventHub,
    ) -> Vec<DetectionHit> {
        let mut hits = Vec::new();

        // Runner targets don't move within a tick; resolve them once.
        let targets: SmallVec<[(PlayerId, Vec3); 16]> = teams
            .runners()
            .into_iter()
            .filter_map(|r| match services.bodies.pose(r) {
                Some(pose) => Some((r, self.target_point(r, &pose, services))),
                None => {
                    tracing::trace!(player_id = r, "No pose for runner, skipped");
                    None
                },
            })
            .collect();

        for seeker in teams.seekers() {
            if tracker.is_frozen(seeker) || !services.inventory.is_tool_equipped(seeker) {
                continue;
            }
            let Some(pose) = services.bodies.pose(seeker) else {
                tracing::trace!(player_id = seeker, "No pose for seeker, skipped");
                continue;
            };
            let Some(cone) = self.cone_for(seeker, &pose, services) else {
                continue;
            };

            for &(runner, target) in &targets {
                if tracker.is_frozen(runner) || !cone.contains(target) {
                    continue;
                }
                if !los.is_clear(cone.origin, target) {
                    continue;
                }
                let outcome = tracker.freeze(
                    runner,
                    FreezeCause::Seeker(seeker),
                    teams,
                    services.effects.as_ref(),
                    events,
                );
                if let FreezeOutcome::Frozen { all_runners_frozen } = outcome {
                    hits.push(DetectionHit {
                        seeker,
                        runner,
                        all_runners_frozen,
                    });
                }
            }
        }
        hits
    }
}
