use serde::{Deserialize, Serialize};

use freezetag_core::geometry::{BodyPose, Vec3};
use freezetag_core::player::SpawnClass;
use freezetag_core::services::memory::SpawnLayout;

use crate::detection::LineOfSight;

/// Height of the perimeter walls.
pub const OUTER_WALL_HEIGHT: f32 = 6.0;
/// Height of interior cover. Low enough that a standing body's center is
/// visible over it, high enough to hide a crouching one.
pub const COVER_HEIGHT: f32 = 1.2;
/// Eye-level height of a spawned body center.
pub const SPAWN_HEIGHT: f32 = 1.0;

fn default_wall_height() -> f32 {
    OUTER_WALL_HEIGHT
}

/// A vertical wall standing on the XZ segment `a -> b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaWall {
    pub ax: f32,
    pub az: f32,
    pub bx: f32,
    pub bz: f32,
    /// Top of the wall above the ground plane.
    #[serde(default = "default_wall_height")]
    pub height: f32,
}

impl ArenaWall {
    fn new(ax: f32, az: f32, bx: f32, bz: f32, height: f32) -> Self {
        Self {
            ax,
            az,
            bx,
            bz,
            height,
        }
    }
}

/// A spawn point in the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub x: f32,
    pub z: f32,
    /// Facing on the ground plane, radians from +X toward +Z.
    pub angle: f32,
    pub class: SpawnClass,
}

impl SpawnPoint {
    pub fn pose(&self) -> BodyPose {
        BodyPose::new(
            Vec3::new(self.x, SPAWN_HEIGHT, self.z),
            Vec3::new(self.angle.cos(), 0.0, self.angle.sin()),
        )
    }
}

/// Static arena geometry. Centered on the origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arena {
    pub name: String,
    /// Half the side length of the square enclosed by the outer walls.
    pub half_extent: f32,
    pub walls: Vec<ArenaWall>,
    pub spawn_points: Vec<SpawnPoint>,
}

/// Arena size preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArenaSize {
    Small,
    Default,
    Large,
}

impl ArenaSize {
    fn file_stem(self) -> &'static str {
        match self {
            ArenaSize::Small => "small",
            ArenaSize::Default => "default",
            ArenaSize::Large => "large",
        }
    }
}

impl Arena {
    /// Spawn poses grouped by class, for the in-memory spawn service.
    pub fn spawn_layout(&self) -> SpawnLayout {
        let mut layout = SpawnLayout::default();
        for sp in &self.spawn_points {
            match sp.class {
                SpawnClass::Seeker => layout.seekers.push(sp.pose()),
                SpawnClass::Runner => layout.runners.push(sp.pose()),
            }
        }
        layout
    }

    /// Whether any wall obstructs the straight segment `from -> to`.
    ///
    /// A wall obstructs when the segment crosses its footprint at or below
    /// its top.
    pub fn segment_blocked(&self, from: Vec3, to: Vec3) -> bool {
        self.walls.iter().any(|wall| {
            segment_crossing(from.x, from.z, to.x, to.z, wall.ax, wall.az, wall.bx, wall.bz)
                .is_some_and(|t| from.y + (to.y - from.y) * t <= wall.height)
        })
    }
}

impl LineOfSight for Arena {
    fn is_clear(&self, from: Vec3, to: Vec3) -> bool {
        !self.segment_blocked(from, to)
    }
}

/// Segment-segment intersection on the XZ plane. Returns the parameter `t`
/// in `[0, 1]` along `p -> q` where it crosses `a -> b`.
#[allow(clippy::too_many_arguments)]
fn segment_crossing(
    px: f32,
    pz: f32,
    qx: f32,
    qz: f32,
    ax: f32,
    az: f32,
    bx: f32,
    bz: f32,
) -> Option<f32> {
    let dx = qx - px;
    let dz = qz - pz;
    let sx = bx - ax;
    let sz = bz - az;

    let denom = dx * sz - dz * sx;
    if denom.abs() < 1e-8 {
        return None; // parallel
    }

    let t = ((ax - px) * sz - (az - pz) * sx) / denom;
    let u = ((ax - px) * dz - (az - pz) * dx) / denom;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(t)
    } else {
        None
    }
}

/// Load an arena from a JSON file, returning `None` if the file is missing or invalid.
pub fn load_arena_from_file(path: &str) -> Option<Arena> {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Arena>(&content) {
            Ok(arena) => Some(arena),
            Err(e) => {
                tracing::warn!("Failed to parse {path}: {e}");
                None
            },
        },
        Err(_) => None,
    }
}

/// Load an arena for the given size, preferring a JSON file from the arenas directory.
///
/// Checks env var `FREEZETAG_ARENAS_DIR` (default `config/arenas`) for a file named
/// `{size}.json` (e.g. `small.json`, `default.json`, `large.json`).
/// Falls back to `generate_arena(size)` if the file is missing or unparseable.
pub fn load_arena(size: ArenaSize) -> Arena {
    let dir =
        std::env::var("FREEZETAG_ARENAS_DIR").unwrap_or_else(|_| "config/arenas".to_string());
    let path = format!("{dir}/{}.json", size.file_stem());
    load_arena_from_file(&path).unwrap_or_else(|| generate_arena(size))
}

/// Generate an arena based on size preset.
///
/// The outer walls sit beyond the default freeze band so the wall zone is
/// reachable.
pub fn generate_arena(size: ArenaSize) -> Arena {
    let half = match size {
        ArenaSize::Small => 70.0,
        ArenaSize::Default => 130.0,
        ArenaSize::Large => 180.0,
    };

    // Perimeter
    let mut walls = vec![
        ArenaWall::new(-half, -half, half, -half, OUTER_WALL_HEIGHT),
        ArenaWall::new(half, -half, half, half, OUTER_WALL_HEIGHT),
        ArenaWall::new(half, half, -half, half, OUTER_WALL_HEIGHT),
        ArenaWall::new(-half, half, -half, -half, OUTER_WALL_HEIGHT),
    ];

    // Low cover ring around the center
    let ring = half * 0.3;
    let len = half * 0.08;
    for (cx, cz) in [(ring, 0.0), (-ring, 0.0), (0.0, ring), (0.0, -ring)] {
        if cx == 0.0 {
            walls.push(ArenaWall::new(cx - len, cz, cx + len, cz, COVER_HEIGHT));
        } else {
            walls.push(ArenaWall::new(cx, cz - len, cx, cz + len, COVER_HEIGHT));
        }
    }

    // Full-height pillars in the quadrants
    let q = half * 0.5;
    let p = 2.0;
    for (cx, cz) in [(q, q), (-q, q), (q, -q), (-q, -q)] {
        walls.push(ArenaWall::new(cx - p, cz, cx + p, cz, OUTER_WALL_HEIGHT));
        walls.push(ArenaWall::new(cx, cz - p, cx, cz + p, OUTER_WALL_HEIGHT));
    }

    // Seekers start together at the center facing out; runners on a ring.
    let mut spawn_points = Vec::new();
    for i in 0..4 {
        let angle = i as f32 * std::f32::consts::FRAC_PI_2;
        spawn_points.push(SpawnPoint {
            x: angle.cos() * 2.0,
            z: angle.sin() * 2.0,
            angle,
            class: SpawnClass::Seeker,
        });
    }
    let runner_ring = half * 0.4;
    for i in 0..8 {
        let angle = i as f32 * std::f32::consts::FRAC_PI_4;
        spawn_points.push(SpawnPoint {
            x: angle.cos() * runner_ring,
            z: angle.sin() * runner_ring,
            angle,
            class: SpawnClass::Runner,
        });
    }

    Arena {
        name: match size {
            ArenaSize::Small => "Small Arena".to_string(),
            ArenaSize::Default => "Default Arena".to_string(),
            ArenaSize::Large => "Large Arena".to_string(),
        },
        half_extent: half,
        walls,
        spawn_points,
    }
}
