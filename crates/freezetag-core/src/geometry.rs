use serde::{Deserialize, Serialize};

/// A point or direction in world space. Y is up; the ground plane is XZ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (other - self).length()
    }

    /// Distance on the ground plane, ignoring height.
    pub fn horizontal_distance(self, other: Vec3) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Vec3> {
        let len = self.length();
        if len < 1e-6 || !len.is_finite() {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    /// Angle in radians between two vectors, or `None` if either is zero.
    pub fn angle_between(self, other: Vec3) -> Option<f32> {
        let a = self.normalized()?;
        let b = other.normalized()?;
        Some(a.dot(b).clamp(-1.0, 1.0).acos())
    }

    /// The same vector projected onto the ground plane.
    pub fn flattened(self) -> Vec3 {
        Vec3::new(self.x, 0.0, self.z)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Concentric regions around the play area center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryZone {
    /// Inside the play area; exposure thaws.
    Play,
    /// Just outside; exposure builds.
    Freeze,
    /// Beyond the freeze band, at the outer wall; exposure builds.
    Wall,
}

/// Where a player's body currently is, as reported by the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyPose {
    /// Center of the torso.
    pub center: Vec3,
    /// Forward facing vector of the body.
    pub facing: Vec3,
    /// Dominant-hand attachment point, when the rig exposes one.
    pub hand: Option<Vec3>,
}

impl BodyPose {
    pub fn new(center: Vec3, facing: Vec3) -> Self {
        Self {
            center,
            facing,
            hand: None,
        }
    }

    pub fn with_hand(mut self, hand: Vec3) -> Self {
        self.hand = Some(hand);
        self
    }

    /// True when every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.center.is_finite() && self.facing.is_finite() && self.hand.is_none_or(Vec3::is_finite)
    }
}
