use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Data-driven configuration for a freeze tag match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub lifecycle: LifecycleConfig,
    pub round: RoundConfig,
    pub detection: DetectionConfig,
    pub boundary: BoundaryConfig,
    pub rescue: RescueConfig,
}

/// Match-level timing and population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Queued players needed to leave the lobby.
    pub min_players: usize,
    /// Seekers chosen per round (clamped to the pool size).
    pub seeker_count: usize,
    /// Join window before roles are finalized (seconds).
    pub team_selection_secs: u32,
    /// Results screen duration (seconds).
    pub results_secs: u32,
    /// How often the lobby re-checks the queue (milliseconds).
    pub lobby_check_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            seeker_count: 1,
            team_selection_secs: 10,
            results_secs: 10,
            lobby_check_ms: 1000,
        }
    }
}

/// Round phase durations and clock cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Everyone frozen in place before the round (seconds).
    pub countdown_secs: u32,
    /// Runners move, Seekers wait (seconds). 0 skips straight to Active.
    pub hiding_secs: u32,
    /// Active phase length (seconds).
    pub round_secs: u32,
    /// Tail of Active that gets once-per-second countdown ticks.
    pub final_countdown_secs: u32,
    /// Round clock broadcast interval (milliseconds).
    pub timer_update_ms: u64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 5,
            hiding_secs: 15,
            round_secs: 180,
            final_countdown_secs: 15,
            timer_update_ms: 250,
        }
    }
}

/// Seeker detection cone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub tick_ms: u64,
    /// Used when the inventory has no tier for the Seeker.
    pub default_range: f32,
    /// Full cone angle in degrees; the half-angle is tested.
    pub default_angle_deg: f32,
    /// Target lowering while crouching, when stance gives no value.
    pub crouch_offset: f32,
    /// Cone origin offsets from the body center when no hand is attached.
    pub hand_forward_offset: f32,
    pub hand_up_offset: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            default_range: 30.0,
            default_angle_deg: 60.0,
            crouch_offset: 0.9,
            hand_forward_offset: 0.4,
            hand_up_offset: 0.5,
        }
    }
}

/// Out-of-bounds exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub tick_ms: u64,
    pub center_x: f32,
    pub center_z: f32,
    /// Half-extent of the square play area.
    pub play_radius: f32,
    /// Half-extent of the freeze band; beyond it is the wall zone.
    pub freeze_radius: f32,
    /// Exposure gained per second outside the play area.
    pub freeze_rate: f32,
    /// Exposure lost per second inside the play area.
    pub thaw_rate: f32,
    /// Minimum change before a new exposure notification.
    pub report_threshold: f32,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            center_x: 0.0,
            center_z: 0.0,
            play_radius: 100.0,
            freeze_radius: 120.0,
            freeze_rate: 10.0,
            thaw_rate: 5.0,
            report_threshold: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RescueConfig {
    /// Horizontal reach for unfreezing a teammate.
    pub radius: f32,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self { radius: 3.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid { field, reason } => write!(f, "invalid {field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative(v: f32) -> bool {
    v.is_finite() && v >= 0.0
}

impl GameConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("FREEZETAG_GAME_CONFIG")
            && let Ok(contents) = std::fs::read_to_string(&path)
            && let Ok(config) = toml::from_str::<Self>(&contents)
        {
            return config;
        }
        if let Ok(contents) = std::fs::read_to_string("config/freezetag.toml")
            && let Ok(config) = toml::from_str::<Self>(&contents)
        {
            return config;
        }
        Self::default()
    }

    /// Reject values the round logic cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.lifecycle;
        if l.min_players < 2 {
            return Err(invalid("lifecycle.min_players", "must be at least 2"));
        }
        if l.seeker_count == 0 {
            return Err(invalid("lifecycle.seeker_count", "must be at least 1"));
        }
        if l.seeker_count >= l.min_players {
            return Err(invalid(
                "lifecycle.seeker_count",
                format!("must leave at least one runner (min_players = {})", l.min_players),
            ));
        }
        if l.lobby_check_ms == 0 {
            return Err(invalid("lifecycle.lobby_check_ms", "must be positive"));
        }

        let r = &self.round;
        if r.round_secs == 0 {
            return Err(invalid("round.round_secs", "must be positive"));
        }
        if r.timer_update_ms == 0 || r.timer_update_ms >= 1000 {
            return Err(invalid(
                "round.timer_update_ms",
                "must be between 1 and 999 so every final second is ticked",
            ));
        }

        let d = &self.detection;
        if d.tick_ms == 0 {
            return Err(invalid("detection.tick_ms", "must be positive"));
        }
        if !positive(d.default_range) {
            return Err(invalid("detection.default_range", "must be positive"));
        }
        if !positive(d.default_angle_deg) || d.default_angle_deg > 360.0 {
            return Err(invalid("detection.default_angle_deg", "must be in (0, 360]"));
        }
        if !non_negative(d.crouch_offset) {
            return Err(invalid("detection.crouch_offset", "must be non-negative"));
        }

        let b = &self.boundary;
        if b.tick_ms == 0 {
            return Err(invalid("boundary.tick_ms", "must be positive"));
        }
        if !positive(b.play_radius) {
            return Err(invalid("boundary.play_radius", "must be positive"));
        }
        if !b.freeze_radius.is_finite() || b.freeze_radius < b.play_radius {
            return Err(invalid(
                "boundary.freeze_radius",
                "must be at least play_radius",
            ));
        }
        if !positive(b.freeze_rate) || !non_negative(b.thaw_rate) {
            return Err(invalid(
                "boundary.freeze_rate",
                "freeze_rate must be positive and thaw_rate non-negative",
            ));
        }
        if !non_negative(b.report_threshold) {
            return Err(invalid("boundary.report_threshold", "must be non-negative"));
        }

        if !non_negative(self.rescue.radius) {
            return Err(invalid("rescue.radius", "must be non-negative"));
        }
        Ok(())
    }
}

impl LifecycleConfig {
    pub fn lobby_check_interval(&self) -> Duration {
        Duration::from_millis(self.lobby_check_ms)
    }
}

impl RoundConfig {
    pub fn timer_update_interval(&self) -> Duration {
        Duration::from_millis(self.timer_update_ms)
    }
}

impl DetectionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl BoundaryConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.round.countdown_secs, 5);
        assert_eq!(config.round.hiding_secs, 15);
        assert_eq!(config.round.round_secs, 180);
        assert_eq!(config.detection.default_range, 30.0);
        assert_eq!(config.boundary.freeze_radius, 120.0);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: GameConfig = toml::from_str(
            r#"
            [round]
            hiding_secs = 0

            [boundary]
            freeze_rate = 20.0
            "#,
        )
        .unwrap();
        assert_eq!(config.round.hiding_secs, 0);
        assert_eq!(config.round.round_secs, 180);
        assert_eq!(config.boundary.freeze_rate, 20.0);
        assert_eq!(config.boundary.thaw_rate, 5.0);
        assert_eq!(config.lifecycle, LifecycleConfig::default());
        assert!(config.validate().is_ok(), "zero hiding is allowed");
    }

    #[test]
    fn seekers_must_leave_a_runner() {
        let mut config = GameConfig::default();
        config.lifecycle.seeker_count = 2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("seeker_count"));
    }

    #[test]
    fn round_clock_must_be_sub_second() {
        let mut config = GameConfig::default();
        config.round.timer_update_ms = 1000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timer_update_ms"));

        config.round.timer_update_ms = 4000;
        assert!(config.validate().is_err());

        config.round.timer_update_ms = 999;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn freeze_band_cannot_be_inside_play_area() {
        let mut config = GameConfig::default();
        config.boundary.freeze_radius = 50.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn nan_range_rejected() {
        let mut config = GameConfig::default();
        config.detection.default_range = f32::NAN;
        assert!(config.validate().is_err());
    }
}
