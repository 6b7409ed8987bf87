use serde::{Deserialize, Serialize};

use crate::player::PlayerId;

/// Sub-state of a live round. Advances monotonically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoundPhase {
    #[default]
    None,
    /// Everyone is locked in place.
    Countdown,
    /// Runners move, Seekers are still locked.
    Hiding,
    /// Seekers are released and the round clock runs.
    Active,
}

impl RoundPhase {
    /// The phase that follows `self`, if any.
    pub fn next(self) -> Option<RoundPhase> {
        match self {
            RoundPhase::None => Some(RoundPhase::Countdown),
            RoundPhase::Countdown => Some(RoundPhase::Hiding),
            RoundPhase::Hiding => Some(RoundPhase::Active),
            RoundPhase::Active => None,
        }
    }

    /// Players can move (and therefore be frozen) in these phases.
    pub fn allows_movement(self) -> bool {
        matches!(self, RoundPhase::Hiding | RoundPhase::Active)
    }
}

impl std::fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RoundPhase::None => "none",
            RoundPhase::Countdown => "countdown",
            RoundPhase::Hiding => "hiding",
            RoundPhase::Active => "active",
        };
        f.write_str(name)
    }
}

/// Extra data published with a phase change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseData {
    /// Length of the phase in whole seconds.
    pub duration_secs: u32,
    pub seekers: Vec<PlayerId>,
    pub runners: Vec<PlayerId>,
}

/// Team that won a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Seekers,
    Runners,
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Winner::Seekers => f.write_str("seekers"),
            Winner::Runners => f.write_str("runners"),
        }
    }
}

/// Why a round terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    AllFrozen,
    TimeUp,
    SeekersDisconnected,
    RunnersDisconnected,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EndReason::AllFrozen => "all_frozen",
            EndReason::TimeUp => "time_up",
            EndReason::SeekersDisconnected => "seekers_disconnected",
            EndReason::RunnersDisconnected => "runners_disconnected",
        };
        f.write_str(name)
    }
}

/// Statistics published once when a round terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub winner: Winner,
    pub reason: EndReason,
    pub frozen_count: u32,
    pub total_runners: u32,
    /// Seconds spent in the Active phase (0 if the round never got there).
    pub duration_secs: f32,
}
