use serde::{Deserialize, Serialize};

use crate::events::GameEvent;
use crate::geometry::{BodyPose, BoundaryZone};
use crate::match_state::MatchState;
use crate::player::{FreezeCause, PlayerId, Role};
use crate::round::{PhaseData, RoundPhase, RoundSummary};

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    Join = 0x01,
    Pose = 0x02,
    Equip = 0x03,
    Rescue = 0x04,
    Leave = 0x05,

    // Server -> Client (session)
    Welcome = 0x10,
    StateChanged = 0x11,
    PhaseChanged = 0x12,
    TeamChanged = 0x13,
    RoundEnded = 0x14,

    // Server -> Client (timers)
    CountdownTick = 0x20,
    RoundTimer = 0x21,
    JoinCountdown = 0x22,

    // Server -> Client (freeze channel)
    PlayerFrozen = 0x30,
    PlayerUnfrozen = 0x31,
    ExposureChanged = 0x32,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Join),
            0x02 => Some(Self::Pose),
            0x03 => Some(Self::Equip),
            0x04 => Some(Self::Rescue),
            0x05 => Some(Self::Leave),
            0x10 => Some(Self::Welcome),
            0x11 => Some(Self::StateChanged),
            0x12 => Some(Self::PhaseChanged),
            0x13 => Some(Self::TeamChanged),
            0x14 => Some(Self::RoundEnded),
            0x20 => Some(Self::CountdownTick),
            0x21 => Some(Self::RoundTimer),
            0x22 => Some(Self::JoinCountdown),
            0x30 => Some(Self::PlayerFrozen),
            0x31 => Some(Self::PlayerUnfrozen),
            0x32 => Some(Self::ExposureChanged),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Server payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMsg {
    pub player_name: String,
    pub protocol_version: u8,
}

/// Body state reported by the client's engine each frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseMsg {
    pub pose: BodyPose,
    pub crouching: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipMsg {
    pub equipped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescueMsg {
    pub target: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveMsg {}

// ---------------------------------------------------------------------------
// Server -> Client payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeMsg {
    pub player_id: PlayerId,
    pub state: MatchState,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangedMsg {
    pub new: MatchState,
    pub old: MatchState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseChangedMsg {
    pub phase: RoundPhase,
    pub data: PhaseData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamChangedMsg {
    pub player_id: PlayerId,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEndedMsg {
    pub summary: RoundSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountdownTickMsg {
    pub seconds_remaining: u32,
    pub phase: RoundPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTimerMsg {
    pub seconds_remaining: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinCountdownMsg {
    pub seconds_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerFrozenMsg {
    pub player_id: PlayerId,
    pub cause: FreezeCause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerUnfrozenMsg {
    pub player_id: PlayerId,
    pub rescuer: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureChangedMsg {
    pub player_id: PlayerId,
    pub level: f32,
    pub zone: BoundaryZone,
}

// ---------------------------------------------------------------------------
// Message enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    Join(JoinMsg),
    Pose(PoseMsg),
    Equip(EquipMsg),
    Rescue(RescueMsg),
    Leave(LeaveMsg),
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Join(_) => MessageType::Join,
            Self::Pose(_) => MessageType::Pose,
            Self::Equip(_) => MessageType::Equip,
            Self::Rescue(_) => MessageType::Rescue,
            Self::Leave(_) => MessageType::Leave,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Welcome(WelcomeMsg),
    StateChanged(StateChangedMsg),
    PhaseChanged(PhaseChangedMsg),
    TeamChanged(TeamChangedMsg),
    RoundEnded(RoundEndedMsg),
    CountdownTick(CountdownTickMsg),
    RoundTimer(RoundTimerMsg),
    JoinCountdown(JoinCountdownMsg),
    PlayerFrozen(PlayerFrozenMsg),
    PlayerUnfrozen(PlayerUnfrozenMsg),
    ExposureChanged(ExposureChangedMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Welcome(_) => MessageType::Welcome,
            Self::StateChanged(_) => MessageType::StateChanged,
            Self::PhaseChanged(_) => MessageType::PhaseChanged,
            Self::TeamChanged(_) => MessageType::TeamChanged,
            Self::RoundEnded(_) => MessageType::RoundEnded,
            Self::CountdownTick(_) => MessageType::CountdownTick,
            Self::RoundTimer(_) => MessageType::RoundTimer,
            Self::JoinCountdown(_) => MessageType::JoinCountdown,
            Self::PlayerFrozen(_) => MessageType::PlayerFrozen,
            Self::PlayerUnfrozen(_) => MessageType::PlayerUnfrozen,
            Self::ExposureChanged(_) => MessageType::ExposureChanged,
        }
    }
}

impl From<&GameEvent> for ServerMessage {
    fn from(event: &GameEvent) -> Self {
        match event {
            GameEvent::StateChanged { new, old } => Self::StateChanged(StateChangedMsg {
                new: *new,
                old: *old,
            }),
            GameEvent::PhaseChanged { phase, data } => Self::PhaseChanged(PhaseChangedMsg {
                phase: *phase,
                data: data.clone(),
            }),
            GameEvent::CountdownTick {
                seconds_remaining,
                phase,
            } => Self::CountdownTick(CountdownTickMsg {
                seconds_remaining: *seconds_remaining,
                phase: *phase,
            }),
            GameEvent::RoundTimerUpdate { seconds_remaining } => {
                Self::RoundTimer(RoundTimerMsg {
                    seconds_remaining: *seconds_remaining,
                })
            },
            GameEvent::JoinCountdown { seconds_remaining } => {
                Self::JoinCountdown(JoinCountdownMsg {
                    seconds_remaining: *seconds_remaining,
                })
            },
            GameEvent::PlayerFrozen { player, cause } => Self::PlayerFrozen(PlayerFrozenMsg {
                player_id: *player,
                cause: *cause,
            }),
            GameEvent::PlayerUnfrozen { player, rescuer } => {
                Self::PlayerUnfrozen(PlayerUnfrozenMsg {
                    player_id: *player,
                    rescuer: *rescuer,
                })
            },
            GameEvent::RoundEnded(summary) => Self::RoundEnded(RoundEndedMsg {
                summary: summary.clone(),
            }),
            GameEvent::TeamChanged { player, role } => Self::TeamChanged(TeamChangedMsg {
                player_id: *player,
                role: *role,
            }),
            GameEvent::ExposureChanged {
                player,
                level,
                zone,
            } => Self::ExposureChanged(ExposureChangedMsg {
                player_id: *player,
                level: *level,
                zone: *zone,
            }),
        }
    }
}
