use serde::{Deserialize, Serialize};

use super::messages::{
    ClientMessage, CountdownTickMsg, EquipMsg, ExposureChangedMsg, JoinCountdownMsg, JoinMsg,
    LeaveMsg, MessageType, PhaseChangedMsg, PlayerFrozenMsg, PlayerUnfrozenMsg, PoseMsg,
    RescueMsg, RoundEndedMsg, RoundTimerMsg, ServerMessage, StateChangedMsg, TeamChangedMsg,
    WelcomeMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    let ty = msg.message_type();
    match msg {
        ClientMessage::Join(m) => encode_message(ty, m),
        ClientMessage::Pose(m) => encode_message(ty, m),
        ClientMessage::Equip(m) => encode_message(ty, m),
        ClientMessage::Rescue(m) => encode_message(ty, m),
        ClientMessage::Leave(m) => encode_message(ty, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    let ty = msg.message_type();
    match msg {
        ServerMessage::Welcome(m) => encode_message(ty, m),
        ServerMessage::StateChanged(m) => encode_message(ty, m),
        ServerMessage::PhaseChanged(m) => encode_message(ty, m),
        ServerMessage::TeamChanged(m) => encode_message(ty, m),
        ServerMessage::RoundEnded(m) => encode_message(ty, m),
        ServerMessage::CountdownTick(m) => encode_message(ty, m),
        ServerMessage::RoundTimer(m) => encode_message(ty, m),
        ServerMessage::JoinCountdown(m) => encode_message(ty, m),
        ServerMessage::PlayerFrozen(m) => encode_message(ty, m),
        ServerMessage::PlayerUnfrozen(m) => encode_message(ty, m),
        ServerMessage::ExposureChanged(m) => encode_message(ty, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    let Some(&first) = data.first() else {
        return Err(ProtocolError::EmptyMessage);
    };
    MessageType::from_byte(first).ok_or(ProtocolError::UnknownMessageType(first))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::Join => Ok(ClientMessage::Join(decode_payload::<JoinMsg>(data)?)),
        MessageType::Pose => Ok(ClientMessage::Pose(decode_payload::<PoseMsg>(data)?)),
        MessageType::Equip => Ok(ClientMessage::Equip(decode_payload::<EquipMsg>(data)?)),
        MessageType::Rescue => Ok(ClientMessage::Rescue(decode_payload::<RescueMsg>(data)?)),
        MessageType::Leave => Ok(ClientMessage::Leave(decode_payload::<LeaveMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::Welcome => Ok(ServerMessage::Welcome(decode_payload::<WelcomeMsg>(
            data,
        )?)),
        MessageType::StateChanged => Ok(ServerMessage::StateChanged(decode_payload::<
            StateChangedMsg,
        >(data)?)),
        MessageType::PhaseChanged => Ok(ServerMessage::PhaseChanged(decode_payload::<
            PhaseChangedMsg,
        >(data)?)),
        MessageType::TeamChanged => Ok(ServerMessage::TeamChanged(decode_payload::<
            TeamChangedMsg,
        >(data)?)),
        MessageType::RoundEnded => Ok(ServerMessage::RoundEnded(decode_payload::<
            RoundEndedMsg,
        >(data)?)),
        MessageType::CountdownTick => Ok(ServerMessage::CountdownTick(decode_payload::<
            CountdownTickMsg,
        >(data)?)),
        MessageType::RoundTimer => Ok(ServerMessage::RoundTimer(decode_payload::<
            RoundTimerMsg,
        >(data)?)),
        MessageType::JoinCountdown => Ok(ServerMessage::JoinCountdown(decode_payload::<
            JoinCountdownMsg,
        >(data)?)),
        MessageType::PlayerFrozen => Ok(ServerMessage::PlayerFrozen(decode_payload::<
            PlayerFrozenMsg,
        >(data)?)),
        MessageType::PlayerUnfrozen => Ok(ServerMessage::PlayerUnfrozen(decode_payload::<
            PlayerUnfrozenMsg,
        >(data)?)),
        MessageType::ExposureChanged => Ok(ServerMessage::ExposureChanged(decode_payload::<
            ExposureChangedMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::GameEvent;
    use crate::geometry::{BodyPose, BoundaryZone, Vec3};
    use crate::player::FreezeCause;
    use crate::round::{EndReason, RoundSummary, Winner};

    #[test]
    fn roundtrip_pose_with_hand() {
        let msg = ClientMessage::Pose(PoseMsg {
            pose: BodyPose::new(Vec3::new(1.0, 1.5, -2.0), Vec3::new(0.0, 0.0, 1.0))
                .with_hand(Vec3::new(1.2, 1.4, -1.6)),
            crouching: true,
        });
        let encoded = encode_client_message(&msg).unwrap();
        let decoded = decode_client_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_round_ended() {
        let msg = ServerMessage::RoundEnded(RoundEndedMsg {
            summary: RoundSummary {
                winner: Winner::Seekers,
                reason: EndReason::AllFrozen,
                frozen_count: 3,
                total_runners: 3,
                duration_secs: 90.0,
            },
        });
        let encoded = encode_server_message(&msg).unwrap();
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_environment_freeze() {
        let msg = ServerMessage::from(&GameEvent::PlayerFrozen {
            player: 9,
            cause: FreezeCause::Environment,
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(encoded[0], MessageType::PlayerFrozen as u8);
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn event_conversion_keeps_fields() {
        let msg = ServerMessage::from(&GameEvent::ExposureChanged {
            player: 4,
            level: 37.5,
            zone: BoundaryZone::Freeze,
        });
        assert_eq!(
            msg,
            ServerMessage::ExposureChanged(ExposureChangedMsg {
                player_id: 4,
                level: 37.5,
                zone: BoundaryZone::Freeze,
            })
        );
    }

    #[test]
    fn decode_empty_message_fails() {
        assert!(matches!(
            decode_message_type(&[]),
            Err(ProtocolError::EmptyMessage)
        ));
    }

    #[test]
    fn decode_unknown_type_fails() {
        assert!(matches!(
            decode_message_type(&[0xFF]),
            Err(ProtocolError::UnknownMessageType(0xFF))
        ));
    }

    #[test]
    fn decode_client_msg_with_server_type_fails() {
        let msg = ServerMessage::RoundTimer(RoundTimerMsg {
            seconds_remaining: 12.5,
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert!(
            decode_client_message(&encoded).is_err(),
            "Server message type should fail as client message"
        );
    }

    #[test]
    fn decode_server_msg_with_client_type_fails() {
        let msg = ClientMessage::Rescue(RescueMsg { target: 3 });
        let encoded = encode_client_message(&msg).unwrap();
        assert!(
            decode_server_message(&encoded).is_err(),
            "Client message type should fail as server message"
        );
    }

    #[test]
    fn message_type_from_byte_exhaustive() {
        let known: Vec<(u8, MessageType)> = vec![
            (0x01, MessageType::Join),
            (0x02, MessageType::Pose),
            (0x03, MessageType::Equip),
            (0x04, MessageType::Rescue),
            (0x05, MessageType::Leave),
            (0x10, MessageType::Welcome),
            (0x11, MessageType::StateChanged),
            (0x12, MessageType::PhaseChanged),
            (0x13, MessageType::TeamChanged),
            (0x14, MessageType::RoundEnded),
            (0x20, MessageType::CountdownTick),
            (0x21, MessageType::RoundTimer),
            (0x22, MessageType::JoinCountdown),
            (0x30, MessageType::PlayerFrozen),
            (0x31, MessageType::PlayerUnfrozen),
            (0x32, MessageType::ExposureChanged),
        ];
        for (byte, expected) in &known {
            assert_eq!(
                MessageType::from_byte(*byte),
                Some(*expected),
                "Byte 0x{byte:02x} should map to {expected:?}"
            );
        }
        for byte in 0u8..=255 {
            if known.iter().any(|(b, _)| *b == byte) {
                continue;
            }
            assert!(
                MessageType::from_byte(byte).is_none(),
                "Byte 0x{byte:02x} should not map to any MessageType"
            );
        }
    }

    #[test]
    fn protocol_error_display() {
        assert_eq!(format!("{}", ProtocolError::EmptyMessage), "empty message");
        assert_eq!(
            format!("{}", ProtocolError::UnknownMessageType(0xFF)),
            "unknown message type: 0xff"
        );
        assert!(format!("{}", ProtocolError::PayloadTooLarge(99999)).contains("99999"));
    }

    #[test]
    fn payload_too_large_rejected() {
        let msg = ClientMessage::Join(JoinMsg {
            player_name: "x".repeat(MAX_MESSAGE_SIZE + 1),
            protocol_version: PROTOCOL_VERSION,
        });
        assert!(matches!(
            encode_client_message(&msg),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }
}
