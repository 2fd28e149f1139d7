//! Binary wire codec and JSON views of the message types.
//!
//! Wire format: one bincode-encoded (standard config, serde mode) value per
//! frame. The channel already delimits frames, so there is no length prefix.
//!
//! ```text
//! client ── IdentifiableCommand ──► relay
//! client ◄── IdentifiableEvent ──── relay
//! ```
//!
//! The JSON helpers exist for validation at the boundary and for log output;
//! they never touch the wire.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::message::{DocumentCommand, IdentifiableCommand, IdentifiableEvent, SystemCommand};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Encode(String),
    #[error("Deserialization error: {0}")]
    Decode(String),
    #[error("JSON error: {0}")]
    Json(String),
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| CodecError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (value, read) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    if read != bytes.len() {
        return Err(CodecError::Decode(format!(
            "{} trailing bytes after frame",
            bytes.len() - read
        )));
    }
    Ok(value)
}

/// Serialize a command envelope to a wire frame.
pub fn encode_command(command: &IdentifiableCommand) -> Result<Vec<u8>, CodecError> {
    encode(command)
}

/// Parse a wire frame as a command envelope (relay side).
pub fn decode_command(bytes: &[u8]) -> Result<IdentifiableCommand, CodecError> {
    decode(bytes)
}

/// Serialize an identifiable event to a wire frame (relay side).
pub fn encode_event(event: &IdentifiableEvent) -> Result<Vec<u8>, CodecError> {
    encode(event)
}

/// Parse a wire frame as an identifiable event.
pub fn decode_event(bytes: &[u8]) -> Result<IdentifiableEvent, CodecError> {
    decode(bytes)
}

pub fn command_from_json(json: &str) -> Result<SystemCommand, CodecError> {
    serde_json::from_str(json).map_err(|e| CodecError::Json(e.to_string()))
}

pub fn command_to_json(command: &SystemCommand) -> Result<String, CodecError> {
    serde_json::to_string(command).map_err(|e| CodecError::Json(e.to_string()))
}

pub fn event_from_json(json: &str) -> Result<IdentifiableEvent, CodecError> {
    serde_json::from_str(json).map_err(|e| CodecError::Json(e.to_string()))
}

pub fn event_to_json(event: &IdentifiableEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|e| CodecError::Json(e.to_string()))
}

pub fn document_command_from_json(json: &str) -> Result<DocumentCommand, CodecError> {
    serde_json::from_str(json).map_err(|e| CodecError::Json(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::*;

    #[test]
    fn test_command_frame_roundtrip() {
        let command = IdentifiableCommand {
            command_id: 42,
            system_command: SystemCommand::JoinSession { session_id: 99 },
        };
        let bytes = encode_command(&command).unwrap();
        assert_eq!(decode_command(&bytes).unwrap(), command);
    }

    #[test]
    fn test_event_frame_roundtrip_with_snapshot() {
        let event = IdentifiableEvent::ByMyself {
            command_id: 1,
            result: CommandResult::SystemEvent(SystemEvent::JoinedSession {
                session_id: 7,
                initial_state: SessionSnapshot::new(vec![1, 2]),
                document_snapshot: DocumentSnapshot {
                    document_id: Some(ObjectId::new("doc-1")),
                    string_props: vec![(
                        PropKey(ObjectId::new("doc-1"), PropKind::Title),
                        "Sketch".into(),
                    )],
                    float_props: Vec::new(),
                },
            }),
        };
        let bytes = encode_event(&event).unwrap();
        assert_eq!(decode_event(&bytes).unwrap(), event);
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        assert!(matches!(decode_event(&garbage), Err(CodecError::Decode(_))));
        assert!(decode_event(&[]).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let event = IdentifiableEvent::BySystem {
            system_event: SystemEvent::LeftSession,
        };
        let mut bytes = encode_event(&event).unwrap();
        bytes.push(0);
        assert!(decode_event(&bytes).is_err());
    }

    #[test]
    fn test_fragment_frame_is_small() {
        let command = IdentifiableCommand {
            command_id: 1000,
            system_command: SystemCommand::SessionCommand(SessionCommand::Fragment(
                Fragment::new(1.0, 2.0, 3.0, 4.0),
            )),
        };
        let bytes = encode_command(&command).unwrap();
        // 4 × f32 + variant tags + varint id
        assert!(bytes.len() < 32, "fragment frame is {} bytes", bytes.len());
    }

    #[test]
    fn test_command_json_shapes() {
        assert_eq!(
            command_to_json(&SystemCommand::CreateSession).unwrap(),
            r#""CreateSession""#
        );
        assert_eq!(
            command_to_json(&SystemCommand::JoinSession { session_id: 99 }).unwrap(),
            r#"{"JoinSession":{"session_id":99}}"#
        );
        let fragment = command_from_json(
            r#"{"SessionCommand":{"Fragment":{"x1":0.0,"y1":0.0,"x2":10.0,"y2":10.0}}}"#,
        )
        .unwrap();
        assert!(fragment.is_fragment());
    }

    #[test]
    fn test_minimal_joined_session_json() {
        let event = event_from_json(
            r#"{"ByMyself":{"command_id":1,"result":{"SystemEvent":{"JoinedSession":{"session_id":7}}}}}"#,
        )
        .unwrap();
        match event {
            IdentifiableEvent::ByMyself {
                command_id: 1,
                result:
                    CommandResult::SystemEvent(SystemEvent::JoinedSession {
                        session_id,
                        initial_state,
                        ..
                    }),
            } => {
                assert_eq!(session_id, 7);
                assert!(initial_state.connections.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_document_command_json() {
        let command = document_command_from_json(r#"{"UpdateDocumentTitle":{"title":"Plan"}}"#)
            .unwrap();
        assert_eq!(
            command,
            DocumentCommand::UpdateDocumentTitle {
                title: "Plan".into()
            }
        );
        assert!(document_command_from_json(r#"{"Nope":{}}"#).is_err());
    }

    #[test]
    fn test_event_json_roundtrip_for_errors() {
        let event = IdentifiableEvent::ByMyself {
            command_id: 5,
            result: CommandResult::Error(SystemError::Rejected("not found".into())),
        };
        let json = event_to_json(&event).unwrap();
        assert_eq!(
            json,
            r#"{"ByMyself":{"command_id":5,"result":{"Error":{"Rejected":"not found"}}}}"#
        );
        assert_eq!(event_from_json(&json).unwrap(), event);
    }
}
