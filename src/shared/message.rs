//! Sync protocol wire messages (§4.5).
//!
//! Binary CRDT payloads (`docState`, `update`, `stateVector`) are carried as
//! base64 strings inside the JSON frame; this is a transport-layer artifact
//! and could be replaced with raw binary framing without changing semantics.

use serde::{Deserialize, Serialize};

use super::ids::{ClientId, DocumentId, UserId};

fn encode_b64(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn decode_b64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(s)
}

/// A member summary carried in `room_joined` / `user_joined` / `user_left`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberInfo {
    pub client_id: ClientId,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A cursor position/selection, echoed to peers on `cursor_update`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CursorPayload {
    pub client_id: ClientId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub position: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Messages sent from the client to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom {
        document_id: DocumentId,
        client_id: ClientId,
        token: String,
    },
    SyncStep1 {
        client_id: ClientId,
        #[serde(with = "b64_bytes")]
        state_vector: Vec<u8>,
    },
    Update {
        client_id: ClientId,
        #[serde(with = "b64_bytes")]
        update: Vec<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lamport_time: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    CursorUpdate(CursorPayload),
    Ping {},
}

/// Messages sent from the server to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomJoined {
        document_id: DocumentId,
        client_id: ClientId,
        users: Vec<MemberInfo>,
        #[serde(with = "b64_bytes")]
        doc_state: Vec<u8>,
        lamport_time: u64,
    },
    SyncStep2 {
        client_id: ClientId,
        #[serde(with = "b64_bytes")]
        update: Vec<u8>,
    },
    Update {
        client_id: ClientId,
        #[serde(with = "b64_bytes")]
        update: Vec<u8>,
        lamport_time: u64,
        timestamp: i64,
    },
    CursorUpdate(CursorPayload),
    UserJoined(MemberInfo),
    UserLeft {
        client_id: ClientId,
        user_id: UserId,
    },
    OfflineRecovered {
        recovered: usize,
        conflicts: usize,
    },
    Pong {},
    Error {
        message: String,
        code: ErrorCode,
    },
}

/// Wire error taxonomy (§7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorCode {
    AuthFailed,
    UserNotFound,
    NotFound,
    AccessDenied,
    NotInRoom,
    UpdateFailed,
    ServerError,
}

mod b64_bytes {
    use super::{decode_b64, encode_b64};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&encode_b64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        decode_b64(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_room_round_trips_through_json() {
        let msg = ClientMessage::JoinRoom {
            document_id: DocumentId(42),
            client_id: ClientId("u1-123-abc".into()),
            token: "tok".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn update_carries_base64_bytes() {
        let msg = ServerMessage::Update {
            client_id: ClientId("c1".into()),
            update: vec![1, 2, 3, 255],
            lamport_time: 7,
            timestamp: 1000,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json["update"].is_string());
        let back: ServerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn error_message_serializes_with_code() {
        let msg = ServerMessage::Error {
            message: "nope".into(),
            code: ErrorCode::AccessDenied,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"code\":\"AccessDenied\""));
    }
}
