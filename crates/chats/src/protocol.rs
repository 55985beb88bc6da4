//! JSON frames exchanged over the chat socket.
//!
//! Inbound, a client sends either a message `{recipient, text?, file?}` or the
//! lifecycle sentinel `{disconnect: true}`. Outbound, the server sends presence
//! snapshots `{online: [...]}`, delivered messages, and `{error}` notices.

use relaychat_auth::Identity;
use relaychat_database::ChatMessage;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// An attachment carried inline as base64, optionally with a data-URL prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineFile {
    #[serde(default)]
    pub name: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    #[serde(default)]
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<InlineFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// The client is leaving; treated exactly like a transport close.
    Disconnect,
    Message(OutgoingMessage),
}

impl ClientFrame {
    /// Parse a text frame. The sentinel wins over message fields so that a
    /// frame carrying `disconnect: true` is never relayed.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        if value.get("disconnect").and_then(Value::as_bool) == Some(true) {
            return Ok(ClientFrame::Disconnect);
        }
        OutgoingMessage::deserialize(value).map(ClientFrame::Message)
    }
}

impl Serialize for ClientFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Sentinel {
            disconnect: bool,
        }

        match self {
            ClientFrame::Disconnect => Sentinel { disconnect: true }.serialize(serializer),
            ClientFrame::Message(message) => message.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
}

impl From<&Identity> for PresenceEntry {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.id.clone(),
            username: identity.username.clone(),
        }
    }
}

/// A stored message as clients see it, both live and in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender: String,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub created_at: String,
}

impl From<&ChatMessage> for DeliveredMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.public_id.clone(),
            sender: message.sender_id.clone(),
            recipient: message.recipient_id.clone(),
            text: message.text.clone(),
            file: message.file.clone(),
            file_name: message.file_name.clone(),
            created_at: message.created_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Presence { online: Vec<PresenceEntry> },
    Message(DeliveredMessage),
    Error { error: String },
}

impl ServerFrame {
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_message() {
        let frame = ClientFrame::parse(r#"{"recipient":"u2","text":"hi"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Message(OutgoingMessage {
                recipient: "u2".into(),
                text: Some("hi".into()),
                file: None,
            })
        );
    }

    #[test]
    fn parses_message_with_inline_file() {
        let frame = ClientFrame::parse(
            r#"{"recipient":"u2","file":{"name":"a.txt","data":"data:text/plain;base64,aGk="}}"#,
        )
        .unwrap();

        let ClientFrame::Message(message) = frame else {
            panic!("expected a message frame");
        };
        let file = message.file.expect("file should be present");
        assert_eq!(file.name, "a.txt");
        assert!(message.text.is_none());
    }

    #[test]
    fn disconnect_sentinel_takes_precedence() {
        assert_eq!(
            ClientFrame::parse(r#"{"disconnect":true}"#).unwrap(),
            ClientFrame::Disconnect
        );
        assert_eq!(
            ClientFrame::parse(r#"{"disconnect":true,"recipient":"u2","text":"x"}"#).unwrap(),
            ClientFrame::Disconnect
        );
    }

    #[test]
    fn false_sentinel_is_an_ordinary_frame() {
        let frame = ClientFrame::parse(r#"{"disconnect":false,"recipient":"u2","text":"x"}"#)
            .unwrap();
        assert!(matches!(frame, ClientFrame::Message(_)));
    }

    #[test]
    fn corrupt_frames_fail_to_parse() {
        assert!(ClientFrame::parse("{not json").is_err());
        assert!(ClientFrame::parse(r#"{"recipient":42}"#).is_err());
        assert!(ClientFrame::parse(r#"[1,2,3]"#).is_err());
    }

    #[test]
    fn client_frames_serialize_to_wire_shape() {
        assert_eq!(
            serde_json::to_value(ClientFrame::Disconnect).unwrap(),
            json!({"disconnect": true})
        );
        assert_eq!(
            serde_json::to_value(ClientFrame::Message(OutgoingMessage {
                recipient: "u2".into(),
                text: Some("hi".into()),
                file: None,
            }))
            .unwrap(),
            json!({"recipient": "u2", "text": "hi"})
        );
    }

    #[test]
    fn server_frames_serialize_to_wire_shape() {
        let presence = ServerFrame::Presence {
            online: vec![PresenceEntry {
                user_id: "u1".into(),
                username: "alice".into(),
            }],
        };
        assert_eq!(
            serde_json::to_value(&presence).unwrap(),
            json!({"online": [{"userId": "u1", "username": "alice"}]})
        );

        let delivered = ServerFrame::Message(DeliveredMessage {
            id: "m1".into(),
            sender: "u1".into(),
            recipient: "u2".into(),
            text: Some("hi".into()),
            file: None,
            file_name: None,
            created_at: "2024-01-01T00:00:00.000000Z".into(),
        });
        assert_eq!(
            serde_json::to_value(&delivered).unwrap(),
            json!({
                "_id": "m1",
                "sender": "u1",
                "recipient": "u2",
                "text": "hi",
                "createdAt": "2024-01-01T00:00:00.000000Z"
            })
        );

        assert_eq!(
            serde_json::to_value(ServerFrame::error("nope")).unwrap(),
            json!({"error": "nope"})
        );
    }

    #[test]
    fn server_frames_are_readable_by_clients() {
        let text = r#"{"_id":"m1","sender":"u1","recipient":"u2","file":"f.png","createdAt":"t"}"#;
        let frame: ServerFrame = serde_json::from_str(text).unwrap();
        let ServerFrame::Message(message) = frame else {
            panic!("expected a message frame");
        };
        assert_eq!(message.file.as_deref(), Some("f.png"));

        let frame: ServerFrame = serde_json::from_str(r#"{"online":[]}"#).unwrap();
        assert_eq!(frame, ServerFrame::Presence { online: vec![] });
    }
}
