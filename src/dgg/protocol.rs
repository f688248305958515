//! DGG chat wire format.
//!
//! Every websocket text frame is `EVENT {json}`. Only the events the relay
//! needs are decoded; everything else surfaces as [`DggEvent::Other`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::error::DggError;
use crate::common::{ChatMessage, DggCommand, Whisper};

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DggEvent {
    /// Public chat message.
    Message(ChatMessage),
    /// Whisper addressed to the bot.
    Whisper(Whisper),
    /// Full roster, sent once after connecting.
    Names(Vec<String>),
    Join(String),
    Quit(String),
    /// Error reported by the server (`needlogin`, `throttled`, ...).
    Error(String),
    /// Keepalive; the payload must be echoed back in a PONG.
    Ping(Value),
    /// An event the relay does not act on.
    Other(String),
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    nick: String,
    #[serde(default)]
    data: String,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct NamesPayload {
    #[serde(default)]
    users: Vec<UserPayload>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    nick: String,
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    data: &'a str,
}

#[derive(Debug, Serialize)]
struct OutboundWhisper<'a> {
    nick: &'a str,
    data: &'a str,
}

/// Decode one text frame.
pub fn parse_frame(frame: &str) -> Result<DggEvent, DggError> {
    let frame = frame.trim();
    let (event, payload) = frame
        .split_once(' ')
        .ok_or_else(|| DggError::MalformedFrame(frame.chars().take(64).collect()))?;

    let event = match event {
        "MSG" => {
            let msg: MessagePayload = serde_json::from_str(payload)?;
            DggEvent::Message(ChatMessage {
                timestamp: timestamp_from_millis(msg.timestamp),
                sender: msg.nick,
                text: msg.data,
            })
        }
        "PRIVMSG" => {
            let msg: MessagePayload = serde_json::from_str(payload)?;
            DggEvent::Whisper(Whisper {
                sender: msg.nick,
                text: msg.data,
            })
        }
        "NAMES" => {
            let names: NamesPayload = serde_json::from_str(payload)?;
            DggEvent::Names(names.users.into_iter().map(|u| u.nick).collect())
        }
        "JOIN" => DggEvent::Join(serde_json::from_str::<UserPayload>(payload)?.nick),
        "QUIT" => DggEvent::Quit(serde_json::from_str::<UserPayload>(payload)?.nick),
        "ERR" => {
            let value: Value = serde_json::from_str(payload)?;
            let description = match value {
                Value::String(s) => s,
                Value::Object(ref map) => map
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                other => other.to_string(),
            };
            DggEvent::Error(description)
        }
        "PING" => DggEvent::Ping(serde_json::from_str(payload)?),
        other => DggEvent::Other(other.to_string()),
    };

    Ok(event)
}

/// Encode an outbound chat command.
pub fn encode_command(command: &DggCommand) -> Result<String, DggError> {
    let frame = match command {
        DggCommand::Send { text } => {
            format!("MSG {}", serde_json::to_string(&OutboundMessage { data: text })?)
        }
        DggCommand::Whisper { nick, text } => format!(
            "PRIVMSG {}",
            serde_json::to_string(&OutboundWhisper { nick, data: text })?
        ),
    };
    Ok(frame)
}

/// Answer a PING.
pub fn encode_pong(payload: &Value) -> String {
    format!("PONG {}", payload)
}

fn timestamp_from_millis(millis: Option<i64>) -> DateTime<Utc> {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_message() {
        let event = parse_frame(
            r#"MSG {"nick":"Destiny","features":["admin"],"timestamp":1700000000000,"data":"hello chat"}"#,
        )
        .unwrap();

        let DggEvent::Message(msg) = event else {
            panic!("expected message, got {:?}", event);
        };
        assert_eq!(msg.sender, "Destiny");
        assert_eq!(msg.text, "hello chat");
        assert_eq!(msg.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_parse_whisper() {
        let event = parse_frame(r#"PRIVMSG {"nick":"bob","data":"psst","messageid":5}"#).unwrap();
        assert_eq!(
            event,
            DggEvent::Whisper(Whisper {
                sender: "bob".to_string(),
                text: "psst".to_string()
            })
        );
    }

    #[test]
    fn test_parse_roster_events() {
        assert_eq!(
            parse_frame(r#"NAMES {"connectioncount":3,"users":[{"nick":"a"},{"nick":"b"}]}"#).unwrap(),
            DggEvent::Names(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            parse_frame(r#"JOIN {"nick":"c","features":[]}"#).unwrap(),
            DggEvent::Join("c".to_string())
        );
        assert_eq!(
            parse_frame(r#"QUIT {"nick":"c"}"#).unwrap(),
            DggEvent::Quit("c".to_string())
        );
    }

    #[test]
    fn test_parse_error_and_ping() {
        assert_eq!(
            parse_frame(r#"ERR "needlogin""#).unwrap(),
            DggEvent::Error("needlogin".to_string())
        );
        assert_eq!(
            parse_frame(r#"ERR {"description":"throttled"}"#).unwrap(),
            DggEvent::Error("throttled".to_string())
        );

        let event = parse_frame(r#"PING {"data":1234}"#).unwrap();
        let DggEvent::Ping(payload) = event else {
            panic!("expected ping");
        };
        assert_eq!(encode_pong(&payload), r#"PONG {"data":1234}"#);
    }

    #[test]
    fn test_unknown_and_malformed_frames() {
        assert_eq!(
            parse_frame(r#"MUTE {"nick":"x"}"#).unwrap(),
            DggEvent::Other("MUTE".to_string())
        );
        assert!(matches!(parse_frame("garbage"), Err(DggError::MalformedFrame(_))));
        assert!(matches!(parse_frame("MSG {not json"), Err(DggError::Json(_))));
    }

    #[test]
    fn test_encode_commands() {
        assert_eq!(
            encode_command(&DggCommand::Send {
                text: "say \"hi\"".to_string()
            })
            .unwrap(),
            r#"MSG {"data":"say \"hi\""}"#
        );
        assert_eq!(
            encode_command(&DggCommand::Whisper {
                nick: "bob".to_string(),
                text: "yo".to_string()
            })
            .unwrap(),
            r#"PRIVMSG {"nick":"bob","data":"yo"}"#
        );
    }
}
