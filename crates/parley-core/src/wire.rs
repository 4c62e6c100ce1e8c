//! JSON frame envelopes exchanged with the remote session endpoint.
//!
//! Every frame, in both directions, is an object tagged by `"type"`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// The distinguished frame type routed to `session-summary-received`.
pub const SESSION_SUMMARY_TYPE: &str = "session_summary";

/// Who produced a conversational line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
    #[default]
    #[serde(other)]
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub author: Author,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptLine {
    pub author: Author,
    pub text: String,
}

/// End-of-session recap pushed by the remote endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSummary {
    pub transcript: Vec<TranscriptLine>,
    pub vocabulary_learned: Vec<String>,
    pub xp_earned: f64,
    pub feedback: String,
}

/// Frames the core understands on the inbound side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    ChatMessage(ChatMessage),
    Typing {
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
    XpGain {
        amount: f64,
    },
    VocabularyUpdate {
        words: Vec<String>,
    },
    SessionSummary(SessionSummary),
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordAction {
    Proposed,
    Practiced,
    Mastered,
}

/// Frames the core produces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    ChatMessage {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        text: String,
    },
    WordInteraction {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        word: String,
        action: WordAction,
    },
    /// Heartbeat frame. Fire-and-forget; the endpoint does not reply.
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_chat_message() {
        let value = json!({
            "type": "chat_message",
            "id": "m1",
            "author": "assistant",
            "text": "Bonjour !",
            "createdAt": "2026-03-01T10:00:00Z"
        });
        let msg = InboundMessage::from_value(&value).unwrap();
        match msg {
            InboundMessage::ChatMessage(chat) => {
                assert_eq!(chat.author, Author::Assistant);
                assert_eq!(chat.text, "Bonjour !");
                assert!(chat.created_at.is_some());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_typing_and_xp() {
        let typing = InboundMessage::from_value(&json!({"type": "typing", "isTyping": true})).unwrap();
        assert_eq!(typing, InboundMessage::Typing { is_typing: true });

        let xp = InboundMessage::from_value(&json!({"type": "xp_gain", "amount": 15})).unwrap();
        assert_eq!(xp, InboundMessage::XpGain { amount: 15.0 });
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let msg = InboundMessage::from_value(&json!({"type": "presence", "who": "x"})).unwrap();
        assert_eq!(msg, InboundMessage::Unknown);
    }

    #[test]
    fn summary_fields_are_camel_case() {
        let value = json!({
            "type": SESSION_SUMMARY_TYPE,
            "transcript": [{"author": "user", "text": "salut"}],
            "vocabularyLearned": ["marché"],
            "xpEarned": 40,
            "feedback": "Très bien"
        });
        let summary: SessionSummary = serde_json::from_value(value).unwrap();
        assert_eq!(summary.vocabulary_learned, vec!["marché"]);
        assert_eq!(summary.transcript[0].author, Author::User);
        assert!((summary.xp_earned - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_author_maps_to_system() {
        let chat: ChatMessage = serde_json::from_value(json!({
            "id": "m2", "author": "moderator", "text": "hi"
        }))
        .unwrap();
        assert_eq!(chat.author, Author::System);
    }

    #[test]
    fn outbound_envelopes() {
        let sid = SessionId::from_raw("sess_1");
        let chat = serde_json::to_value(OutboundMessage::ChatMessage {
            session_id: sid.clone(),
            text: "Je comprends".into(),
        })
        .unwrap();
        assert_eq!(chat, json!({"type": "chat_message", "sessionId": "sess_1", "text": "Je comprends"}));

        let interaction = serde_json::to_value(OutboundMessage::WordInteraction {
            session_id: sid,
            word: "marché".into(),
            action: WordAction::Proposed,
        })
        .unwrap();
        assert_eq!(interaction["type"], "word_interaction");
        assert_eq!(interaction["action"], "proposed");

        assert_eq!(serde_json::to_value(OutboundMessage::Ping).unwrap(), json!({"type": "ping"}));
    }
}
