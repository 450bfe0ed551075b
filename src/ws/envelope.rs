//! Wire envelope for chat messages.
//!
//! The same JSON shape is used in both directions:
//!
//! ```json
//! { "content": "hello", "chat_id": 7 }
//! ```
//!
//! `chat_id` omitted, `null`, or `0` all decode to "no scope". An unscoped
//! envelope on the outbound side is delivered to every connection.

use axum::body::Bytes;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::ChatId;

/// Failure to decode or encode an [`Envelope`].
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The payload is not JSON or does not match the envelope schema.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Serialization failed.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

/// One chat message as it travels over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message text, relayed byte-for-byte.
    #[serde(default)]
    pub content: String,

    /// Routing scope. `None` means the envelope is not scoped to a chat.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scope_from_wire"
    )]
    pub chat_id: Option<ChatId>,
}

impl Envelope {
    /// Creates an unscoped envelope.
    #[must_use]
    pub fn unscoped(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            chat_id: None,
        }
    }

    /// Creates an envelope scoped to `chat_id`.
    #[must_use]
    pub fn scoped(content: impl Into<String>, chat_id: ChatId) -> Self {
        Self {
            content: content.into(),
            chat_id: Some(chat_id),
        }
    }

    /// Parses a raw frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] if the payload is not a JSON
    /// object with a string `content` and an integer `chat_id`.
    pub fn decode(payload: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(payload).map_err(EnvelopeError::Malformed)
    }

    /// Serializes the envelope into a frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<Bytes, EnvelopeError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(EnvelopeError::Encode)
    }

    /// Replaces the routing scope, discarding whatever the client asserted.
    #[must_use]
    pub fn rescoped(mut self, chat_id: ChatId) -> Self {
        self.chat_id = chat_id.is_assigned().then_some(chat_id);
        self
    }
}

fn scope_from_wire<'de, D>(deserializer: D) -> Result<Option<ChatId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.filter(|id| *id != 0).map(ChatId::new))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> Envelope {
        let Ok(envelope) = Envelope::decode(raw.as_bytes()) else {
            panic!("expected {raw} to decode");
        };
        envelope
    }

    #[test]
    fn decodes_scoped_message() {
        let envelope = decode(r#"{"content":"hello","chat_id":7}"#);
        assert_eq!(envelope, Envelope::scoped("hello", ChatId::new(7)));
    }

    #[test]
    fn missing_null_and_zero_scope_are_unscoped() {
        assert_eq!(decode(r#"{"content":"a"}"#).chat_id, None);
        assert_eq!(decode(r#"{"content":"a","chat_id":null}"#).chat_id, None);
        assert_eq!(decode(r#"{"content":"a","chat_id":0}"#).chat_id, None);
    }

    #[test]
    fn missing_content_defaults_to_empty() {
        assert_eq!(decode(r#"{"chat_id":3}"#).content, "");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let envelope = decode(r#"{"content":"x","chat_id":2,"sender":"mallory"}"#);
        assert_eq!(envelope, Envelope::scoped("x", ChatId::new(2)));
    }

    #[test]
    fn rejects_non_envelopes() {
        assert!(Envelope::decode(b"hello").is_err());
        assert!(Envelope::decode(br#""just a string""#).is_err());
        assert!(Envelope::decode(br#"{"content":5}"#).is_err());
        assert!(Envelope::decode(br#"{"content":"x","chat_id":"7"}"#).is_err());
    }

    #[test]
    fn unscoped_encoding_omits_chat_id() {
        let Ok(bytes) = Envelope::unscoped("hi").encode() else {
            panic!("encode failed");
        };
        assert_eq!(bytes.as_ref(), br#"{"content":"hi"}"#.as_slice());
    }

    #[test]
    fn rescoping_overrides_client_scope() {
        let spoofed = decode(r#"{"content":"psst","chat_id":99}"#);
        let Ok(bytes) = spoofed.rescoped(ChatId::new(7)).encode() else {
            panic!("encode failed");
        };
        assert_eq!(bytes.as_ref(), br#"{"content":"psst","chat_id":7}"#.as_slice());
    }

    #[test]
    fn content_survives_reencoding_exactly() {
        let original = "héllo \"world\"\n\t🙂 \\";
        let Ok(bytes) = Envelope::scoped(original, ChatId::new(1)).encode() else {
            panic!("encode failed");
        };
        let Ok(decoded) = Envelope::decode(&bytes) else {
            panic!("decode failed");
        };
        assert_eq!(decoded.content, original);
    }
}
