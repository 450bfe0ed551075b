//! Per-connection scope filter.
//!
//! The hub fans every payload out to every registered connection; each
//! outbound pump then decides locally whether a payload belongs to its chat.

use super::envelope::Envelope;
use crate::domain::ChatId;

/// Decides which queued payloads a single connection forwards to its socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeFilter {
    chat_id: ChatId,
}

impl ScopeFilter {
    /// Creates a filter for a connection bound to `chat_id`.
    #[must_use]
    pub const fn new(chat_id: ChatId) -> Self {
        Self { chat_id }
    }

    /// Returns the chat this filter admits.
    #[must_use]
    pub const fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Returns `true` if `payload` should be written to this connection.
    ///
    /// Payloads that carry a scope are admitted only when it equals this
    /// connection's chat. Unscoped envelopes and payloads that do not decode
    /// as envelopes are admitted unconditionally.
    #[must_use]
    pub fn admits(&self, payload: &[u8]) -> bool {
        match Envelope::decode(payload) {
            Ok(Envelope {
                chat_id: Some(scope),
                ..
            }) => scope == self.chat_id,
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, "delivering undecodable payload unfiltered");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_matching_scope() {
        let filter = ScopeFilter::new(ChatId::new(1));
        assert!(filter.admits(br#"{"content":"x","chat_id":1}"#));
    }

    #[test]
    fn rejects_other_scope() {
        let filter = ScopeFilter::new(ChatId::new(1));
        assert!(!filter.admits(br#"{"content":"x","chat_id":2}"#));
    }

    #[test]
    fn unscoped_is_universal() {
        let one = ScopeFilter::new(ChatId::new(1));
        let two = ScopeFilter::new(ChatId::new(2));
        for payload in [
            br#"{"content":"x"}"#.as_slice(),
            br#"{"content":"x","chat_id":0}"#.as_slice(),
        ] {
            assert!(one.admits(payload));
            assert!(two.admits(payload));
        }
    }

    #[test]
    fn raw_payloads_are_universal() {
        let filter = ScopeFilter::new(ChatId::new(5));
        assert!(filter.admits(b"not json at all"));
        assert!(filter.admits(&[0xff, 0xfe, 0x00]));
    }
}
