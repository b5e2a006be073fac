//! Message identifiers.
//!
//! Message ids are time-prefixed and lexicographically sortable so that
//! database indexes and dashboards stay roughly chronological. The newtype
//! prevents accidentally passing a tenant id or idempotency key where a
//! message id is expected.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Prefix applied to every message id.
const MESSAGE_ID_PREFIX: &str = "msg_";

/// Error type for message id parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMessageIdError {
    /// Description of what failed to parse.
    pub message: String,
}

impl Display for ParseMessageIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse MessageId: {}", self.message)
    }
}

impl std::error::Error for ParseMessageIdError {}

/// A message identifier: `msg_` followed by a UUIDv7 in simple form.
///
/// UUIDv7 embeds a millisecond timestamp in its most significant bits, so
/// ids sort by creation time both as UUIDs and as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Mint a new time-ordered message id.
    #[must_use]
    pub fn new() -> Self {
        Self(format!(
            "{MESSAGE_ID_PREFIX}{}",
            Uuid::now_v7().as_simple()
        ))
    }

    /// View the id as a string slice (the stored/wire representation).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ParseMessageIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(raw) = s.strip_prefix(MESSAGE_ID_PREFIX) else {
            return Err(ParseMessageIdError {
                message: format!("missing '{MESSAGE_ID_PREFIX}' prefix"),
            });
        };
        Uuid::try_parse(raw).map_err(|e| ParseMessageIdError {
            message: e.to_string(),
        })?;
        Ok(Self(s.to_string()))
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_prefix() {
        let id = MessageId::new();
        assert!(id.as_str().starts_with("msg_"));
    }

    #[test]
    fn test_ids_sort_by_creation_time() {
        let first = MessageId::new();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = MessageId::new();
        assert!(first.as_str() < second.as_str());
    }

    #[test]
    fn test_round_trip_from_str() {
        let id = MessageId::new();
        let parsed: MessageId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_rejects_missing_prefix() {
        let result: Result<MessageId, _> =
            "0191d2a1b2c3d4e5f60718293a4b5c6d".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_garbage_suffix() {
        let result: Result<MessageId, _> = "msg_not-a-uuid".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let id = MessageId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_str()));

        let back: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
