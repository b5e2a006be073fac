//! Message lifecycle state machine.
//!
//! ```text
//! queued ──► processing ──► submitted ──► delivered
//!    │           │              │
//!    │           ▼              ▼
//!    │        failed ◄──────── failed      (terminal)
//!    ▼
//! suppressed                               (terminal)
//! ```
//!
//! `delivered`, `failed` and `suppressed` are terminal: nothing transitions
//! out of them. `submitted` is only reachable together with a provider
//! message id, and `processing` can be reclaimed once stale.

use serde::{Deserialize, Serialize};

/// The lifecycle state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    /// Accepted by the admission path and handed to the queue.
    Queued,
    /// Claimed by a dispatch worker.
    Processing,
    /// Accepted by the provider; awaiting a delivery callback.
    Submitted,
    /// Provider confirmed delivery.
    Delivered,
    /// Terminal failure (policy, provider rejection, or retry exhaustion).
    Failed,
    /// Rejected by tenant policy before dispatch.
    Suppressed,
}

impl MessageState {
    /// Every state, in lifecycle order.
    pub const ALL: [MessageState; 6] = [
        Self::Queued,
        Self::Processing,
        Self::Submitted,
        Self::Delivered,
        Self::Failed,
        Self::Suppressed,
    ];

    /// Database/wire string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Submitted => "submitted",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Suppressed => "suppressed",
        }
    }

    /// Parse from the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "submitted" => Some(Self::Submitted),
            "delivered" => Some(Self::Delivered),
            "failed" => Some(Self::Failed),
            "suppressed" => Some(Self::Suppressed),
            _ => None,
        }
    }

    /// Whether no further transitions are permitted out of this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed | Self::Suppressed)
    }

    /// Whether the state machine permits a transition to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: MessageState) -> bool {
        match self {
            Self::Queued => matches!(
                next,
                Self::Processing | Self::Suppressed | Self::Failed
            ),
            Self::Processing => matches!(next, Self::Submitted | Self::Failed),
            Self::Submitted => matches!(next, Self::Delivered | Self::Failed),
            Self::Delivered | Self::Failed | Self::Suppressed => false,
        }
    }

    /// The states permitted to transition into `self`.
    ///
    /// State updates condition their WHERE clauses on this set, so an
    /// illegal transition (out of a terminal state in particular) matches
    /// zero rows instead of overwriting.
    #[must_use]
    pub fn valid_sources(self) -> Vec<MessageState> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }
}

impl std::fmt::Display for MessageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
