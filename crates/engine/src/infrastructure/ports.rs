//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Chat platform delivery (could swap Discord -> another platform)
//! - Clock/Random (for testing)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lucie_domain::{ChannelId, EventId, GuildId, RequesterId};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chat request failed: {0}")]
    Request(String),
    #[error("Chat platform rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

// =============================================================================
// Inbound Command Types
// =============================================================================

/// Where a command was issued from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatContext {
    /// A server/group channel.
    Guild(GuildId),
    /// A private conversation with the bot.
    Direct,
}

impl ChatContext {
    pub fn is_guild(&self) -> bool {
        matches!(self, Self::Guild(_))
    }
}

/// One delivery of the draw command.
#[derive(Debug, Clone)]
pub struct CommandEvent {
    /// Identity of this particular message; redeliveries reuse it.
    pub event_id: EventId,
    pub requester: RequesterId,
    /// Display name, for logs only.
    pub requester_name: String,
    pub channel_id: ChannelId,
    pub context: ChatContext,
}

// =============================================================================
// Chat Port
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatPort: Send + Sync {
    async fn send_message(&self, channel_id: &ChannelId, content: &str) -> Result<(), ChatError>;
}

// =============================================================================
// Testability Ports
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[cfg_attr(test, mockall::automock)]
pub trait RandomPort: Send + Sync {
    /// Uniform index in `0..len`. Callers never pass `len == 0`.
    fn pick_index(&self, len: usize) -> usize;
}
