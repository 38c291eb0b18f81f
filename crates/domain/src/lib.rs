//! Lucie domain layer.
//!
//! Pure types for the trait/flaw draw: the built-in catalog, the per-list
//! cooldown pool, and the identifiers the chat platform hands us. Nothing in
//! here performs I/O, reads the wall clock, or owns a random generator; time
//! and randomness are passed in by the caller.

pub mod catalog;
pub mod cooldown;
pub mod error;
pub mod ids;

pub use catalog::{Catalog, Item, PoolKind};
pub use cooldown::{format_wait, CooldownPool, PoolExhausted, DEFAULT_COOLDOWN};
pub use error::DomainError;
pub use ids::{ChannelId, EventId, GuildId, RequesterId};
