//! Draw use cases.
//!
//! Handles the trait/flaw draw command:
//! - Dropping redelivered command events
//! - Serializing draws per requester
//! - Drawing from both pools and replying on the chat platform

mod command;
mod serializer;

pub use command::{
    CommandMatcher, CommandOutcome, CommandReport, LucieCommand, APOLOGY_MESSAGE, BUSY_MESSAGE,
};
pub use serializer::{
    DrawResult, DrawSerializer, ProcessedEvents, RequesterGuard, RequesterLocks,
    DEFAULT_DEDUP_CAPACITY,
};
