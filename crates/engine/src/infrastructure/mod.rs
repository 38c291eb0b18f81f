//! Infrastructure layer - external dependency implementations.
//!
//! - `ports` - Trait definitions (the ONLY abstractions)
//! - `clock` - System clock and random
//! - `discord` - Chat platform gateway + REST adapters
//! - `settings` - Environment configuration
//! - `instance_lock` - Single-instance PID file

pub mod clock;
pub mod correlation;
pub mod discord;
pub mod instance_lock;
pub mod ports;
pub mod settings;
