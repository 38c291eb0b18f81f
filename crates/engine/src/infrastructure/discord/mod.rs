//! Discord adapters.
//!
//! - `gateway` - websocket session that turns chat messages into command events
//! - `rest` - `ChatPort` implementation over the HTTP API
//! - `model` - wire types shared by both

pub mod gateway;
pub mod model;
pub mod rest;

pub use gateway::{BackoffState, DiscordGateway, GatewayError};
pub use rest::DiscordRest;
