//! API layer - HTTP keep-alive entry point.

pub mod http;
