//! Entity modules wrapping domain operations.

pub mod pools;

pub use pools::Pools;
