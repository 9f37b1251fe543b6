//! HTTP handlers for entity operations.

pub mod entity;
pub use entity::*;
