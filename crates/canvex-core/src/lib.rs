//! Core types, config, errors, and wire protocol for canvex.

pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod types;
