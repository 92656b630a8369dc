//! # MPU Common Library
//!
//! Shared code for the marketplace product updater crates:
//! - Error type
//! - Configuration file resolution and loading
//! - Event types and the event bus used for progress broadcasting
//! - SSE helpers
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
