//! Core utilities for the frame engine.
//!
//! This crate provides foundational types and utilities used across the engine:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer and frame statistics utilities

mod error;
mod logging;
mod timer;

pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::{FrameStats, Timer};
