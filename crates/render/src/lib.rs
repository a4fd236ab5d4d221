//! Frame rendering for the engine.
//!
//! This crate orchestrates the frame lifecycle:
//! - Back buffer acquisition and presentation
//! - Command recording and timeline-paced submission
//! - Depth buffering and push constant data

pub mod constants;
pub mod depth_buffer;
pub mod renderer;

pub use renderer::Renderer;
