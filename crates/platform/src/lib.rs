//! Platform abstraction layer for the renderer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit, including fullscreen switching
//! - Vulkan surface creation from raw window handles

mod window;

pub use window::{Surface, Window};
