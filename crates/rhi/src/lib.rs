//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance and device creation, with optional software device preference
//! - Swapchain management and vsync control
//! - A graphics queue with a monotonic timeline and recycled command lists
//! - Attachment tables addressing render target views by slot
//! - Staging uploads into device-local buffers
//! - Pipeline and shader module creation

mod error;

pub mod attachments;
pub mod buffer;
pub mod command;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod queue;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod upload;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
