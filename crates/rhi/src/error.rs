//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No adapter satisfied the engine's device requirements
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// SPIR-V module loading error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain creation or presentation error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Misuse of a resource handle, such as a vacant attachment slot or an
    /// out-of-bounds buffer write
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
