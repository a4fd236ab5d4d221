//! Application-level error types.

use thiserror::Error;

/// Errors surfaced outside the RHI layer: windowing, startup configuration, IO.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Vulkan errors raised outside the RHI crate, such as surface creation
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Invalid startup configuration (command line arguments, shader paths)
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the application's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
