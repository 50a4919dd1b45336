//! Error types for the platform layer and startup glue.

use thiserror::Error;

/// Error type for window, surface and configuration failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or handle queries failed.
    #[error("Window error: {0}")]
    Window(String),

    /// Vulkan surface creation failed.
    #[error("Surface error: {0}")]
    Surface(String),

    /// An invalid configuration value.
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
