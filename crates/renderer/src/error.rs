//! Renderer error type.

use meshview_resources::ResourceError;
use meshview_rhi::RhiError;
use thiserror::Error;

/// Errors that abort a frame or renderer setup.
#[derive(Error, Debug)]
pub enum RendererError {
    /// Vulkan layer failure.
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Model or texture loading failure.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Window, surface or configuration failure.
    #[error(transparent)]
    Platform(#[from] meshview_core::Error),
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = std::result::Result<T, RendererError>;
