//! RHI error types.

use ash::vk;
use thiserror::Error;

/// Error kinds surfaced by the Vulkan layer.
///
/// Native failures carry the name of the call that failed together with the
/// raw result code. Selection failures (`NoSuitableGpu`, `FeatureNotFound`) are
/// fatal at startup. Out-of-date and suboptimal swapchain results are not
/// errors and never end up here.
#[derive(Error, Debug)]
pub enum RhiError {
    /// A Vulkan call returned a non-success code.
    #[error("{operation} failed: {result}")]
    Vulkan {
        /// The call or step that failed.
        operation: &'static str,
        /// Raw result code.
        #[source]
        result: vk::Result,
    },

    /// Failed to load the Vulkan library.
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// GPU allocator error.
    #[error("Allocator error: {0}")]
    Allocator(#[from] gpu_allocator::AllocationError),

    /// No physical device met the requirements.
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// A required format or device feature is not supported.
    #[error("{0}")]
    FeatureNotFound(String),

    /// An API contract was violated by the caller.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Shader module loading error.
    #[error("Shader error: {0}")]
    Shader(String),

    /// Surface query or creation error.
    #[error("Surface error: {0}")]
    Surface(String),
}

impl RhiError {
    /// Raw Vulkan result code, if this is a native failure.
    pub fn vk_result(&self) -> Option<vk::Result> {
        match self {
            RhiError::Vulkan { result, .. } => Some(*result),
            _ => None,
        }
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

/// Attach an operation description to a raw Vulkan result.
pub trait VkResultExt<T> {
    /// Map the error into [`RhiError::Vulkan`] naming `operation`.
    fn context(self, operation: &'static str) -> RhiResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    #[inline]
    fn context(self, operation: &'static str) -> RhiResult<T> {
        self.map_err(|result| RhiError::Vulkan { operation, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_code() {
        let raw: Result<(), vk::Result> = Err(vk::Result::ERROR_DEVICE_LOST);
        let err = raw.context("vkQueueSubmit").unwrap_err();

        assert_eq!(err.vk_result(), Some(vk::Result::ERROR_DEVICE_LOST));
        let text = err.to_string();
        assert!(text.contains("vkQueueSubmit"));
        assert!(text.contains("ERROR_DEVICE_LOST"));
    }

    #[test]
    fn test_context_passes_success_through() {
        let raw: Result<u32, vk::Result> = Ok(7);
        assert_eq!(raw.context("noop").unwrap(), 7);
    }

    #[test]
    fn test_non_native_errors_have_no_code() {
        assert_eq!(RhiError::NoSuitableGpu.vk_result(), None);
        assert_eq!(
            RhiError::FeatureNotFound("no supported format".into()).vk_result(),
            None
        );
    }
}
