//! RHI-specific error types.
//!
//! Every variant here is fatal for the render loop. Presentation states that
//! callers are expected to recover from (`OutOfDate`, `Suboptimal`) are never
//! reported through this type; see [`crate::swapchain::PresentStatus`].

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Shader module could not be loaded or created
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// The platform rejected the requested presentation chain configuration.
    #[error("Presentation chain creation failed: {0}")]
    ChainCreation(String),

    /// A recreated presentation chain came back with different attachment formats.
    #[error("Attachment format changed across chain recreation: expected {expected:?}, found {found:?}")]
    FormatMismatch {
        /// Color/depth formats of the chain being replaced.
        expected: (vk::Format, vk::Format),
        /// Color/depth formats of the replacement chain.
        found: (vk::Format, vk::Format),
    },

    /// No format in a candidate list supports the requested features
    #[error("No supported format among {0:?}")]
    UnsupportedFormat(Vec<vk::Format>),

    /// Invalid handle or out-of-range resource access
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vk_result_converts() {
        let err: RhiError = vk::Result::ERROR_DEVICE_LOST.into();
        assert!(matches!(err, RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST)));
    }

    #[test]
    fn test_format_mismatch_message() {
        let err = RhiError::FormatMismatch {
            expected: (vk::Format::B8G8R8A8_SRGB, vk::Format::D32_SFLOAT),
            found: (vk::Format::R8G8B8A8_UNORM, vk::Format::D32_SFLOAT),
        };
        let message = err.to_string();
        assert!(message.contains("B8G8R8A8_SRGB"));
        assert!(message.contains("R8G8B8A8_UNORM"));
    }
}
