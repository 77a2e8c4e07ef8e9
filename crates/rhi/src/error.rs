//! RHI error types.

use thiserror::Error;

/// Errors produced by the Vulkan abstraction layer.
///
/// Creation failures are fatal at startup or reconfiguration time; there is
/// no per-frame recovery path for them.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Raw Vulkan API error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// GPU memory allocation error
    #[error("Allocation error: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),

    /// No GPU satisfies the renderer's requirements
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Shader loading or module creation error
    #[error("Shader error: {0}")]
    Shader(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    Surface(String),

    /// Swapchain creation or configuration error
    #[error("Swapchain error: {0}")]
    Swapchain(String),

    /// An argument was out of range for the target resource
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// Pipeline configuration error
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
