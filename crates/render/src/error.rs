//! Render core error types.

use thiserror::Error;

use dreams_resources::ResourceError;
use dreams_rhi::RhiError;

/// Errors from the render core.
///
/// Capacity overflow is deliberately absent: too many lights or objects
/// truncates the frame's draw set and logs, it never fails the frame.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Vulkan-layer failure, fatal at startup or reconfiguration.
    #[error("RHI error: {0}")]
    Rhi(#[from] RhiError),

    /// Asset or record layout failure.
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// A fence or acquire wait expired; the device is considered lost and
    /// the swapchain and resource pool must be recreated.
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// No camera entity was registered before rendering.
    #[error("No camera set")]
    NoCamera,

    /// A draw referenced a model or texture the asset library does not hold.
    #[error("Unknown asset reference: {0}")]
    UnknownAsset(String),

    /// Platform-layer failure.
    #[error("Platform error: {0}")]
    Platform(#[from] dreams_core::Error),
}

/// Result type alias for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
