//! The deferred render core.
//!
//! One frame flows through four passes recorded back to back into a single
//! command buffer: shadow maps per light, the multisampled geometry pass
//! with its resolve, additive lighting accumulation into the swapchain
//! image, and the text overlay. Per-frame GPU state (uniform regions,
//! attachments, descriptor sets) is pre-allocated per frame-in-flight and
//! addressed through dense slot indices assigned fresh every frame.

pub mod assets;
pub mod error;
pub mod frame;
pub mod passes;
pub mod pool;
pub mod renderer;
pub mod slots;
pub mod text;

pub use error::{RenderError, RenderResult};
pub use renderer::Renderer;

/// Fixed capacity of concurrently shaded lights.
///
/// Lights beyond this are skipped for the frame, never an error.
pub const MAX_LIGHTS: usize = 8;

/// Fixed capacity of renderable objects per frame.
pub const MAX_OBJECTS: usize = 2048;

/// Finite wait for frame fences and image acquisition, in nanoseconds.
/// Expiry is treated as device loss and answered with a full rebuild.
pub const FRAME_TIMEOUT_NS: u64 = 5_000_000_000;
