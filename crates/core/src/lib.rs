//! Core utilities for the dreams renderer.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Run configuration (sample count, shadow resolution, present mode)
//! - Frame timing

mod config;
mod error;
mod logging;
mod timer;

pub use config::{PresentMode, RenderConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::FrameTimer;
