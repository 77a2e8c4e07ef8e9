//! Asset loading and GPU data layouts.
//!
//! This crate owns the CPU side of asset handling:
//! - OBJ model loading with object-space bounds
//! - PNG texture decoding
//! - Uniform record types matching the shader block layouts
//! - Bounds-checked, fixed-stride record views over mapped memory
//! - Loading-progress tracking for the splash screen

pub mod error;
pub mod loading;
pub mod model;
pub mod records;
pub mod texture;

pub use error::{ResourceError, ResourceResult};
pub use loading::LoadTracker;
pub use model::{MeshData, ModelData};
pub use records::{CameraRecord, LightRecord, ObjectRecord, RecordLayout};
pub use texture::TextureData;
