//! Resource loading error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from asset loading and record layout operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Failed to parse an OBJ file.
    #[error("Failed to load OBJ '{path}': {message}")]
    ObjLoad {
        /// Path of the file that failed.
        path: PathBuf,
        /// Loader error message.
        message: String,
    },

    /// A model file contained no geometry.
    #[error("Model '{0}' contains no meshes")]
    EmptyModel(PathBuf),

    /// A record index was outside its layout's capacity.
    #[error("Record index {index} out of range (capacity {capacity})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Layout capacity.
        capacity: usize,
    },

    /// The backing store was smaller than the layout requires.
    #[error("Backing store is {actual} bytes, layout needs {required}")]
    StoreTooSmall {
        /// Bytes available.
        actual: usize,
        /// Bytes required.
        required: usize,
    },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
