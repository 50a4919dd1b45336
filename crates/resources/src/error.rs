//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// tobj failed to parse the OBJ file.
    #[error("Failed to load OBJ file '{path}': {source}")]
    ObjLoad {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    /// OBJ file produced no triangles.
    #[error("OBJ file '{0}' contains no geometry")]
    EmptyModel(PathBuf),

    /// A mesh refers to a material the MTL file does not define.
    #[error("Mesh '{mesh}' uses material {material} but only {count} are defined")]
    MaterialOutOfRange {
        mesh: String,
        material: usize,
        count: usize,
    },

    /// Model is larger than a 32-bit index buffer can address.
    #[error("Model has too many {0} for 32-bit indices")]
    TooLarge(&'static str),

    /// Draw ranges do not partition the index buffer.
    #[error("Invalid draw ranges: {0}")]
    InvalidDrawRanges(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
