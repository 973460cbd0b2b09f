//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Failed to load glTF file '{path}': {message}")]
    GltfLoad { path: PathBuf, message: String },

    #[error("glTF file '{0}' contains no meshes")]
    NoMeshes(PathBuf),

    /// A primitive without a POSITION accessor.
    #[error("Mesh '{mesh}' has a primitive with no position data")]
    NoPositionData { mesh: String },

    #[error("Mesh '{mesh}' has index {index} but only {vertex_count} vertices")]
    IndexOutOfRange {
        mesh: String,
        index: u32,
        vertex_count: usize,
    },

    /// Vertex streams of one primitive disagree on the vertex count.
    #[error("Mesh '{mesh}' has {found} {stream} for {expected} positions")]
    StreamLength {
        mesh: String,
        stream: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

pub type ResourceResult<T> = Result<T, ResourceError>;
