//! Asset loading.
//!
//! glTF models are flattened into CPU-side triangle meshes that the GPU
//! backends upload as vertex and index buffers.

mod error;
pub mod model;

pub use error::{ResourceError, ResourceResult};
pub use model::{Mesh, Model};
