use showcase_resources::ResourceError;
use showcase_rhi::{Capability, RhiError};
use thiserror::Error;

/// Errors raised while setting up or driving a technique.
///
/// Every variant is fatal for the run; callers report and exit.
#[derive(Error, Debug)]
pub enum RendererError {
    #[error("Technique '{technique}' requires unsupported capability: {capability}")]
    Unsupported {
        technique: String,
        capability: Capability,
    },

    /// The command protocol was violated while recording.
    #[error("Recording error: {0}")]
    Recording(String),

    /// A handle that was never created or has already been destroyed.
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// A lifecycle hook was called in the wrong state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("RHI error: {0}")]
    Rhi(#[from] RhiError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Core(#[from] showcase_core::Error),
}

pub type RendererResult<T> = Result<T, RendererError>;
