//! Error types shared by the showcase crates.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the showcase.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file could not be parsed
    #[error("Config error in '{path}': {message}")]
    Config {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A configuration could not be written back out
    #[error("Config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

/// Result type alias using the showcase's Error type.
pub type Result<T> = std::result::Result<T, Error>;
