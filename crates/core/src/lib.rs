//! Core utilities for the technique showcase.
//!
//! This crate provides foundational types used across every other crate:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - TOML configuration

mod clock;
mod config;
mod error;
mod logging;

pub use clock::{FrameClock, FrameTiming};
pub use config::{CameraConfig, Config, PathsConfig, RunConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
