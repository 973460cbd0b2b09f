//! Showcase configuration loaded from a TOML file.
//!
//! Every section is optional; missing keys fall back to their defaults so a
//! config file only needs to name what it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_title")]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Kebab-case technique name, e.g. `push-constants`.
    #[serde(default = "default_technique")]
    pub technique: String,
    /// Seed for every procedural value a technique generates.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_true")]
    pub validation: bool,
    /// Frames rendered by `--headless` when no count is given.
    #[serde(default = "default_headless_frames")]
    pub headless_frames: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_assets")]
    pub assets: PathBuf,
    #[serde(default = "default_shaders")]
    pub shaders: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_position")]
    pub position: [f32; 3],
    /// Euler angles in degrees.
    #[serde(default)]
    pub rotation: [f32; 3],
}

fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_title() -> String {
    "Vulkan technique showcase".to_string()
}
fn default_technique() -> String {
    "push-constants".to_string()
}
fn default_seed() -> u64 {
    42
}
fn default_true() -> bool {
    true
}
fn default_headless_frames() -> u32 {
    3
}
fn default_assets() -> PathBuf {
    PathBuf::from("assets")
}
fn default_shaders() -> PathBuf {
    PathBuf::from("shaders/spirv")
}
fn default_camera_position() -> [f32; 3] {
    [0.0, 0.0, -10.0]
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            technique: default_technique(),
            seed: default_seed(),
            validation: true,
            headless_frames: default_headless_frames(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            shaders: default_shaders(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: default_camera_position(),
            rotation: [0.0; 3],
        }
    }
}

impl Config {
    /// Parses a config from TOML text. `origin` is only used in error messages.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Loads a config file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text, path)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads a config file, or returns the defaults when it does not exist.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
