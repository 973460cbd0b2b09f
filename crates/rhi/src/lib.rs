//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin RAII wrappers over `ash` for what the technique demos use:
//! - Instance, physical device selection by [`Capability`], logical device
//! - Swapchain and synchronization primitives
//! - Command buffers, including mesh task dispatch
//! - Host-visible buffers and uniform descriptor sets
//! - Graphics pipelines for vertex, geometry and mesh front ends

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};
pub use physical_device::{Capability, DeviceCapabilities};

pub use ash::vk;
