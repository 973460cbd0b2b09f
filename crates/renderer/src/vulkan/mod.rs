//! Vulkan backend for the frame render cycle.
//!
//! - [`VulkanContext`]: resources behind the [`GpuContext`](crate::GpuContext) seam
//! - [`VulkanRecorder`]: a frame's command buffer behind [`CommandRecorder`](crate::CommandRecorder)
//! - [`VulkanFrameLoop`]: swapchain, frames in flight, submission and presentation
//! - [`DepthBuffer`]: depth attachment sized to the swapchain

mod context;
mod depth_buffer;
mod frame_loop;
mod recorder;

pub use context::VulkanContext;
pub use depth_buffer::{DEFAULT_DEPTH_FORMAT, DepthBuffer};
pub use frame_loop::{VulkanFrameLoop, VulkanSettings};
pub use recorder::{RenderTarget, VulkanRecorder};
