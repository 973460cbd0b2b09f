//! Swapchain frame loop around a [`FrameCycle`].
//!
//! Each frame slot owns a command buffer, an image-available semaphore and
//! an in-flight fence. Render-finished semaphores are kept per swapchain
//! image, since presentation may still be waiting on the one used by the
//! previous submission to that image.
//!
//! ```text
//! 1. Wait on the slot fence (previous use of this slot is done)
//! 2. Acquire a swapchain image (signals image_available)
//! 3. Reset fence and command buffer, record through the cycle
//! 4. Submit: wait image_available, signal render_finished[image] + fence
//! 5. Present (waits on render_finished[image])
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use showcase_core::FrameTiming;
use showcase_platform::{Surface, Window};
use showcase_rhi::RhiResult;
use showcase_rhi::command::{CommandBuffer, CommandPool};
use showcase_rhi::device::Device;
use showcase_rhi::instance::Instance;
use showcase_rhi::physical_device::select_physical_device;
use showcase_rhi::swapchain::{Swapchain, SwapchainStatus};
use showcase_rhi::sync::{Fence, Semaphore};
use showcase_scene::Camera;

use super::context::VulkanContext;
use super::depth_buffer::{DEFAULT_DEPTH_FORMAT, DepthBuffer};
use super::recorder::RenderTarget;
use crate::context::SurfaceFormats;
use crate::cycle::FrameCycle;
use crate::error::RendererResult;
use crate::handles::Extent;
use crate::technique::{FrameInput, Technique};
use crate::{FrameSlot, MAX_FRAMES_IN_FLIGHT, PerFrame};

/// Startup options for [`VulkanFrameLoop::new`].
#[derive(Clone, Debug)]
pub struct VulkanSettings {
    pub validation: bool,
    /// Directory holding one subdirectory of SPIR-V files per technique.
    pub shaders: PathBuf,
}

/// Per-slot command buffer and synchronization.
struct FrameSync {
    command_buffer: CommandBuffer,
    image_available: Semaphore,
    in_flight: Fence,
}

impl FrameSync {
    fn new(device: Arc<Device>, command_pool: &CommandPool) -> RhiResult<Self> {
        let command_buffer = CommandBuffer::new(device.clone(), command_pool)?;
        let image_available = Semaphore::new(device.clone())?;
        // Signaled so the first wait on each slot returns immediately.
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            command_buffer,
            image_available,
            in_flight,
        })
    }
}

fn image_semaphores(device: &Arc<Device>, count: u32) -> RhiResult<Vec<Semaphore>> {
    (0..count).map(|_| Semaphore::new(device.clone())).collect()
}

fn to_extent(extent: vk::Extent2D) -> Extent {
    Extent::new(extent.width, extent.height)
}

/// Owns the device, swapchain and per-frame sync, and runs one
/// [`FrameCycle`] frame per [`draw_frame`](Self::draw_frame).
///
/// Fields drop in declaration order: everything created from the device
/// first, then the device, the surface and finally the instance.
pub struct VulkanFrameLoop {
    context: VulkanContext,
    render_finished: Vec<Semaphore>,
    frames: PerFrame<FrameSync>,
    command_pool: CommandPool,
    depth_buffer: DepthBuffer,
    swapchain: Swapchain,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
    window_extent: Extent,
    needs_recreate: bool,
    frame_number: u64,
}

impl VulkanFrameLoop {
    /// Brings up Vulkan for `window`.
    ///
    /// Every optional capability the selected GPU supports is enabled;
    /// techniques that need a missing one fail in
    /// [`FrameCycle::prepare`].
    pub fn new(window: &Window, settings: &VulkanSettings) -> RendererResult<Self> {
        let extensions = window.required_extensions()?;
        let instance = Instance::new(settings.validation, extensions)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader(), &[])?;
        info!(
            "Selected GPU: {} ({})",
            info.device_name(),
            info.device_type_name()
        );
        let device = Device::new(&instance, &info, info.capabilities)?;

        let window_extent = Extent::new(window.width(), window.height());
        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            window_extent.width,
            window_extent.height,
        )?;
        let extent = to_extent(swapchain.extent());

        let depth_buffer = DepthBuffer::new(device.clone(), extent, DEFAULT_DEPTH_FORMAT)?;
        let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;
        let frames = PerFrame::try_from_fn(|_| FrameSync::new(device.clone(), &command_pool))?;
        let render_finished = image_semaphores(&device, swapchain.image_count())?;

        let formats = SurfaceFormats {
            color: swapchain.format(),
            depth: Some(depth_buffer.format()),
        };
        let context = VulkanContext::new(device.clone(), settings.shaders.clone(), formats, extent);

        info!(
            "Frame loop ready: {} swapchain image(s), {} frame(s) in flight",
            swapchain.image_count(),
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            context,
            render_finished,
            frames,
            command_pool,
            depth_buffer,
            swapchain,
            device,
            surface,
            instance,
            window_extent,
            needs_recreate: false,
            frame_number: 0,
        })
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut VulkanContext {
        &mut self.context
    }

    /// Current swapchain extent.
    #[inline]
    pub fn extent(&self) -> Extent {
        to_extent(self.swapchain.extent())
    }

    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Records a new window size; the swapchain is rebuilt before the next
    /// frame. A zero size (minimized window) pauses rendering.
    pub fn resize(&mut self, extent: Extent) {
        self.window_extent = extent;
        if !extent.is_empty() {
            self.needs_recreate = true;
        }
    }

    /// Renders and presents one frame.
    pub fn draw_frame<T: Technique>(
        &mut self,
        cycle: &mut FrameCycle<T>,
        camera: &Camera,
        timing: FrameTiming,
    ) -> RendererResult<()> {
        if self.window_extent.is_empty() {
            return Ok(());
        }
        if self.needs_recreate {
            self.recreate_swapchain(cycle)?;
        }

        let slot = FrameSlot::for_frame(self.frame_number);
        let frame = &self.frames[slot];
        frame.in_flight.wait(u64::MAX)?;

        let (image_index, status) = self
            .swapchain
            .acquire_next_image(frame.image_available.handle())?;
        let Some(image_index) = image_index else {
            debug!("Swapchain out of date during acquire");
            self.needs_recreate = true;
            return Ok(());
        };
        if status == SwapchainStatus::Suboptimal {
            self.needs_recreate = true;
        }

        frame.in_flight.reset()?;
        frame.command_buffer.reset()?;

        let target = RenderTarget {
            color_image: self.swapchain.image(image_index)?,
            color_view: self.swapchain.image_view(image_index)?,
            depth_image: self.depth_buffer.image(),
            depth_view: self.depth_buffer.image_view(),
        };
        let mut recorder = self.context.recorder(frame.command_buffer.handle(), target);
        let input = FrameInput {
            camera: camera.clone(),
            extent: to_extent(self.swapchain.extent()),
            timing,
        };
        cycle.render(&mut self.context, &mut recorder, &input, self.frame_number)?;

        let render_finished = self.render_finished[image_index as usize].handle();
        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [render_finished];
        let command_buffers = [frame.command_buffer.handle()];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .submit_graphics(&[submit_info], frame.in_flight.handle())?;
        }

        let status =
            self.swapchain
                .present(self.device.present_queue(), image_index, render_finished)?;
        if status.needs_recreate() {
            self.needs_recreate = true;
        }

        self.frame_number += 1;
        Ok(())
    }

    fn recreate_swapchain<T: Technique>(&mut self, cycle: &mut FrameCycle<T>) -> RendererResult<()> {
        self.device.wait_idle()?;

        self.swapchain.recreate(
            &self.instance,
            self.surface.handle(),
            self.window_extent.width,
            self.window_extent.height,
        )?;
        let extent = to_extent(self.swapchain.extent());

        self.depth_buffer = DepthBuffer::new(self.device.clone(), extent, self.depth_buffer.format())?;
        self.render_finished = image_semaphores(&self.device, self.swapchain.image_count())?;
        // An acquire that returned out-of-date leaves its semaphore unsignaled
        // but possibly pending; fresh ones avoid reusing it.
        for frame in self.frames.values_mut() {
            frame.image_available = Semaphore::new(self.device.clone())?;
        }

        self.context.set_extent(extent);
        cycle.resize(extent);
        self.needs_recreate = false;

        info!("Swapchain recreated at {}", extent);
        Ok(())
    }
}

impl Drop for VulkanFrameLoop {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle before teardown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_extent_copies_dimensions() {
        let extent = to_extent(vk::Extent2D {
            width: 1280,
            height: 720,
        });
        assert_eq!(extent, Extent::new(1280, 720));
    }

    #[test]
    fn test_settings_are_cloneable() {
        let settings = VulkanSettings {
            validation: true,
            shaders: PathBuf::from("shaders"),
        };
        let copy = settings.clone();
        assert!(copy.validation);
        assert_eq!(copy.shaders, settings.shaders);
    }
}
