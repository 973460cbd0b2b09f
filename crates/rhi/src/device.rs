//! Vulkan logical device and queue management.
//!
//! This module handles VkDevice creation, queue retrieval, and gpu-allocator initialization.
//!
//! # Overview
//!
//! The [`Device`] struct provides a safe abstraction over the Vulkan logical device,
//! including:
//! - Logical device creation with the swapchain extension, Vulkan 1.3 dynamic
//!   rendering and whichever optional [`Capability`] set the caller asks for
//! - Queue retrieval for graphics and presentation
//! - Memory allocation via gpu-allocator
//! - The mesh shader command loader when mesh shading is enabled
//!
//! # Example
//!
//! ```no_run
//! use showcase_rhi::instance::Instance;
//! use showcase_rhi::physical_device::{Capability, DeviceCapabilities, select_physical_device};
//! use showcase_rhi::device::Device;
//! use ash::vk;
//!
//! let instance = Instance::new(false, &[]).expect("Failed to create instance");
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let required = [Capability::GeometryShader, Capability::MultiViewport];
//! let info = select_physical_device(instance.handle(), surface, &surface_loader, &required)
//!     .expect("No suitable GPU found");
//!
//! let device = Device::new(&instance, &info, DeviceCapabilities::from_list(&required))
//!     .expect("Failed to create logical device");
//! assert!(device.enabled_capabilities().multi_viewport);
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{Capability, DeviceCapabilities, PhysicalDeviceInfo, QueueFamilyIndices};

/// Extensions every device is created with.
const BASE_DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Vulkan logical device wrapper.
///
/// # Thread Safety
///
/// The [`Device`] is designed to be shared across threads using `Arc`. The internal
/// allocator is protected by a `Mutex` for thread-safe memory allocation.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// GPU memory allocator, dropped before the device.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Graphics queue handle.
    graphics_queue: vk::Queue,
    /// Presentation queue handle.
    present_queue: vk::Queue,
    /// Queue family indices.
    queue_families: QueueFamilyIndices,
    /// Optional capabilities enabled at creation.
    enabled: DeviceCapabilities,
    /// `VK_EXT_mesh_shader` command loader, present when mesh shading is enabled.
    mesh_shader: Option<ash::ext::mesh_shader::Device>,
}

impl Device {
    /// Creates a new logical device.
    ///
    /// The device always enables the swapchain extension and Vulkan 1.3
    /// dynamic rendering plus synchronization2. Each capability in `enabled`
    /// adds its core feature bit or its extension and feature struct.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::UnsupportedCapability`] if `enabled` asks for a
    /// capability the physical device lacks, or a Vulkan/allocator error if
    /// creation fails.
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
        enabled: DeviceCapabilities,
    ) -> RhiResult<Arc<Self>> {
        let queue_families = physical_device_info.queue_families;
        let (Some(graphics_family), Some(present_family)) =
            (queue_families.graphics_family, queue_families.present_family)
        else {
            return Err(RhiError::NoSuitableGpu);
        };

        let requested: Vec<Capability> = Capability::ALL
            .into_iter()
            .filter(|&c| enabled.supports(c))
            .collect();
        if let Some(&missing) = physical_device_info.capabilities.missing(&requested).first() {
            return Err(RhiError::UnsupportedCapability(missing.name().to_string()));
        }

        let unique_families = queue_families.unique_families();
        let queue_priorities = [1.0f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true)
            .maintenance4(true);

        let features = vk::PhysicalDeviceFeatures::default()
            .geometry_shader(enabled.geometry_shader)
            .multi_viewport(enabled.multi_viewport);

        let mut mesh_features = vk::PhysicalDeviceMeshShaderFeaturesEXT::default()
            .task_shader(true)
            .mesh_shader(true);
        let mut barycentric_features =
            vk::PhysicalDeviceFragmentShaderBarycentricFeaturesKHR::default()
                .fragment_shader_barycentric(true);

        let extension_names: Vec<*const i8> = BASE_DEVICE_EXTENSIONS
            .iter()
            .copied()
            .chain(enabled.extensions())
            .map(|ext| ext.as_ptr())
            .collect();

        let mut create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features)
            .push_next(&mut features_1_3);
        if enabled.mesh_shader {
            create_info = create_info.push_next(&mut mesh_features);
        }
        if enabled.fragment_shader_barycentric {
            create_info = create_info.push_next(&mut barycentric_features);
        }

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s), capabilities {:?}",
            extension_names.len(),
            requested
        );

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        debug!("Graphics queue retrieved from family {}", graphics_family);

        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        debug!("Present queue retrieved from family {}", present_family);

        let mesh_shader = enabled
            .mesh_shader
            .then(|| ash::ext::mesh_shader::Device::new(instance.handle(), &device));

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            queue_families,
            enabled,
            mesh_shader,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Graphics queue family index. Always present on a created device.
    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.queue_families.graphics_family.unwrap_or_default()
    }

    /// Capabilities enabled when the device was created.
    #[inline]
    pub fn enabled_capabilities(&self) -> DeviceCapabilities {
        self.enabled
    }

    /// Returns the mesh shader command loader.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::UnsupportedCapability`] if the device was created
    /// without mesh shading.
    pub fn mesh_shader(&self) -> RhiResult<&ash::ext::mesh_shader::Device> {
        self.mesh_shader
            .as_ref()
            .ok_or_else(|| RhiError::UnsupportedCapability(Capability::MeshShader.name().into()))
    }

    /// Locks the GPU memory allocator.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| RhiError::InvalidHandle("GPU allocator mutex poisoned".to_string()))
    }

    /// Blocks until all outstanding operations on all queues have completed.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits command buffers to the graphics queue.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - All command buffers are valid and recorded
    /// - Synchronization is properly handled
    /// - The fence (if provided) is not in use
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // All allocations must be freed by now; the allocator goes first.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: Device is Send+Sync because:
// - ash::Device and the extension loader are Send+Sync
// - vk::PhysicalDevice and vk::Queue are Copy types (handles)
// - Allocator is protected by Mutex
unsafe impl Send for Device {}
unsafe impl Sync for Device {}
