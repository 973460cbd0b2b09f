//! Physical device (GPU) selection and capability probing.
//!
//! Techniques rely on optional hardware features (geometry shaders, multiple
//! viewports, mesh shading, barycentric fragment inputs). Selection probes
//! each GPU for them through `vkGetPhysicalDeviceFeatures2` and the device
//! extension list, and records the result as [`DeviceCapabilities`].
//!
//! # Example
//!
//! ```no_run
//! use showcase_rhi::instance::Instance;
//! use showcase_rhi::physical_device::{Capability, select_physical_device};
//! use ash::vk;
//!
//! let instance = Instance::new(false, &[]).expect("Failed to create instance");
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let info = select_physical_device(instance.handle(), surface, &surface_loader, &[Capability::MeshShader])
//!     .expect("No suitable GPU found");
//! assert!(info.capabilities.supports(Capability::MeshShader));
//! ```

use std::ffi::CStr;
use std::fmt;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Optional device capability a technique may depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `geometryShader` core feature.
    GeometryShader,
    /// `multiViewport` core feature.
    MultiViewport,
    /// `VK_EXT_mesh_shader` with both task and mesh shaders.
    MeshShader,
    /// `VK_KHR_fragment_shader_barycentric`.
    FragmentShaderBarycentric,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::GeometryShader,
        Capability::MultiViewport,
        Capability::MeshShader,
        Capability::FragmentShaderBarycentric,
    ];

    /// Device extension that must be enabled for this capability, if any.
    pub fn extension(self) -> Option<&'static CStr> {
        match self {
            Capability::GeometryShader | Capability::MultiViewport => None,
            Capability::MeshShader => Some(ash::ext::mesh_shader::NAME),
            Capability::FragmentShaderBarycentric => {
                Some(ash::khr::fragment_shader_barycentric::NAME)
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::GeometryShader => "geometry shader",
            Capability::MultiViewport => "multi viewport",
            Capability::MeshShader => "mesh shader",
            Capability::FragmentShaderBarycentric => "fragment shader barycentric",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of optional capabilities a GPU supports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub geometry_shader: bool,
    pub multi_viewport: bool,
    pub mesh_shader: bool,
    pub fragment_shader_barycentric: bool,
}

impl DeviceCapabilities {
    /// Every capability enabled. Used by the headless backend.
    pub fn all() -> Self {
        Self {
            geometry_shader: true,
            multi_viewport: true,
            mesh_shader: true,
            fragment_shader_barycentric: true,
        }
    }

    /// Builds a set containing exactly the given capabilities.
    pub fn from_list(list: &[Capability]) -> Self {
        let mut caps = Self::default();
        for &capability in list {
            caps.set(capability, true);
        }
        caps
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::GeometryShader => self.geometry_shader,
            Capability::MultiViewport => self.multi_viewport,
            Capability::MeshShader => self.mesh_shader,
            Capability::FragmentShaderBarycentric => self.fragment_shader_barycentric,
        }
    }

    pub fn set(&mut self, capability: Capability, enabled: bool) {
        match capability {
            Capability::GeometryShader => self.geometry_shader = enabled,
            Capability::MultiViewport => self.multi_viewport = enabled,
            Capability::MeshShader => self.mesh_shader = enabled,
            Capability::FragmentShaderBarycentric => self.fragment_shader_barycentric = enabled,
        }
    }

    /// Capabilities from `required` that are missing in this set.
    pub fn missing(&self, required: &[Capability]) -> Vec<Capability> {
        required
            .iter()
            .copied()
            .filter(|&c| !self.supports(c))
            .collect()
    }

    /// Extensions needed to enable every capability in this set.
    pub fn extensions(&self) -> Vec<&'static CStr> {
        Capability::ALL
            .iter()
            .filter(|&&c| self.supports(c))
            .filter_map(|c| c.extension())
            .collect()
    }
}

/// Queue family indices for graphics and presentation.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to a surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the unique queue family indices.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }
}

/// Information about a physical device (GPU).
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for different operations.
    pub queue_families: QueueFamilyIndices,
    /// Optional capabilities probed on this device.
    pub capabilities: DeviceCapabilities,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Returns the total device local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Selects the most suitable physical device for rendering.
///
/// A device qualifies when it has graphics and present queues, supports
/// Vulkan 1.3 and exposes every capability in `required`. Among qualifying
/// devices discrete GPUs win.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no device qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    required: &[Capability],
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let mut suitable_devices: Vec<(PhysicalDeviceInfo, u32)> = Vec::new();

    for device in devices {
        if let Some(info) =
            check_device_suitability(instance, device, surface, surface_loader, required)
        {
            let score = rate_device(&info);
            debug!(
                "GPU '{}' ({}) - Score: {}",
                info.device_name(),
                info.device_type_name(),
                score
            );
            suitable_devices.push((info, score));
        }
    }

    suitable_devices.sort_by(|a, b| b.1.cmp(&a.1));
    let Some((selected_device, score)) = suitable_devices.into_iter().next() else {
        warn!("No suitable GPU found with required capabilities {:?}", required);
        return Err(RhiError::NoSuitableGpu);
    };

    let (major, minor, patch) = selected_device.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, Score: {}",
        selected_device.device_name(),
        selected_device.device_type_name(),
        major,
        minor,
        patch,
        score
    );

    Ok(selected_device)
}

/// Queries the optional capabilities a device exposes.
pub fn query_capabilities(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> Result<DeviceCapabilities, RhiError> {
    let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };
    let has_extension = |name: &CStr| {
        extensions
            .iter()
            .any(|ext| ext.extension_name_as_c_str().is_ok_and(|n| n == name))
    };

    let mut mesh_features = vk::PhysicalDeviceMeshShaderFeaturesEXT::default();
    let mut barycentric_features = vk::PhysicalDeviceFragmentShaderBarycentricFeaturesKHR::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut mesh_features)
        .push_next(&mut barycentric_features);
    unsafe { instance.get_physical_device_features2(device, &mut features2) };
    let core = features2.features;

    Ok(DeviceCapabilities {
        geometry_shader: core.geometry_shader == vk::TRUE,
        multi_viewport: core.multi_viewport == vk::TRUE,
        mesh_shader: has_extension(ash::ext::mesh_shader::NAME)
            && mesh_features.mesh_shader == vk::TRUE
            && mesh_features.task_shader == vk::TRUE,
        fragment_shader_barycentric: has_extension(ash::khr::fragment_shader_barycentric::NAME)
            && barycentric_features.fragment_shader_barycentric == vk::TRUE,
    })
}

fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    required: &[Capability],
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let device_name = unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_str()
            .unwrap_or("Unknown")
    };

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: missing required queue families (graphics={}, present={})",
            device_name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return None;
    }

    // Dynamic rendering is core in 1.3
    if properties.api_version < vk::API_VERSION_1_3 {
        debug!(
            "GPU '{}' skipped: Vulkan 1.3 not supported (version: {}.{})",
            device_name,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version)
        );
        return None;
    }

    let capabilities = match query_capabilities(instance, device) {
        Ok(caps) => caps,
        Err(e) => {
            debug!("GPU '{}' skipped: capability query failed: {}", device_name, e);
            return None;
        }
    };
    debug!("GPU '{}' capabilities: {:?}", device_name, capabilities);

    let missing = capabilities.missing(required);
    if !missing.is_empty() {
        debug!("GPU '{}' skipped: missing {:?}", device_name, missing);
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families,
        capabilities,
    })
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && indices.graphics_family.is_none()
        {
            indices.graphics_family = Some(i);
        }

        if indices.present_family.is_none() {
            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, i, surface)
                    .unwrap_or(false)
            };
            if present_support {
                indices.present_family = Some(i);
            }
        }

        if indices.is_complete() {
            break;
        }
    }

    indices
}

fn rate_device(info: &PhysicalDeviceInfo) -> u32 {
    let mut score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };

    let vram_mb = (info.device_local_memory() / (1024 * 1024)) as u32;
    score += vram_mb.min(16000);

    // Prefer devices that can run every technique
    score += Capability::ALL
        .iter()
        .filter(|&&c| info.capabilities.supports(c))
        .count() as u32
        * 50;

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());
        assert!(indices.unique_families().is_empty());
    }

    #[test]
    fn test_unique_families_shared_queue() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert!(indices.is_complete());
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn test_unique_families_split_queue() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(indices.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_capabilities_from_list() {
        let caps =
            DeviceCapabilities::from_list(&[Capability::GeometryShader, Capability::MultiViewport]);
        assert!(caps.supports(Capability::GeometryShader));
        assert!(caps.supports(Capability::MultiViewport));
        assert!(!caps.supports(Capability::MeshShader));
        assert_eq!(
            caps.missing(&[Capability::MultiViewport, Capability::MeshShader]),
            vec![Capability::MeshShader]
        );
    }

    #[test]
    fn test_capabilities_all() {
        let caps = DeviceCapabilities::all();
        assert!(Capability::ALL.iter().all(|&c| caps.supports(c)));
        assert!(caps.missing(&Capability::ALL).is_empty());
    }

    #[test]
    fn test_capability_extensions() {
        let caps = DeviceCapabilities::from_list(&[
            Capability::GeometryShader,
            Capability::MeshShader,
        ]);
        assert_eq!(caps.extensions(), vec![ash::ext::mesh_shader::NAME]);

        let none = DeviceCapabilities::from_list(&[Capability::MultiViewport]);
        assert!(none.extensions().is_empty());
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(Capability::MeshShader.to_string(), "mesh shader");
        assert_eq!(
            Capability::FragmentShaderBarycentric.to_string(),
            "fragment shader barycentric"
        );
    }
}
