//! [`GpuContext`] over a live Vulkan device.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use tracing::{debug, info};

use showcase_resources::Model;
use showcase_rhi::buffer::{Buffer, BufferUsage};
use showcase_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, pool_sizes_for, uniform_buffer_binding,
    write_uniform_buffer,
};
use showcase_rhi::device::Device;
use showcase_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use showcase_rhi::shader::{Shader, ShaderStage};
use showcase_rhi::vertex::MeshVertex;
use showcase_rhi::Capability;

use super::recorder::{RenderTarget, VulkanRecorder};
use crate::context::{BindingDesc, GpuContext, PipelineDesc, PushRange, SurfaceFormats, VertexInput};
use crate::error::{RendererError, RendererResult};
use crate::handles::{
    BufferHandle, DescriptorLayoutHandle, DescriptorPoolHandle, DescriptorSetHandle, Extent,
    HandleAllocator, ModelHandle, PipelineHandle, PipelineLayoutHandle,
};

/// Index and vertex buffers of one mesh.
pub(super) struct GpuMesh {
    pub(super) vertex_buffer: Buffer,
    pub(super) index_buffer: Buffer,
    pub(super) index_count: u32,
}

/// Every object created through the context, keyed by handle.
///
/// Shared with the recorders, which resolve handles while recording.
#[derive(Default)]
pub(super) struct VulkanResources {
    ids: HandleAllocator,
    pub(super) buffers: HashMap<BufferHandle, Buffer>,
    layouts: HashMap<DescriptorLayoutHandle, DescriptorSetLayout>,
    pools: HashMap<DescriptorPoolHandle, (DescriptorPool, Vec<DescriptorSetHandle>)>,
    pub(super) sets: HashMap<DescriptorSetHandle, vk::DescriptorSet>,
    pub(super) pipeline_layouts: HashMap<PipelineLayoutHandle, PipelineLayout>,
    pub(super) pipelines: HashMap<PipelineHandle, Pipeline>,
    pub(super) models: HashMap<ModelHandle, Vec<GpuMesh>>,
}

pub(super) type SharedResources = Arc<Mutex<VulkanResources>>;

pub(super) fn lock(resources: &SharedResources) -> RendererResult<MutexGuard<'_, VulkanResources>> {
    resources
        .lock()
        .map_err(|_| RendererError::InvalidState("Vulkan resource table poisoned".to_string()))
}

fn missing(handle: impl std::fmt::Display) -> RendererError {
    RendererError::InvalidHandle(handle.to_string())
}

/// Creates and owns GPU resources on behalf of a technique.
pub struct VulkanContext {
    device: Arc<Device>,
    resources: SharedResources,
    shader_root: PathBuf,
    formats: SurfaceFormats,
    extent: Extent,
}

impl VulkanContext {
    pub fn new(
        device: Arc<Device>,
        shader_root: PathBuf,
        formats: SurfaceFormats,
        extent: Extent,
    ) -> Self {
        Self {
            device,
            resources: SharedResources::default(),
            shader_root,
            formats,
            extent,
        }
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Recorder for one frame, resolving handles against this context.
    pub(super) fn recorder(&self, cmd: vk::CommandBuffer, target: RenderTarget) -> VulkanRecorder {
        VulkanRecorder::new(self.device.clone(), cmd, self.resources.clone(), target)
    }

    pub(super) fn set_extent(&mut self, extent: Extent) {
        self.extent = extent;
    }

    fn load_shader(&self, dir: &Path, stage: ShaderStage, name: &str) -> RendererResult<Shader> {
        let path = stage.spirv_path(dir, name);
        Ok(Shader::from_spirv_file(
            self.device.clone(),
            &path,
            stage,
            "main",
        )?)
    }
}

impl GpuContext for VulkanContext {
    fn supports(&self, capability: Capability) -> bool {
        self.device.enabled_capabilities().supports(capability)
    }

    fn extent(&self) -> Extent {
        self.extent
    }

    fn surface_formats(&self) -> SurfaceFormats {
        self.formats
    }

    fn create_uniform_buffer(&mut self, size: u64) -> RendererResult<BufferHandle> {
        let buffer = Buffer::new(self.device.clone(), BufferUsage::Uniform, size)?;
        let mut resources = lock(&self.resources)?;
        let handle = BufferHandle(resources.ids.next());
        resources.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> RendererResult<()> {
        let resources = lock(&self.resources)?;
        let target = resources.buffers.get(&buffer).ok_or_else(|| missing(buffer))?;
        target.write_data(0, data)?;
        Ok(())
    }

    fn create_descriptor_layout(
        &mut self,
        bindings: &[BindingDesc],
    ) -> RendererResult<DescriptorLayoutHandle> {
        let vk_bindings: Vec<_> = bindings
            .iter()
            .map(|b| uniform_buffer_binding(b.binding, b.stages))
            .collect();
        let layout = DescriptorSetLayout::new(self.device.clone(), &vk_bindings)?;

        let mut resources = lock(&self.resources)?;
        let handle = DescriptorLayoutHandle(resources.ids.next());
        resources.layouts.insert(handle, layout);
        Ok(handle)
    }

    fn create_descriptor_pool(
        &mut self,
        max_sets: u32,
        bindings: &[BindingDesc],
    ) -> RendererResult<DescriptorPoolHandle> {
        let vk_bindings: Vec<_> = bindings
            .iter()
            .map(|b| uniform_buffer_binding(b.binding, b.stages))
            .collect();
        let pool = DescriptorPool::new(
            self.device.clone(),
            max_sets,
            &pool_sizes_for(&vk_bindings, max_sets),
        )?;

        let mut resources = lock(&self.resources)?;
        let handle = DescriptorPoolHandle(resources.ids.next());
        resources.pools.insert(handle, (pool, Vec::new()));
        Ok(handle)
    }

    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolHandle) -> RendererResult<()> {
        // The other frame in flight may still read sets from this pool.
        self.device.wait_idle()?;

        let mut resources = lock(&self.resources)?;
        let (pool_object, sets) = resources.pools.remove(&pool).ok_or_else(|| missing(pool))?;
        for set in sets {
            resources.sets.remove(&set);
        }
        drop(pool_object);
        Ok(())
    }

    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        layout: DescriptorLayoutHandle,
        buffers: &[(u32, BufferHandle)],
    ) -> RendererResult<DescriptorSetHandle> {
        let mut guard = lock(&self.resources)?;
        let resources = &mut *guard;

        let layout_handle = resources
            .layouts
            .get(&layout)
            .ok_or_else(|| missing(layout))?
            .handle();
        let (pool_object, pool_sets) = resources.pools.get_mut(&pool).ok_or_else(|| missing(pool))?;
        let set = pool_object
            .allocate(&[layout_handle])?
            .into_iter()
            .next()
            .ok_or_else(|| RendererError::InvalidState(format!("{} returned no set", pool)))?;

        for &(binding, buffer) in buffers {
            let target = resources.buffers.get(&buffer).ok_or_else(|| missing(buffer))?;
            write_uniform_buffer(&self.device, set, binding, target.handle(), target.size());
        }

        let handle = DescriptorSetHandle(resources.ids.next());
        pool_sets.push(handle);
        resources.sets.insert(handle, set);
        Ok(handle)
    }

    fn create_pipeline_layout(
        &mut self,
        set_layouts: &[DescriptorLayoutHandle],
        push_ranges: &[PushRange],
    ) -> RendererResult<PipelineLayoutHandle> {
        let mut resources = lock(&self.resources)?;
        let vk_layouts = set_layouts
            .iter()
            .map(|l| {
                resources
                    .layouts
                    .get(l)
                    .map(DescriptorSetLayout::handle)
                    .ok_or_else(|| missing(l))
            })
            .collect::<RendererResult<Vec<_>>>()?;
        let vk_ranges: Vec<vk::PushConstantRange> = push_ranges
            .iter()
            .map(|r| vk::PushConstantRange {
                stage_flags: r.stages,
                offset: r.offset,
                size: r.size,
            })
            .collect();

        let layout = PipelineLayout::new(self.device.clone(), &vk_layouts, &vk_ranges)?;
        let handle = PipelineLayoutHandle(resources.ids.next());
        resources.pipeline_layouts.insert(handle, layout);
        Ok(handle)
    }

    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> RendererResult<PipelineHandle> {
        let dir = self.shader_root.join(&desc.shader_dir);
        let shaders = desc
            .shaders
            .iter()
            .map(|s| self.load_shader(&dir, s.stage, &s.name))
            .collect::<RendererResult<Vec<_>>>()?;

        let attributes = MeshVertex::attribute_descriptions();
        let mut builder = GraphicsPipelineBuilder::new()
            .viewport_count(desc.viewport_count)
            .cull_mode(desc.cull_mode)
            .depth_test_enable(desc.depth)
            .depth_write_enable(desc.depth)
            .color_attachment_format(self.formats.color)
            .depth_attachment_format_opt(if desc.depth { self.formats.depth } else { None });

        for shader in &shaders {
            builder = match shader.stage() {
                ShaderStage::Vertex => builder.vertex_shader(shader),
                ShaderStage::Geometry => builder.geometry_shader(shader),
                ShaderStage::Task => builder.task_shader(shader),
                ShaderStage::Mesh => builder.mesh_shader(shader),
                ShaderStage::Fragment => builder.fragment_shader(shader),
            };
        }
        if desc.vertex_input == VertexInput::Mesh {
            builder = builder
                .vertex_binding(MeshVertex::binding_description())
                .vertex_attributes(&attributes);
        }

        let mut resources = lock(&self.resources)?;
        let layout = resources
            .pipeline_layouts
            .get(&desc.layout)
            .ok_or_else(|| missing(desc.layout))?;
        let pipeline = builder.build(self.device.clone(), layout)?;

        let handle = PipelineHandle(resources.ids.next());
        resources.pipelines.insert(handle, pipeline);
        info!(
            "Pipeline {} built from {:?} ({} stage(s))",
            handle,
            dir,
            shaders.len()
        );
        Ok(handle)
    }

    fn load_model(&mut self, path: &Path) -> RendererResult<ModelHandle> {
        let model = Model::load(path)?;

        let mut meshes = Vec::with_capacity(model.meshes.len());
        for mesh in &model.meshes {
            let vertices: Vec<MeshVertex> = mesh
                .vertices()
                .map(|(p, n, c)| MeshVertex::new(p, n, c))
                .collect();
            let vertex_buffer = Buffer::new_with_data(
                self.device.clone(),
                BufferUsage::Vertex,
                bytemuck::cast_slice(&vertices),
            )?;
            let index_buffer = Buffer::new_with_data(
                self.device.clone(),
                BufferUsage::Index,
                bytemuck::cast_slice(&mesh.indices),
            )?;
            meshes.push(GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
            });
        }
        debug!("Uploaded {} mesh(es) from {:?}", meshes.len(), path);

        let mut resources = lock(&self.resources)?;
        let handle = ModelHandle(resources.ids.next());
        resources.models.insert(handle, meshes);
        Ok(handle)
    }
}
