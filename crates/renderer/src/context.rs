//! Device-side seam used by techniques during setup and update.
//!
//! [`GpuContext`] stands in for the device provider, the model loader and the
//! shader loader. Everything it creates is referred to by an opaque handle
//! from [`crate::handles`] and lives until the context is dropped, except
//! descriptor pools which can be destroyed and rebuilt on resize.

use std::path::Path;

use showcase_rhi::pipeline::CullMode;
use showcase_rhi::shader::ShaderStage;
use showcase_rhi::{Capability, vk};

use crate::error::{RendererError, RendererResult};
use crate::handles::{
    BufferHandle, DescriptorLayoutHandle, DescriptorPoolHandle, DescriptorSetHandle, Extent,
    ModelHandle, PipelineHandle, PipelineLayoutHandle,
};

/// One uniform-buffer binding of a descriptor set layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindingDesc {
    pub binding: u32,
    pub stages: vk::ShaderStageFlags,
}

impl BindingDesc {
    pub const fn uniform(binding: u32, stages: vk::ShaderStageFlags) -> Self {
        Self { binding, stages }
    }
}

/// Push constant range of a pipeline layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PushRange {
    pub stages: vk::ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

impl PushRange {
    /// Whether a push of `len` bytes at `offset` for `stages` fits this range.
    pub fn covers(&self, stages: vk::ShaderStageFlags, offset: u32, len: usize) -> bool {
        self.stages.contains(stages)
            && offset >= self.offset
            && offset as usize + len <= (self.offset + self.size) as usize
    }
}

/// A precompiled shader, looked up as `<shader root>/<dir>/<name>.<stage>.spv`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderRef {
    pub stage: ShaderStage,
    pub name: String,
}

impl ShaderRef {
    pub fn new(stage: ShaderStage, name: impl Into<String>) -> Self {
        Self {
            stage,
            name: name.into(),
        }
    }
}

/// Vertex data the pipeline consumes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VertexInput {
    /// Vertices are generated in the shader (screen quads, mesh shading).
    #[default]
    None,
    /// Interleaved position, normal and color, as uploaded by `load_model`.
    Mesh,
}

/// Everything needed to build one graphics pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineDesc {
    /// Shader directory under the shader root, normally the technique name.
    pub shader_dir: String,
    pub shaders: Vec<ShaderRef>,
    pub layout: PipelineLayoutHandle,
    pub vertex_input: VertexInput,
    pub viewport_count: u32,
    pub depth: bool,
    pub cull_mode: CullMode,
}

impl PipelineDesc {
    /// Single-viewport, depth-tested, back-face-culled pipeline without shaders.
    pub fn new(shader_dir: impl Into<String>, layout: PipelineLayoutHandle) -> Self {
        Self {
            shader_dir: shader_dir.into(),
            shaders: Vec::new(),
            layout,
            vertex_input: VertexInput::None,
            viewport_count: 1,
            depth: true,
            cull_mode: CullMode::Back,
        }
    }

    pub fn shader(mut self, stage: ShaderStage, name: impl Into<String>) -> Self {
        self.shaders.push(ShaderRef::new(stage, name));
        self
    }

    pub fn vertex_input(mut self, input: VertexInput) -> Self {
        self.vertex_input = input;
        self
    }

    pub fn viewport_count(mut self, count: u32) -> Self {
        self.viewport_count = count;
        self
    }

    pub fn depth(mut self, enabled: bool) -> Self {
        self.depth = enabled;
        self
    }

    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    pub fn has_stage(&self, stage: ShaderStage) -> bool {
        self.shaders.iter().any(|s| s.stage == stage)
    }

    /// Union of the stages this pipeline runs.
    pub fn stage_flags(&self) -> vk::ShaderStageFlags {
        self.shaders
            .iter()
            .fold(vk::ShaderStageFlags::empty(), |acc, s| {
                acc | s.stage.to_vk_stage()
            })
    }
}

/// Attachment formats of the render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceFormats {
    pub color: vk::Format,
    pub depth: Option<vk::Format>,
}

impl Default for SurfaceFormats {
    fn default() -> Self {
        Self {
            color: vk::Format::B8G8R8A8_SRGB,
            depth: Some(vk::Format::D32_SFLOAT),
        }
    }
}

/// Resource provider a technique builds its state through.
///
/// Object safe, so techniques only ever see `&mut dyn GpuContext`.
pub trait GpuContext {
    fn supports(&self, capability: Capability) -> bool;

    /// Fails with [`RendererError::Unsupported`] on the first missing capability.
    fn require(&self, technique: &str, required: &[Capability]) -> RendererResult<()> {
        match required.iter().find(|&&c| !self.supports(c)) {
            Some(&capability) => Err(RendererError::Unsupported {
                technique: technique.to_string(),
                capability,
            }),
            None => Ok(()),
        }
    }

    /// Current framebuffer size.
    fn extent(&self) -> Extent;

    fn surface_formats(&self) -> SurfaceFormats;

    /// Creates a host-visible uniform buffer that stays mapped until the
    /// context is dropped.
    fn create_uniform_buffer(&mut self, size: u64) -> RendererResult<BufferHandle>;

    /// Overwrites the start of `buffer` with `data`.
    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> RendererResult<()>;

    fn create_descriptor_layout(
        &mut self,
        bindings: &[BindingDesc],
    ) -> RendererResult<DescriptorLayoutHandle>;

    /// Creates a pool able to hold `max_sets` sets of a layout made of `bindings`.
    fn create_descriptor_pool(
        &mut self,
        max_sets: u32,
        bindings: &[BindingDesc],
    ) -> RendererResult<DescriptorPoolHandle>;

    /// Destroys `pool` and invalidates every set allocated from it.
    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolHandle) -> RendererResult<()>;

    /// Allocates a set and points each `(binding, buffer)` pair at its buffer.
    fn allocate_descriptor_set(
        &mut self,
        pool: DescriptorPoolHandle,
        layout: DescriptorLayoutHandle,
        buffers: &[(u32, BufferHandle)],
    ) -> RendererResult<DescriptorSetHandle>;

    fn create_pipeline_layout(
        &mut self,
        set_layouts: &[DescriptorLayoutHandle],
        push_ranges: &[PushRange],
    ) -> RendererResult<PipelineLayoutHandle>;

    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> RendererResult<PipelineHandle>;

    /// Loads a glTF model and makes it drawable with
    /// [`CommandRecorder::draw_model`](crate::CommandRecorder::draw_model).
    fn load_model(&mut self, path: &Path) -> RendererResult<ModelHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_range_covers() {
        let range = PushRange {
            stages: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: 32,
        };
        assert!(range.covers(vk::ShaderStageFlags::VERTEX, 0, 32));
        assert!(range.covers(vk::ShaderStageFlags::VERTEX, 16, 16));
        assert!(!range.covers(vk::ShaderStageFlags::VERTEX, 16, 17));
        assert!(!range.covers(vk::ShaderStageFlags::FRAGMENT, 0, 4));
    }

    #[test]
    fn test_pipeline_desc_stage_flags() {
        let desc = PipelineDesc::new("mesh-shader", PipelineLayoutHandle(1))
            .shader(ShaderStage::Task, "mesh")
            .shader(ShaderStage::Mesh, "mesh")
            .shader(ShaderStage::Fragment, "mesh");

        assert!(desc.has_stage(ShaderStage::Mesh));
        assert!(!desc.has_stage(ShaderStage::Vertex));
        assert_eq!(
            desc.stage_flags(),
            vk::ShaderStageFlags::TASK_EXT
                | vk::ShaderStageFlags::MESH_EXT
                | vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(desc.viewport_count, 1);
        assert!(desc.depth);
    }
}
