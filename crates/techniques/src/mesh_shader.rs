//! Geometry generated entirely in a task + mesh shader pair.

use tracing::info;

use showcase_renderer::frame_resources::FrameResources;
use showcase_renderer::handles::{PipelineHandle, PipelineLayoutHandle};
use showcase_renderer::{
    Capability, CommandRecorder, CullMode, Extent, FrameInput, FrameSlot, GpuContext,
    PipelineDesc, RendererResult, SetupContext, ShaderStage, Technique, vk,
};

use crate::uniforms::{MatricesUbo, prepared, prepared_mut, set_full_viewport};

struct Resources {
    frames: FrameResources<MatricesUbo>,
    pipeline_layout: PipelineLayoutHandle,
    pipeline: PipelineHandle,
}

#[derive(Default)]
pub struct MeshShader {
    gpu: Option<Resources>,
    extent: Extent,
}

impl MeshShader {
    pub const NAME: &'static str = "mesh-shader";
    pub const REQUIRED: &'static [Capability] = &[Capability::MeshShader];

    pub fn new() -> Self {
        Self::default()
    }
}

impl Technique for MeshShader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn required_capabilities(&self) -> &'static [Capability] {
        Self::REQUIRED
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> RendererResult<()> {
        let frames = FrameResources::new(ctx.gpu, vk::ShaderStageFlags::MESH_EXT)?;
        let pipeline_layout = ctx.gpu.create_pipeline_layout(&[frames.layout()], &[])?;
        let pipeline = ctx.gpu.create_graphics_pipeline(
            &PipelineDesc::new(Self::NAME, pipeline_layout)
                .shader(ShaderStage::Task, "meshshader")
                .shader(ShaderStage::Mesh, "meshshader")
                .shader(ShaderStage::Fragment, "meshshader")
                .cull_mode(CullMode::None),
        )?;

        self.extent = ctx.gpu.extent();
        self.gpu = Some(Resources {
            frames,
            pipeline_layout,
            pipeline,
        });
        info!("Mesh shader pipeline ready");
        Ok(())
    }

    fn update(
        &mut self,
        input: &FrameInput,
        slot: FrameSlot,
        gpu: &mut dyn GpuContext,
    ) -> RendererResult<()> {
        self.extent = input.extent;
        let resources = prepared(&self.gpu, Self::NAME)?;
        resources.frames.write(gpu, slot, &MatricesUbo::from_input(input))
    }

    fn record(&self, recorder: &mut dyn CommandRecorder, slot: FrameSlot) -> RendererResult<()> {
        let resources = prepared(&self.gpu, Self::NAME)?;

        set_full_viewport(recorder, self.extent)?;
        recorder.bind_descriptor_set(resources.pipeline_layout, resources.frames.set(slot))?;
        recorder.bind_pipeline(resources.pipeline)?;
        // One task workgroup emits the whole mesh.
        recorder.draw_mesh_tasks(1, 1, 1)
    }

    fn on_resize(&mut self, gpu: &mut dyn GpuContext, extent: Extent) -> RendererResult<()> {
        self.extent = extent;
        prepared_mut(&mut self.gpu, Self::NAME)?.frames.rebuild(gpu)
    }
}
