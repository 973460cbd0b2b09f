//! Wireframe-style shading from fragment-shader barycentric coordinates.

use tracing::info;

use showcase_renderer::frame_resources::FrameResources;
use showcase_renderer::handles::{ModelHandle, PipelineHandle, PipelineLayoutHandle};
use showcase_renderer::{
    Capability, CommandRecorder, Extent, FrameInput, FrameSlot, GpuContext, PipelineDesc,
    RendererResult, SetupContext, ShaderStage, Technique, VertexInput, vk,
};

use crate::uniforms::{MatricesUbo, prepared, prepared_mut, set_full_viewport};

struct Resources {
    frames: FrameResources<MatricesUbo>,
    pipeline_layout: PipelineLayoutHandle,
    pipeline: PipelineHandle,
    model: ModelHandle,
}

#[derive(Default)]
pub struct Barycentric {
    gpu: Option<Resources>,
    extent: Extent,
}

impl Barycentric {
    pub const NAME: &'static str = "barycentric";
    pub const REQUIRED: &'static [Capability] = &[Capability::FragmentShaderBarycentric];

    pub fn new() -> Self {
        Self::default()
    }
}

impl Technique for Barycentric {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn required_capabilities(&self) -> &'static [Capability] {
        Self::REQUIRED
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> RendererResult<()> {
        let path = ctx.model_path("monkey.gltf");
        let model = ctx.gpu.load_model(&path)?;

        let frames = FrameResources::new(ctx.gpu, vk::ShaderStageFlags::VERTEX)?;
        let pipeline_layout = ctx.gpu.create_pipeline_layout(&[frames.layout()], &[])?;
        let pipeline = ctx.gpu.create_graphics_pipeline(
            &PipelineDesc::new(Self::NAME, pipeline_layout)
                .shader(ShaderStage::Vertex, "barycentric")
                .shader(ShaderStage::Fragment, "barycentric")
                .vertex_input(VertexInput::Mesh),
        )?;

        self.extent = ctx.gpu.extent();
        self.gpu = Some(Resources {
            frames,
            pipeline_layout,
            pipeline,
            model,
        });
        info!("Barycentric pipeline ready");
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
        recorder.draw_model(resources.model)
    }

    fn on_resize(&mut self, gpu: &mut dyn GpuContext, extent: Extent) -> RendererResult<()> {
        self.extent = extent;
        prepared_mut(&mut self.gpu, Self::NAME)?.frames.rebuild(gpu)
    }
}
