//! Side-by-side stereo in a single pass.
//!
//! A geometry shader instances every triangle into both viewports; the
//! uniform block carries one projection and one view per eye, built from
//! off-axis frusta.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use tracing::info;

use showcase_renderer::frame_resources::FrameResources;
use showcase_renderer::handles::{ModelHandle, PipelineHandle, PipelineLayoutHandle};
use showcase_renderer::{
    Capability, CommandRecorder, Extent, FrameInput, FrameSlot, GpuContext, PipelineDesc, Rect2D,
    RendererResult, SetupContext, ShaderStage, Technique, VertexInput, Viewport, vk,
};
use showcase_scene::{Eye, StereoParams};

use crate::uniforms::{prepared, prepared_mut};

const LIGHT_POSITION: Vec4 = Vec4::new(-2.5, -3.5, 0.0, 1.0);

/// Per-eye matrices, index 0 = left.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct StereoUbo {
    pub projection: [Mat4; 2],
    pub modelview: [Mat4; 2],
    pub light_pos: Vec4,
}

impl StereoUbo {
    pub fn new(params: &StereoParams, input: &FrameInput) -> Self {
        let Extent { width, height } = input.extent;
        let [left, right] = Eye::BOTH.map(|eye| params.eye(eye, &input.camera, width, height));
        Self {
            projection: [left.projection, right.projection],
            modelview: [left.view, right.view],
            light_pos: LIGHT_POSITION,
        }
    }
}

struct Resources {
    frames: FrameResources<StereoUbo>,
    pipeline_layout: PipelineLayoutHandle,
    pipeline: PipelineHandle,
    model: ModelHandle,
}

#[derive(Default)]
pub struct MultiViewport {
    params: StereoParams,
    gpu: Option<Resources>,
    extent: Extent,
}

impl MultiViewport {
    pub const NAME: &'static str = "multi-viewport";
    pub const REQUIRED: &'static [Capability] =
        &[Capability::GeometryShader, Capability::MultiViewport];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: StereoParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    #[inline]
    pub fn params(&self) -> &StereoParams {
        &self.params
    }
}

impl Technique for MultiViewport {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn required_capabilities(&self) -> &'static [Capability] {
        Self::REQUIRED
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> RendererResult<()> {
        let path = ctx.model_path("scene.gltf");
        let model = ctx.gpu.load_model(&path)?;

        let frames = FrameResources::new(ctx.gpu, vk::ShaderStageFlags::GEOMETRY)?;
        let pipeline_layout = ctx.gpu.create_pipeline_layout(&[frames.layout()], &[])?;
        let pipeline = ctx.gpu.create_graphics_pipeline(
            &PipelineDesc::new(Self::NAME, pipeline_layout)
                .shader(ShaderStage::Vertex, "scene")
                .shader(ShaderStage::Geometry, "multiview")
                .shader(ShaderStage::Fragment, "scene")
                .vertex_input(VertexInput::Mesh)
                .viewport_count(2),
        )?;

        self.extent = ctx.gpu.extent();
        self.gpu = Some(Resources {
            frames,
            pipeline_layout,
            pipeline,
            model,
        });
        info!(
            "Stereo pipeline ready (eye separation {}, focal length {})",
            self.params.eye_separation, self.params.focal_length
        );
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
        resources
            .frames
            .write(gpu, slot, &StereoUbo::new(&self.params, input))
    }

    fn record(&self, recorder: &mut dyn CommandRecorder, slot: FrameSlot) -> RendererResult<()> {
        let resources = prepared(&self.gpu, Self::NAME)?;

        recorder.set_viewports(&Viewport::split_horizontal(self.extent))?;
        recorder.set_scissors(&Rect2D::split_horizontal(self.extent))?;
        recorder.bind_descriptor_set(resources.pipeline_layout, resources.frames.set(slot))?;
        recorder.bind_pipeline(resources.pipeline)?;
        recorder.draw_model(resources.model)
    }

    fn on_resize(&mut self, gpu: &mut dyn GpuContext, extent: Extent) -> RendererResult<()> {
        self.extent = extent;
        prepared_mut(&mut self.gpu, Self::NAME)?.frames.rebuild(gpu)
    }
}
