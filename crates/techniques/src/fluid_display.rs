//! Full-screen display pass of a fluid simulation.
//!
//! Only the presentation quad is drawn here; the fragment shader derives
//! the field procedurally from resolution, time and frame index.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use showcase_renderer::frame_resources::FrameResources;
use showcase_renderer::handles::{PipelineHandle, PipelineLayoutHandle};
use showcase_renderer::{
    ClearValues, CommandRecorder, CullMode, Extent, FrameInput, FrameSlot, GpuContext,
    PipelineDesc, RendererResult, SetupContext, ShaderStage, Technique, vk,
};

use crate::uniforms::{prepared, prepared_mut, set_full_viewport};

/// Two triangles, positions generated from `gl_VertexIndex`.
const QUAD_VERTICES: u32 = 6;
const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DisplayUbo {
    pub resolution: Vec2,
    pub time: f32,
    pub frame: u32,
}

impl DisplayUbo {
    pub fn new(input: &FrameInput) -> Self {
        Self {
            resolution: Vec2::new(input.extent.width as f32, input.extent.height as f32),
            time: input.timing.elapsed,
            // The shader only needs a wrapping counter.
            frame: input.timing.frame_number as u32,
        }
    }
}

struct Resources {
    frames: FrameResources<DisplayUbo>,
    pipeline_layout: PipelineLayoutHandle,
    pipeline: PipelineHandle,
}

#[derive(Default)]
pub struct FluidDisplay {
    gpu: Option<Resources>,
    extent: Extent,
}

impl FluidDisplay {
    pub const NAME: &'static str = "fluid-display";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Technique for FluidDisplay {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> RendererResult<()> {
        let frames = FrameResources::new(ctx.gpu, vk::ShaderStageFlags::FRAGMENT)?;
        let pipeline_layout = ctx.gpu.create_pipeline_layout(&[frames.layout()], &[])?;
        let pipeline = ctx.gpu.create_graphics_pipeline(
            &PipelineDesc::new(Self::NAME, pipeline_layout)
                .shader(ShaderStage::Vertex, "display")
                .shader(ShaderStage::Fragment, "display")
                .depth(false)
                .cull_mode(CullMode::None),
        )?;

        self.extent = ctx.gpu.extent();
        self.gpu = Some(Resources {
            frames,
            pipeline_layout,
            pipeline,
        });
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
        resources.frames.write(gpu, slot, &DisplayUbo::new(input))
    }

    fn record(&self, recorder: &mut dyn CommandRecorder, slot: FrameSlot) -> RendererResult<()> {
        let resources = prepared(&self.gpu, Self::NAME)?;

        set_full_viewport(recorder, self.extent)?;
        recorder.bind_descriptor_set(resources.pipeline_layout, resources.frames.set(slot))?;
        recorder.bind_pipeline(resources.pipeline)?;
        recorder.draw(QUAD_VERTICES, 1)
    }

    fn clear_values(&self) -> ClearValues {
        ClearValues::color_only(CLEAR_COLOR)
    }

    fn on_resize(&mut self, gpu: &mut dyn GpuContext, extent: Extent) -> RendererResult<()> {
        self.extent = extent;
        prepared_mut(&mut self.gpu, Self::NAME)?.frames.rebuild(gpu)
    }
}
