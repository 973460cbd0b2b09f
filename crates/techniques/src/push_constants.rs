//! A ring of spheres, each drawn with its own push-constant block.
//!
//! The uniform buffer only carries the camera. Per-object color and
//! position reach the vertex shader through a 32-byte push range, updated
//! right before each draw.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use rand::Rng;
use tracing::info;

use showcase_renderer::frame_resources::FrameResources;
use showcase_renderer::handles::{ModelHandle, PipelineHandle, PipelineLayoutHandle};
use showcase_renderer::{
    CommandRecorder, Extent, FrameInput, FrameSlot, GpuContext, PipelineDesc, PushRange,
    RendererResult, SetupContext, ShaderStage, Technique, VertexInput, vk,
};

use crate::uniforms::{MatricesUbo, prepared, prepared_mut, set_full_viewport};

pub const SPHERE_COUNT: usize = 16;
const RING_RADIUS: f32 = 3.5;
const PUSH_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::VERTEX;

/// Per-sphere push-constant block.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SpherePushConstant {
    pub color: Vec4,
    pub position: Vec4,
}

impl SpherePushConstant {
    /// Evenly spaced on a circle in the XY plane, random opaque colors.
    pub fn ring(rng: &mut impl Rng) -> Vec<Self> {
        (0..SPHERE_COUNT)
            .map(|i| {
                let theta = (i as f32 * 360.0 / SPHERE_COUNT as f32).to_radians();
                Self {
                    color: Vec4::new(rng.random(), rng.random(), rng.random(), 1.0),
                    position: (Vec3::new(theta.sin(), theta.cos(), 0.0) * RING_RADIUS).extend(1.0),
                }
            })
            .collect()
    }
}

struct Resources {
    frames: FrameResources<MatricesUbo>,
    pipeline_layout: PipelineLayoutHandle,
    pipeline: PipelineHandle,
    model: ModelHandle,
}

#[derive(Default)]
pub struct PushConstants {
    spheres: Vec<SpherePushConstant>,
    gpu: Option<Resources>,
    extent: Extent,
}

impl PushConstants {
    pub const NAME: &'static str = "push-constants";

    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks pushed before each draw, in draw order. Empty before setup.
    pub fn spheres(&self) -> &[SpherePushConstant] {
        &self.spheres
    }
}

impl Technique for PushConstants {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> RendererResult<()> {
        let path = ctx.model_path("sphere.gltf");
        let model = ctx.gpu.load_model(&path)?;
        self.spheres = SpherePushConstant::ring(&mut ctx.rng);

        let frames = FrameResources::new(ctx.gpu, vk::ShaderStageFlags::VERTEX)?;
        let push_range = PushRange {
            stages: PUSH_STAGES,
            offset: 0,
            size: std::mem::size_of::<SpherePushConstant>() as u32,
        };
        let pipeline_layout = ctx
            .gpu
            .create_pipeline_layout(&[frames.layout()], &[push_range])?;
        let pipeline = ctx.gpu.create_graphics_pipeline(
            &PipelineDesc::new(Self::NAME, pipeline_layout)
                .shader(ShaderStage::Vertex, "pushconstants")
                .shader(ShaderStage::Fragment, "pushconstants")
                .vertex_input(VertexInput::Mesh),
        )?;

        self.extent = ctx.gpu.extent();
        self.gpu = Some(Resources {
            frames,
            pipeline_layout,
            pipeline,
            model,
        });
        info!("{} spheres ready", self.spheres.len());
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

        for sphere in &self.spheres {
            recorder.push_constants(
                resources.pipeline_layout,
                PUSH_STAGES,
                0,
                bytemuck::bytes_of(sphere),
            )?;
            recorder.draw_model(resources.model)?;
        }
        Ok(())
    }

    fn on_resize(&mut self, gpu: &mut dyn GpuContext, extent: Extent) -> RendererResult<()> {
        self.extent = extent;
        prepared_mut(&mut self.gpu, Self::NAME)?.frames.rebuild(gpu)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_ring_positions() {
        let spheres = SpherePushConstant::ring(&mut Pcg32::seed_from_u64(1));
        assert_eq!(spheres.len(), SPHERE_COUNT);

        let first = spheres[0].position;
        assert!((first - Vec4::new(0.0, RING_RADIUS, 0.0, 1.0)).length() < 1e-5);
        // A quarter of the way round sits on +X.
        let quarter = spheres[SPHERE_COUNT / 4].position;
        assert!((quarter - Vec4::new(RING_RADIUS, 0.0, 0.0, 1.0)).length() < 1e-5);

        for sphere in &spheres {
            assert!((sphere.position.truncate().length() - RING_RADIUS).abs() < 1e-4);
            assert_eq!(sphere.color.w, 1.0);
        }
    }

    #[test]
    fn test_colors_depend_only_on_seed() {
        let a = SpherePushConstant::ring(&mut Pcg32::seed_from_u64(7));
        let b = SpherePushConstant::ring(&mut Pcg32::seed_from_u64(7));
        let c = SpherePushConstant::ring(&mut Pcg32::seed_from_u64(8));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_push_block_fits_range() {
        assert_eq!(std::mem::size_of::<SpherePushConstant>(), 32);
    }
}
