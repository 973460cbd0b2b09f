//! The technique strategy and the inputs handed to it.

use std::path::{Path, PathBuf};

use glam::Mat4;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use showcase_core::FrameTiming;
use showcase_rhi::Capability;
use showcase_scene::{Camera, Perspective};

use crate::FrameSlot;
use crate::context::{GpuContext, SurfaceFormats};
use crate::error::RendererResult;
use crate::handles::Extent;
use crate::recorder::{ClearValues, CommandRecorder};

/// Static configuration for [`Technique::setup`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetupOptions {
    /// Seed of the generator handed to setup.
    pub seed: u64,
    /// Root directory of model files.
    pub assets: PathBuf,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            assets: PathBuf::from("assets"),
        }
    }
}

/// Everything a technique may use while setting up.
pub struct SetupContext<'a> {
    pub gpu: &'a mut dyn GpuContext,
    /// Explicitly seeded so procedural content replays identically.
    pub rng: Pcg32,
    pub assets: &'a Path,
    pub formats: SurfaceFormats,
}

impl<'a> SetupContext<'a> {
    pub fn new(gpu: &'a mut dyn GpuContext, options: &'a SetupOptions) -> Self {
        let formats = gpu.surface_formats();
        Self {
            gpu,
            rng: Pcg32::seed_from_u64(options.seed),
            assets: &options.assets,
            formats,
        }
    }

    /// Path of a model file under `<assets>/models`.
    pub fn model_path(&self, file: &str) -> PathBuf {
        self.assets.join("models").join(file)
    }
}

/// Per-frame input to [`Technique::update`].
#[derive(Clone, Debug)]
pub struct FrameInput {
    pub camera: Camera,
    pub extent: Extent,
    pub timing: FrameTiming,
}

impl FrameInput {
    /// Camera projection with the aspect ratio of the current framebuffer.
    pub fn projection(&self) -> Mat4 {
        Perspective {
            aspect: self.extent.aspect_ratio(),
            ..self.camera.perspective()
        }
        .matrix()
    }
}

/// One graphics-technique demo.
///
/// Driven by [`FrameCycle`](crate::FrameCycle): `setup` once, then
/// `update` + `record` per frame, and `on_resize` when the surface changes.
/// The trait is object safe; `Box<dyn Technique>` is itself a technique.
pub trait Technique {
    fn name(&self) -> &'static str;

    /// Optional device capabilities checked before `setup`.
    fn required_capabilities(&self) -> &'static [Capability] {
        &[]
    }

    /// Loads assets and creates buffers, descriptor sets and pipelines.
    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> RendererResult<()>;

    /// Writes this frame's uniform data into the buffer for `slot`, and
    /// nothing else.
    fn update(
        &mut self,
        input: &FrameInput,
        slot: FrameSlot,
        gpu: &mut dyn GpuContext,
    ) -> RendererResult<()>;

    /// Records state and draw commands inside an open render pass.
    fn record(&self, recorder: &mut dyn CommandRecorder, slot: FrameSlot) -> RendererResult<()>;

    fn clear_values(&self) -> ClearValues {
        ClearValues::default()
    }

    /// Rebuilds descriptor state after a surface size change.
    fn on_resize(&mut self, gpu: &mut dyn GpuContext, extent: Extent) -> RendererResult<()>;
}

impl<T: Technique + ?Sized> Technique for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn required_capabilities(&self) -> &'static [Capability] {
        (**self).required_capabilities()
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> RendererResult<()> {
        (**self).setup(ctx)
    }

    fn update(
        &mut self,
        input: &FrameInput,
        slot: FrameSlot,
        gpu: &mut dyn GpuContext,
    ) -> RendererResult<()> {
        (**self).update(input, slot, gpu)
    }

    fn record(&self, recorder: &mut dyn CommandRecorder, slot: FrameSlot) -> RendererResult<()> {
        (**self).record(recorder, slot)
    }

    fn clear_values(&self) -> ClearValues {
        (**self).clear_values()
    }

    fn on_resize(&mut self, gpu: &mut dyn GpuContext, extent: Extent) -> RendererResult<()> {
        (**self).on_resize(gpu, extent)
    }
}
