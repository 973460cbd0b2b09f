//! Command-side seam: one command buffer being recorded.

use showcase_rhi::vk;

use crate::error::RendererResult;
use crate::handles::{
    DescriptorSetHandle, Extent, ModelHandle, PipelineHandle, PipelineLayoutHandle,
};

/// Viewport rectangle with depth range, in framebuffer pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Covers the whole framebuffer.
    pub fn full(extent: Extent) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Left and right halves of the framebuffer.
    pub fn split_horizontal(extent: Extent) -> [Self; 2] {
        let half = extent.width as f32 / 2.0;
        let left = Self {
            width: half,
            ..Self::full(extent)
        };
        let right = Self { x: half, ..left };
        [left, right]
    }

    pub fn to_vk(self) -> vk::Viewport {
        vk::Viewport {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            min_depth: self.min_depth,
            max_depth: self.max_depth,
        }
    }
}

/// Scissor rectangle in framebuffer pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn full(extent: Extent) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }

    pub fn split_horizontal(extent: Extent) -> [Self; 2] {
        let half = extent.width / 2;
        let left = Self {
            width: half,
            ..Self::full(extent)
        };
        let right = Self {
            x: half as i32,
            ..left
        };
        [left, right]
    }

    pub fn to_vk(self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D {
                x: self.x,
                y: self.y,
            },
            extent: vk::Extent2D {
                width: self.width,
                height: self.height,
            },
        }
    }
}

/// Clear values applied when a render pass begins.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    /// Depth and stencil clear; `None` for passes without a depth attachment.
    pub depth_stencil: Option<(f32, u32)>,
}

impl ClearValues {
    pub const fn color_only(color: [f32; 4]) -> Self {
        Self {
            color,
            depth_stencil: None,
        }
    }
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.025, 0.025, 0.025, 1.0],
            depth_stencil: Some((1.0, 0)),
        }
    }
}

/// Arguments of `begin_render_pass`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPassBegin {
    pub extent: Extent,
    pub clear: ClearValues,
}

/// Records commands into one command buffer.
///
/// Calls must follow `begin`, `begin_render_pass`, state and draw commands,
/// `end_render_pass`, `end`. Implementations report protocol violations as
/// [`RendererError::Recording`](crate::RendererError::Recording).
pub trait CommandRecorder {
    fn begin(&mut self) -> RendererResult<()>;

    fn begin_render_pass(&mut self, info: &RenderPassBegin) -> RendererResult<()>;

    fn set_viewports(&mut self, viewports: &[Viewport]) -> RendererResult<()>;

    fn set_scissors(&mut self, scissors: &[Rect2D]) -> RendererResult<()>;

    fn bind_descriptor_set(
        &mut self,
        layout: PipelineLayoutHandle,
        set: DescriptorSetHandle,
    ) -> RendererResult<()>;

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> RendererResult<()>;

    fn push_constants(
        &mut self,
        layout: PipelineLayoutHandle,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> RendererResult<()>;

    fn draw(&mut self, vertex_count: u32, instance_count: u32) -> RendererResult<()>;

    /// Indexed draw of every mesh of a loaded model.
    fn draw_model(&mut self, model: ModelHandle) -> RendererResult<()>;

    fn draw_mesh_tasks(&mut self, x: u32, y: u32, z: u32) -> RendererResult<()>;

    fn end_render_pass(&mut self) -> RendererResult<()>;

    fn end(&mut self) -> RendererResult<()>;
}
