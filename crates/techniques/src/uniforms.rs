//! Uniform blocks and recording helpers shared by several techniques.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use showcase_renderer::technique::FrameInput;
use showcase_renderer::{CommandRecorder, Extent, Rect2D, RendererError, RendererResult, Viewport};

/// `{ projection, model, view }`, matching the `UBO` block of the model
/// shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MatricesUbo {
    pub projection: Mat4,
    pub model: Mat4,
    pub view: Mat4,
}

impl MatricesUbo {
    /// Camera matrices with an identity model transform.
    pub fn from_input(input: &FrameInput) -> Self {
        Self {
            projection: input.projection(),
            model: Mat4::IDENTITY,
            view: input.camera.view_matrix(),
        }
    }
}

/// Sets one viewport and one scissor covering `extent`.
pub(crate) fn set_full_viewport(
    recorder: &mut dyn CommandRecorder,
    extent: Extent,
) -> RendererResult<()> {
    recorder.set_viewports(&[Viewport::full(extent)])?;
    recorder.set_scissors(&[Rect2D::full(extent)])
}

/// Resources of a technique exist only after `setup`.
pub(crate) fn prepared<'a, T>(gpu: &'a Option<T>, technique: &str) -> RendererResult<&'a T> {
    gpu.as_ref().ok_or_else(|| {
        RendererError::InvalidState(format!("'{}' used before setup", technique))
    })
}

pub(crate) fn prepared_mut<'a, T>(
    gpu: &'a mut Option<T>,
    technique: &str,
) -> RendererResult<&'a mut T> {
    gpu.as_mut().ok_or_else(|| {
        RendererError::InvalidState(format!("'{}' used before setup", technique))
    })
}
