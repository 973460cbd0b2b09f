//! Graphics technique demos.
//!
//! Each technique implements [`showcase_renderer::Technique`] and is driven
//! by a [`showcase_renderer::FrameCycle`]; [`TechniqueKind`] picks one at
//! runtime by name.

mod barycentric;
mod fluid_display;
mod mesh_shader;
mod multi_viewport;
mod push_constants;
mod registry;
mod uniforms;

pub use barycentric::Barycentric;
pub use fluid_display::{DisplayUbo, FluidDisplay};
pub use mesh_shader::MeshShader;
pub use multi_viewport::{MultiViewport, StereoUbo};
pub use push_constants::{PushConstants, SPHERE_COUNT, SpherePushConstant};
pub use registry::{TechniqueKind, UnknownTechnique};
pub use uniforms::MatricesUbo;
