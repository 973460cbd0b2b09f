//! Scene state shared by the techniques.
//!
//! - [`Camera`]: Euler-angle look-at camera with a Vulkan perspective
//! - [`stereo`]: asymmetric per-eye frusta for side-by-side stereo

pub mod camera;
pub mod stereo;

pub use camera::{Camera, Perspective};
pub use stereo::{Eye, EyeMatrices, StereoParams, frustum_rh_zo};
