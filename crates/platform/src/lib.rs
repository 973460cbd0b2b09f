//! Platform layer: the winit window and its Vulkan surface.

mod window;

pub use window::{Surface, Window, framebuffer_extent};

pub use winit::dpi::PhysicalSize;
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
