//! Platform layer for meshview.
//!
//! - Window creation via winit
//! - Vulkan surface creation from raw window handles
//! - Drawable-extent queries used while recreating the swapchain

mod window;

pub use window::{Surface, Window, drawable_extent};

pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
