//! Frame lifecycle and drawing for meshview.
//!
//! - [`frame_manager`]: acquire → record → submit → present across frame slots
//! - [`render_target`]: swapchain, views, depth buffer and framebuffers
//! - [`draw`]: per-frame command recording
//! - [`model`] / [`texture`]: GPU copies of a loaded OBJ model
//! - [`Renderer`]: wires everything to a window

pub mod depth_buffer;
pub mod draw;
mod error;
pub mod frame;
pub mod frame_manager;
pub mod model;
pub mod render_target;
mod renderer;
pub mod texture;
pub mod ubo;

pub use error::{RendererError, RendererResult};
pub use frame_manager::{FrameBackend, FrameManager, FrameOutcome};
pub use render_target::RecreateStatus;
pub use renderer::Renderer;

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Size of the combined-image-sampler array bound at binding 1.
pub const MAX_TEXTURES: u32 = 16;
