//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin ownership wrappers over `ash`:
//! - instance, physical device selection and logical device
//! - buffers and images with explicit create, allocate and bind steps
//! - render pass, framebuffers, pipelines, descriptors and shaders
//! - swapchain acquisition and presentation
//! - command recording and synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod handle;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult, VkResultExt};

pub use ash::vk;
