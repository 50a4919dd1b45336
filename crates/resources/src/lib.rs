//! Asset loading for meshview.
//!
//! This crate turns files on disk into plain CPU-side data:
//! - Wavefront OBJ/MTL models ([`ObjModel`])
//! - Per-material draw ranges over the index buffer ([`DrawRanges`])
//! - RGBA8 texture pixels ([`TextureData`])
//!
//! Nothing here touches the GPU.

pub mod draw_range;
pub mod error;
pub mod material;
pub mod model;
pub mod texture;

pub use draw_range::{DrawRange, DrawRanges, DrawSpan};
pub use error::{ResourceError, ResourceResult};
pub use material::MaterialInfo;
pub use model::{MeshVertex, ObjModel};
pub use texture::TextureData;
