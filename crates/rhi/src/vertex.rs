//! Vertex layout of the mesh pipeline.
//!
//! | location | field       | format              | offset |
//! |----------|-------------|---------------------|--------|
//! | 0        | `position`  | `R32G32B32_SFLOAT`  | 0      |
//! | 1        | `normal`    | `R32G32B32_SFLOAT`  | 12     |
//! | 2        | `tex_coord` | `R32G32_SFLOAT`     | 24     |

use std::mem::offset_of;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Interleaved mesh vertex, 32 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl Vertex {
    /// Vertex from its three attributes.
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    /// Per-vertex binding 0.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position, normal and texture coordinate at locations 0, 1 and 2.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, normal) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Vertex, tex_coord) as u32,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn test_binding_description() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 32);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_attribute_offsets_match_layout() {
        let attrs = Vertex::attribute_descriptions();
        let offsets: Vec<u32> = attrs.iter().map(|a| a.offset).collect();
        let locations: Vec<u32> = attrs.iter().map(|a| a.location).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        assert_eq!(locations, vec![0, 1, 2]);
        assert_eq!(attrs[2].format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn test_vertex_is_pod() {
        let vertex = Vertex::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::Z,
            Vec2::new(0.25, 0.75),
        );
        let bytes = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 32);
        let back: &Vertex = bytemuck::from_bytes(bytes);
        assert_eq!(*back, vertex);
    }
}
