//! Vertex layout shared by every model-drawing technique.
//!
//! [`MeshVertex`] is what the model loader produces and what the vertex
//! pipelines consume:
//!
//! | location | field      | format  | offset |
//! |----------|------------|---------|--------|
//! | 0        | `position` | vec3    | 0      |
//! | 1        | `normal`   | vec3    | 12     |
//! | 2        | `color`    | vec3    | 24     |

use std::mem::offset_of;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
}

impl MeshVertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, color: Vec3) -> Self {
        Self {
            position,
            normal,
            color,
        }
    }

    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Binding 0, advanced per vertex.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: Self::size() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            Self::vec3_attribute(0, offset_of!(MeshVertex, position)),
            Self::vec3_attribute(1, offset_of!(MeshVertex, normal)),
            Self::vec3_attribute(2, offset_of!(MeshVertex, color)),
        ]
    }

    fn vec3_attribute(location: u32, offset: usize) -> vk::VertexInputAttributeDescription {
        vk::VertexInputAttributeDescription {
            binding: 0,
            location,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_vertex_size() {
        assert_eq!(MeshVertex::size(), 36);
    }

    #[test]
    fn test_binding_description() {
        let binding = MeshVertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 36);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_attribute_layout() {
        let attrs = MeshVertex::attribute_descriptions();
        let offsets: Vec<u32> = attrs.iter().map(|a| a.offset).collect();
        let locations: Vec<u32> = attrs.iter().map(|a| a.location).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        assert_eq!(locations, vec![0, 1, 2]);
        assert!(
            attrs
                .iter()
                .all(|a| a.format == vk::Format::R32G32B32_SFLOAT)
        );
    }

    #[test]
    fn test_pod_cast() {
        let vertices = [MeshVertex::new(Vec3::X, Vec3::Y, Vec3::ONE); 2];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 72);
    }
}
