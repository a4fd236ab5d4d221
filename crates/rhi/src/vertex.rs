//! Vertex data structures and input descriptions.
//!
//! This module defines the vertex format used by the mesh pipeline.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex format with position and normal.
///
/// This is the vertex format used for lit mesh rendering. Each vertex
/// contains:
/// - `position` (Vec3): 3D position in object space
/// - `normal` (Vec3): Surface normal vector (should be normalized)
///
/// # Memory Layout
///
/// The struct uses `#[repr(C)]` to ensure predictable memory layout:
/// - Offset 0: position (12 bytes)
/// - Offset 12: normal (12 bytes)
/// - Total size: 24 bytes
///
/// # Shader Locations
///
/// - location 0: position (vec3)
/// - location 1: normal (vec3)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// 3D position in object space.
    pub position: Vec3,
    /// Surface normal vector (should be normalized).
    pub normal: Vec3,
}

impl Vertex {
    /// Creates a new vertex with the specified attributes.
    ///
    /// # Arguments
    ///
    /// * `position` - 3D position in object space
    /// * `normal` - Surface normal vector
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }

    /// Returns the size of the vertex in bytes.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Get the vertex input binding description.
    ///
    /// Returns a binding description for binding 0 with per-vertex input rate.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Get the vertex attribute descriptions.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            // Position at location 0
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            // Normal at location 1
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        // Vertex: Vec3 (12) + Vec3 (12) = 24 bytes
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        assert_eq!(Vertex::size(), 24);
    }

    #[test]
    fn test_vertex_binding_description() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 24);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_vertex_attribute_descriptions() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs.len(), 2);

        // Position attribute (location 0)
        assert_eq!(attrs[0].binding, 0);
        assert_eq!(attrs[0].location, 0);
        assert_eq!(attrs[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attrs[0].offset, 0);

        // Normal attribute (location 1)
        assert_eq!(attrs[1].binding, 0);
        assert_eq!(attrs[1].location, 1);
        assert_eq!(attrs[1].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attrs[1].offset, 12);
    }

    #[test]
    fn test_vertex_new() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let normal = Vec3::new(0.0, 1.0, 0.0);
        let vertex = Vertex::new(position, normal);

        assert_eq!(vertex.position, position);
        assert_eq!(vertex.normal, normal);
    }

    #[test]
    fn test_vertex_pod_zeroable() {
        let vertex = Vertex::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 1.0, 0.0));

        // Test bytemuck cast to bytes and back
        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 24);

        let vertex_back: &Vertex = bytemuck::from_bytes(bytes);
        assert_eq!(vertex_back.position, vertex.position);
        assert_eq!(vertex_back.normal, vertex.normal);
    }

    #[test]
    fn test_vertex_offsets() {
        // Field offsets must match the attribute descriptions
        use std::mem::offset_of;

        assert_eq!(offset_of!(Vertex, position), 0);
        assert_eq!(offset_of!(Vertex, normal), 12);
    }
}
