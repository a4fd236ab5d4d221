//! Per-frame shader constants pushed inline into the command buffer.
//!
//! Each frame writes two small blocks straight into the command stream
//! instead of allocating constant buffers: a vertex-stage matrix block and
//! a fragment-stage lighting block, laid out back to back so together they
//! fit the guaranteed push constant budget.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Byte offset of [`PassConstants`] within the push constant space.
pub const PASS_CONSTANTS_OFFSET: u32 = MvpConstants::SIZE as u32;

/// Vertex-stage matrix block.
///
/// Carries the combined clip-space transform plus the matrices the vertex
/// shader needs to move positions and normals into world space.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MvpConstants {
    /// Combined `projection * view * model` transform.
    pub mvp: Mat4,
    /// Inverse-transpose of the model matrix, applied to normals.
    pub normal_matrix: Mat4,
    /// Model (world) transform.
    pub model: Mat4,
}

impl MvpConstants {
    /// Size of the block in bytes.
    pub const SIZE: usize = size_of::<Self>();

    /// Builds the block from the three stage transforms.
    pub fn new(model: Mat4, view: Mat4, projection: Mat4) -> Self {
        Self {
            mvp: projection * view * model,
            normal_matrix: model.inverse().transpose(),
            model,
        }
    }
}

/// Fragment-stage lighting block.
///
/// Scalar parameters ride in the `w` components so the block stays four
/// tightly packed vectors.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    /// World-space light position, `w` fixed at 1.
    pub light_position: Vec4,
    /// World-space eye position, `w` fixed at 1.
    pub eye_position: Vec4,
    /// Ambient color in `xyz`, light intensity in `w`.
    pub ambient: Vec4,
    /// Light color in `xyz`, specular power in `w`.
    pub light_color: Vec4,
}

impl PassConstants {
    /// Size of the block in bytes.
    pub const SIZE: usize = size_of::<Self>();

    /// Packs the lighting parameters into the four-vector layout.
    pub fn new(
        light_position: Vec3,
        eye_position: Vec3,
        ambient_color: Vec3,
        light_intensity: f32,
        light_color: Vec3,
        specular_power: f32,
    ) -> Self {
        Self {
            light_position: light_position.extend(1.0),
            eye_position: eye_position.extend(1.0),
            ambient: ambient_color.extend(light_intensity),
            light_color: light_color.extend(specular_power),
        }
    }
}

/// Push constant ranges for the mesh pipeline layout.
///
/// [`MvpConstants`] is visible to the vertex stage and [`PassConstants`]
/// to the fragment stage. The shader blocks must declare the same offsets.
pub fn push_constant_ranges() -> [vk::PushConstantRange; 2] {
    [
        vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: MvpConstants::SIZE as u32,
        },
        vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            offset: PASS_CONSTANTS_OFFSET,
            size: PassConstants::SIZE as u32,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_rhi::physical_device::REQUIRED_PUSH_CONSTANT_BYTES;

    #[test]
    fn block_sizes_match_the_shader_layout() {
        assert_eq!(MvpConstants::SIZE, 192);
        assert_eq!(PassConstants::SIZE, 64);
        assert_eq!(PASS_CONSTANTS_OFFSET, 192);
    }

    #[test]
    fn blocks_fill_the_guaranteed_budget() {
        let total = (MvpConstants::SIZE + PassConstants::SIZE) as u32;
        assert_eq!(total, REQUIRED_PUSH_CONSTANT_BYTES);
    }

    #[test]
    fn blocks_are_vector_aligned() {
        assert_eq!(align_of::<MvpConstants>() % 4, 0);
        assert_eq!(align_of::<PassConstants>() % 4, 0);
        assert_eq!(MvpConstants::SIZE % 16, 0);
        assert_eq!(PassConstants::SIZE % 16, 0);
    }

    #[test]
    fn ranges_are_contiguous_and_disjoint() {
        let [mvp, pass] = push_constant_ranges();
        assert_eq!(mvp.offset, 0);
        assert_eq!(mvp.offset + mvp.size, pass.offset);
        assert_eq!(pass.offset + pass.size, REQUIRED_PUSH_CONSTANT_BYTES);
    }

    #[test]
    fn mvp_combines_the_stage_transforms() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let projection = Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0));

        let block = MvpConstants::new(model, view, projection);
        assert_eq!(block.mvp, projection * view * model);
        assert_eq!(block.model, model);
    }

    #[test]
    fn normal_matrix_is_the_inverse_transpose() {
        // A non-uniform scale is where the inverse transpose differs from
        // the plain model matrix.
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let block = MvpConstants::new(model, Mat4::IDENTITY, Mat4::IDENTITY);

        let expected = model.inverse().transpose();
        assert_eq!(block.normal_matrix, expected);

        let bent = block.normal_matrix.transform_vector3(Vec3::X);
        assert!((bent.x - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn pass_constants_pack_scalars_into_w() {
        let pass = PassConstants::new(
            Vec3::new(-2.0, 2.0, 2.0),
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::splat(0.5),
            5.0,
            Vec3::ONE,
            128.0,
        );

        assert_eq!(pass.light_position, Vec4::new(-2.0, 2.0, 2.0, 1.0));
        assert_eq!(pass.eye_position, Vec4::new(0.0, 0.0, 5.0, 1.0));
        assert_eq!(pass.ambient, Vec4::new(0.5, 0.5, 0.5, 5.0));
        assert_eq!(pass.light_color, Vec4::new(1.0, 1.0, 1.0, 128.0));
    }

    #[test]
    fn blocks_cast_to_plain_bytes() {
        let mvp = MvpConstants::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY);
        assert_eq!(bytemuck::bytes_of(&mvp).len(), MvpConstants::SIZE);

        let pass = PassConstants::new(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, 0.0, Vec3::ZERO, 0.0);
        assert_eq!(bytemuck::bytes_of(&pass).len(), PassConstants::SIZE);
    }
}
