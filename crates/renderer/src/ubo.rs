//! Uniform buffer contents for the mesh shaders.
//!
//! Matches the `UniformBufferObject` block in `shaders/model.vert`
//! (set 0, binding 0). `#[repr(C)]` with three `mat4`s has the same
//! layout under std140.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use meshview_core::EngineConfig;

/// Model, view and projection matrices.
///
/// # Memory Layout
///
/// - Offset 0: model (64 bytes)
/// - Offset 64: view (64 bytes)
/// - Offset 128: projection (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

/// Fixed camera and animation parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    /// Camera position. The camera looks at the origin with +Z up.
    pub eye: Vec3,
    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
    /// Model spin about +Z in degrees per second.
    pub rotation_speed_deg: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for CameraParams {
    fn from(config: &EngineConfig) -> Self {
        Self {
            eye: Vec3::from_array(config.eye),
            fov_y_deg: config.fov_y_deg,
            z_near: config.z_near,
            z_far: config.z_far,
            rotation_speed_deg: config.rotation_speed_deg,
        }
    }
}

impl UniformBufferObject {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Matrices for `elapsed_secs` after startup at the given aspect ratio.
    ///
    /// The projection has its Y scale negated to account for Vulkan's
    /// downward clip-space Y.
    pub fn compute(params: &CameraParams, elapsed_secs: f32, aspect: f32) -> Self {
        let angle = (params.rotation_speed_deg * elapsed_secs).to_radians();
        let model = Mat4::from_rotation_z(angle);
        let view = Mat4::look_at_rh(params.eye, Vec3::ZERO, Vec3::Z);

        let mut proj = Mat4::perspective_rh(
            params.fov_y_deg.to_radians(),
            aspect,
            params.z_near,
            params.z_far,
        );
        proj.y_axis.y *= -1.0;

        Self { model, view, proj }
    }
}

/// Width over height, or 1.0 for a degenerate extent.
pub fn aspect_ratio(extent: vk::Extent2D) -> f32 {
    if extent.height == 0 {
        1.0
    } else {
        extent.width as f32 / extent.height as f32
    }
}
