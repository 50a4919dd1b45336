//! Engine configuration.
//!
//! Every tunable the renderer reads lives in [`EngineConfig`]. The binary
//! fills it from command-line flags; tests and embedders construct it
//! directly, usually starting from [`EngineConfig::default`].

use std::path::PathBuf;

use crate::{Error, Result};

/// Present mode the swapchain should try first.
///
/// FIFO is always available and is used whenever the preferred mode is not.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentModePreference {
    /// Triple-buffered, no tearing.
    #[default]
    Mailbox,
    /// Vsync.
    Fifo,
    /// No vsync, may tear.
    Immediate,
}

/// Configuration for window, device and scene setup.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
    /// OBJ file to display.
    pub model_path: PathBuf,
    /// Directory containing `model.vert.spv` and `model.frag.spv`.
    pub shader_dir: PathBuf,
    /// Enable `VK_LAYER_KHRONOS_validation` and the debug messenger.
    pub enable_validation: bool,
    /// Preferred swapchain present mode.
    pub present_mode: PresentModePreference,
    /// Model rotation rate in degrees per second.
    pub rotation_speed_deg: f32,
    /// Vertical field of view in degrees.
    pub fov_y_deg: f32,
    /// Near clip plane distance.
    pub z_near: f32,
    /// Far clip plane distance.
    pub z_far: f32,
    /// Camera position; the camera looks at the origin with +Z up.
    pub eye: [f32; 3],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: String::from("meshview"),
            model_path: PathBuf::from("assets/models/model.obj"),
            shader_dir: PathBuf::from("shaders/spirv"),
            enable_validation: cfg!(debug_assertions),
            present_mode: PresentModePreference::default(),
            rotation_speed_deg: 90.0,
            fov_y_deg: 45.0,
            z_near: 0.1,
            z_far: 10.0,
            eye: [2.0, 2.0, 2.0],
        }
    }
}

impl EngineConfig {
    /// Path of the vertex shader binary.
    pub fn vertex_shader_path(&self) -> PathBuf {
        self.shader_dir.join("model.vert.spv")
    }

    /// Path of the fragment shader binary.
    pub fn fragment_shader_path(&self) -> PathBuf {
        self.shader_dir.join("model.frag.spv")
    }

    /// Reject values the renderer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window size must be nonzero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.fov_y_deg > 0.0 && self.fov_y_deg < 180.0) {
            return Err(Error::Config(format!(
                "field of view must be in (0, 180) degrees, got {}",
                self.fov_y_deg
            )));
        }
        if !(self.z_near > 0.0 && self.z_far > self.z_near) {
            return Err(Error::Config(format!(
                "clip planes must satisfy 0 < near < far, got near={} far={}",
                self.z_near, self.z_far
            )));
        }
        if self.eye == [0.0; 3] {
            return Err(Error::Config(
                "camera eye must not coincide with the origin".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rotation_speed_deg, 90.0);
        assert_eq!(config.eye, [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_shader_paths() {
        let config = EngineConfig {
            shader_dir: PathBuf::from("out"),
            ..Default::default()
        };
        assert_eq!(config.vertex_shader_path(), PathBuf::from("out/model.vert.spv"));
        assert_eq!(config.fragment_shader_path(), PathBuf::from("out/model.frag.spv"));
    }

    #[test]
    fn test_zero_size_rejected() {
        let config = EngineConfig {
            height: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_inverted_clip_planes_rejected() {
        let config = EngineConfig {
            z_near: 5.0,
            z_far: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_eye_at_origin_rejected() {
        let config = EngineConfig {
            eye: [0.0; 3],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
