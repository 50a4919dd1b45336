//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use meshview_core::{EngineConfig, PresentModePreference};

/// Present mode as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliPresentMode {
    /// Triple buffering without tearing, falls back to fifo.
    #[default]
    Mailbox,
    /// Vsync.
    Fifo,
    /// Uncapped, may tear.
    Immediate,
}

impl From<CliPresentMode> for PresentModePreference {
    fn from(mode: CliPresentMode) -> Self {
        match mode {
            CliPresentMode::Mailbox => PresentModePreference::Mailbox,
            CliPresentMode::Fifo => PresentModePreference::Fifo,
            CliPresentMode::Immediate => PresentModePreference::Immediate,
        }
    }
}

/// Command line of the viewer.
#[derive(Parser, Debug)]
#[command(name = "meshview", about = "Display a textured OBJ model with Vulkan", version)]
pub struct Args {
    /// OBJ file to display. Its MTL file and textures are resolved relative to it.
    #[arg(default_value = "assets/models/model.obj")]
    pub model: PathBuf,

    /// Directory holding model.vert.spv and model.frag.spv.
    #[arg(long, default_value = "shaders/spirv")]
    pub shader_dir: PathBuf,

    /// Initial window width in pixels.
    #[arg(long, default_value = "1280")]
    pub width: u32,

    /// Initial window height in pixels.
    #[arg(long, default_value = "720")]
    pub height: u32,

    /// Preferred swapchain present mode.
    #[arg(long, default_value = "mailbox", value_enum)]
    pub present_mode: CliPresentMode,

    /// Model rotation in degrees per second.
    #[arg(long, default_value = "90")]
    pub rotation_speed: f32,

    /// Enable the Vulkan validation layer (default in debug builds).
    #[arg(long, conflicts_with = "no_validation")]
    pub validation: bool,

    /// Disable the Vulkan validation layer.
    #[arg(long, conflicts_with = "validation")]
    pub no_validation: bool,

    /// Exit after rendering this many frames.
    #[arg(long)]
    pub max_frames: Option<u64>,
}

impl Args {
    /// Whether validation is on after applying the explicit flags.
    pub fn enable_validation(&self) -> bool {
        if self.validation {
            true
        } else if self.no_validation {
            false
        } else {
            cfg!(debug_assertions)
        }
    }

    /// Engine configuration described by these arguments.
    pub fn to_config(&self) -> EngineConfig {
        EngineConfig {
            width: self.width,
            height: self.height,
            model_path: self.model.clone(),
            shader_dir: self.shader_dir.clone(),
            enable_validation: self.enable_validation(),
            present_mode: self.present_mode.into(),
            rotation_speed_deg: self.rotation_speed,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("meshview").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_match_engine_config() {
        let config = parse(&[]).to_config();
        let defaults = EngineConfig::default();

        assert_eq!(config.width, defaults.width);
        assert_eq!(config.height, defaults.height);
        assert_eq!(config.model_path, defaults.model_path);
        assert_eq!(config.shader_dir, defaults.shader_dir);
        assert_eq!(config.present_mode, PresentModePreference::Mailbox);
        assert_eq!(config.rotation_speed_deg, 90.0);
        assert_eq!(config.enable_validation, cfg!(debug_assertions));
    }

    #[test]
    fn test_flags_reach_config() {
        let args = parse(&[
            "scenes/room.obj",
            "--width",
            "640",
            "--height",
            "480",
            "--present-mode",
            "fifo",
            "--rotation-speed",
            "45",
            "--no-validation",
            "--max-frames",
            "10",
        ]);
        let config = args.to_config();

        assert_eq!(config.model_path, PathBuf::from("scenes/room.obj"));
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.present_mode, PresentModePreference::Fifo);
        assert_eq!(config.rotation_speed_deg, 45.0);
        assert!(!config.enable_validation);
        assert_eq!(args.max_frames, Some(10));
    }

    #[test]
    fn test_validation_flags_conflict() {
        let result = Args::try_parse_from(["meshview", "--validation", "--no-validation"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_validation() {
        assert!(parse(&["--validation"]).enable_validation());
    }
}
