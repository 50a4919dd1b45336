//! Core utilities shared by every meshview crate.
//!
//! - Error types for the platform layer and startup glue
//! - Logging initialization
//! - Frame clock
//! - Engine configuration

mod config;
mod error;
mod logging;
mod timer;

pub use config::{EngineConfig, PresentModePreference};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::FrameClock;
