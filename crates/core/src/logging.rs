//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,meshview=debug,meshview_renderer=debug,meshview_rhi=debug";

/// Install the global tracing subscriber.
///
/// Filtering honours `RUST_LOG`; without it [`DEFAULT_FILTER`] applies.
/// Calling this twice is harmless: the second install is ignored.
///
/// # Example
/// ```
/// meshview_core::init_logging();
/// tracing::info!("engine starting");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }
}
