//! Process bootstrap: paths, configuration, tracing and dependency wiring.

pub mod config;
pub mod paths;
pub mod tracing;
pub mod wiring;

pub use config::load_config;
pub use paths::AppPaths;
pub use wiring::{WiringError, WiringResult};
