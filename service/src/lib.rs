//! Process-level plumbing for the Taskboard client binary: command line and
//! environment configuration, and console logging.

pub mod config;
pub mod logging;

pub use config::{Config, RustEnv};
pub use logging::Logger;
