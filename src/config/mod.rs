//! Configuration: layered key lookup and typed scheduler settings.

pub mod loader;
pub mod scheduler;

pub use loader::{env_key, ConfigLoader, DEFAULT_CONFIG_FILE};
pub use scheduler::SchedulerConfig;
