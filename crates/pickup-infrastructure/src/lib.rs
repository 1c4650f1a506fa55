//! Filesystem-backed infrastructure for the pickup client.
//!
//! - [`FileDurableStore`]: durable session record, one atomically written
//!   JSON file per key
//! - [`ClientConfig`]: TOML client configuration with environment overrides
//! - [`PickupPaths`]: platform config/data directory resolution

pub mod config;
pub mod file_store;
pub mod paths;
pub mod storage;

pub use config::{ClientConfig, ConfigError, TimeoutConfig};
pub use file_store::{FileDurableStore, FileStoreError};
pub use paths::{PathError, PickupPaths};
