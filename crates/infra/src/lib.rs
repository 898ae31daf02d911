//! `stockline-infra`: storage backends, configuration and the application
//! services that tie the domain crates together.

pub mod config;
pub mod error;
pub mod notify;
pub mod services;
pub mod store;

pub use config::{AppConfig, ConfigError, StorageConfig};
pub use error::ServiceError;
pub use notify::NotificationBus;
