//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     TOML file → loader.rs → validation.rs → StoreConfig
//!
//! Reload (SIGHUP in the server role, 'h' on the control channel in the
//! housekeeping role):
//!     Re-run the loader; on failure, keep the current configuration.
//! ```
//!
//! # Design Decisions
//! - Every section has defaults; an empty file is a valid configuration
//! - Validation is a separate pass that collects all failures at once
//! - A failed reload never replaces a working configuration

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::StoreConfig;
