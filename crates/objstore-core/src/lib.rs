//! # objstore-core
//!
//! Core types for objstore-rs: the error taxonomy shared by every crate,
//! generator settings and their loaders, and tracing setup.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Generator settings
//! - [`settings_loader`] - Loading settings from TOML/JSON and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{ObjectStoreError, ObjectStoreResult};
pub use settings::Settings;
