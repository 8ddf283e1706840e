//! # objstore-rs
//!
//! An object/relational query compiler.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access, together with the third-party crates that appear in their public
//! API: `chrono` for temporal [`Value`](sql::value::Value)s, `serde` and
//! `serde_json` for settings and model descriptions, and `tracing` with
//! `tracing-subscriber` for installing a custom subscriber.

/// Errors, settings, and logging setup.
pub use objstore_core as core;

/// Metadata model, query AST, and SQL generation.
pub use objstore_sql as sql;

pub use chrono;
pub use serde;
pub use serde_json;
pub use tracing;
pub use tracing_subscriber;
