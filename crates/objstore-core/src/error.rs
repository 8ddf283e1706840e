//! Core error types for objstore-rs.
//!
//! [`ObjectStoreError`] covers the recoverable failures of query translation
//! (a class or field missing from the metadata model, a persisted object
//! without an id) together with configuration, metadata-loading and IO
//! errors.
//!
//! Malformed query trees are not represented here. The query AST is a set of
//! closed enums, so the remaining consistency violations (a node used in a
//! query that never registered it) are programmer errors and panic.

use thiserror::Error;

/// The primary error type for objstore-rs.
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    // ── Modeling errors ──────────────────────────────────────────────

    /// A class referenced by a query is not present in the metadata model.
    #[error("{0} is not in the model")]
    ClassNotInModel(String),

    /// A field referenced by a query is not declared by its class.
    #[error("Field {field} is not in the model for class {class}")]
    FieldNotInModel {
        /// The class (or composite type) that was searched.
        class: String,
        /// The missing field name.
        field: String,
    },

    /// A persisted object without an assigned id was used as a constraint value.
    #[error("Object of class {0} found without an ID set")]
    ObjectWithoutId(String),

    // ── Metadata ─────────────────────────────────────────────────────

    /// The metadata model description is inconsistent or malformed.
    #[error("Metadata error: {0}")]
    MetadataError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ObjectStoreError {
    /// Returns `true` for errors caused by the query referring to something
    /// the metadata model or the supplied objects cannot satisfy.
    ///
    /// These are the failures a caller can report back to whoever built the
    /// query. Offset pre-registration downgrades them to a warning.
    pub const fn is_modeling_error(&self) -> bool {
        matches!(
            self,
            Self::ClassNotInModel(_) | Self::FieldNotInModel { .. } | Self::ObjectWithoutId(_)
        )
    }
}

/// A convenience type alias for `Result<T, ObjectStoreError>`.
pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;
