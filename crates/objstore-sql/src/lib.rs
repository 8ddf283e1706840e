//! # objstore-sql
//!
//! Compiles object queries into SQL for a relational store that persists
//! objects one table per class.
//!
//! A [`Query`](query::Query) is built over classes of a
//! [`Model`](metadata::Model): FROM sources, projected expressions,
//! constraints, grouping and ordering. The
//! [`SqlGenerator`](sql::SqlGenerator) turns it into a single SQL string,
//! expanding composite class types into joined tables and relationships into
//! key comparisons or indirection-table joins.
//!
//! ## Module Overview
//!
//! - [`metadata`] - Classes, fields, and table/column naming
//! - [`value`] - Literal values and stored object references
//! - [`platform`] - Target databases and literal rendering
//! - [`query`] - The query AST
//! - [`sql`] - SQL generation and the offset cache

// format_push_string: push_str(&format!(..)) reads better when assembling SQL
// doc_markdown: SQL keywords in docs are not code items
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_const_for_fn)]

pub mod metadata;
pub mod platform;
pub mod query;
pub mod sql;
pub mod value;

pub use metadata::{ClassDescriptor, ClassType, FieldDescriptor, Model};
pub use platform::Platform;
pub use query::Query;
pub use sql::{generate_query_for_id, SqlGenerator};
pub use value::{PersistedObject, Value};
