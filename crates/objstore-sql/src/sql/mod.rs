//! SQL generation.
//!
//! [`SqlGenerator`] compiles a [`Query`](crate::query::Query) for one model
//! and platform. Compiled SQL is cached on the query itself by row offset
//! (see [`offset_cache`]), so repeated page requests deep into a large
//! result can start from a seek predicate instead of a long `OFFSET`.

mod clauses;
mod constraint;
mod expression;
mod from;
pub mod generator;
pub mod offset_cache;
mod state;

pub use generator::{generate_query_for_id, SqlGenerator};
pub use offset_cache::OffsetCache;
