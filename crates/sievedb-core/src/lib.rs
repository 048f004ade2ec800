//! Core runtime for SieveDB: the frozen model registry, key encoding,
//! index maintenance, and the set-algebra query engine, with the
//! ergonomics exported via the `prelude`.
#![warn(unreachable_pub)]

pub mod config;
pub mod db;
pub mod error;
pub mod key;
pub mod model;
pub mod obs;
pub mod record;
pub mod store;
pub mod types;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Default lifetime of ephemeral query result keys, in seconds.
///
/// Short enough that abandoned intermediates drain quickly, long enough
/// that a caller can page through a materialized result.
pub const DEFAULT_EPHEMERAL_TTL_SECS: u64 = 60;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, backends, or batch plumbing are re-exported here.
///

pub mod prelude {
    pub use crate::{
        config::{DbConfig, ReadConsistency},
        db::{Db, query::QuerySet},
        model::{FieldDescriptor, ModelDescriptor, ModelRegistry},
        record::Record,
        types::{RecordId, Timestamp},
        value::{FieldKind, Value},
    };
}
