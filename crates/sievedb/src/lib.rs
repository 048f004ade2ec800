//! ## Crate layout
//! - `core`: runtime registry, records, index maintenance, the query
//!   engine, and observability counters.
//! - `error`: the public error taxonomy wrapping the runtime's internal
//!   error types.
//!
//! The `prelude` module mirrors the runtime surface application code
//! actually touches; backends and batch plumbing stay behind `core`.

pub use sievedb_core as core;

pub mod error;

pub use error::{Error, ErrorKind, ErrorOrigin, QueryErrorKind, RecordErrorKind};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        config::{DbConfig, ReadConsistency},
        db::{Db, IdList, QuerySet, Records},
        model::{FieldDescriptor, ModelDescriptor, ModelRegistry},
        record::Record,
        store::{KvBackend, MemoryBackend},
        types::{RecordId, Timestamp},
        value::{FieldKind, Value},
    };
    pub use crate::error::{Error, ErrorKind, ErrorOrigin};
}
