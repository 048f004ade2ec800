use derive_more::Display;
use serde::{Deserialize, Serialize};
use sievedb_core::{
    db::{DbError, QueryError},
    error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError},
    model::SchemaError,
    record::RecordError,
    store::KvError,
};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Debug, Deserialize, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InternalError(err) => err.into(),
            DbError::KvError(err) => err.into(),
            DbError::QueryError(err) => err.into(),
            DbError::RecordError(err) => err.into(),
            DbError::SchemaError(err) => err.into(),
        }
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        let kind = match err.class {
            ErrorClass::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        };

        Self::new(kind, err.origin.into(), err.message)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        let kind = match err {
            QueryError::AttributeNotIndexed { .. }
            | QueryError::BadRangeBound { .. }
            | QueryError::FieldNotUnique { .. }
            | QueryError::LimitOffsetMismatch
            | QueryError::MissingRangeBound { .. }
            | QueryError::UnknownField { .. }
            | QueryError::UnknownRangeOp { .. } => ErrorKind::Query(QueryErrorKind::Invalid),

            QueryError::FilterNotScalar { .. } | QueryError::RangeNotSupported { .. } => {
                ErrorKind::Query(QueryErrorKind::Unsupported)
            }
        };

        Self::new(kind, ErrorOrigin::Query, err.to_string())
    }
}

impl From<RecordError> for Error {
    fn from(err: RecordError) -> Self {
        let kind = match err {
            RecordError::KindMismatch { .. } => ErrorKind::Record(RecordErrorKind::KindMismatch),
            RecordError::UnknownField { .. } => ErrorKind::Record(RecordErrorKind::UnknownField),
        };

        Self::new(kind, ErrorOrigin::Record, err.to_string())
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Self::new(ErrorKind::Schema, ErrorOrigin::Schema, err.to_string())
    }
}

impl From<KvError> for Error {
    fn from(err: KvError) -> Self {
        Self::new(ErrorKind::Store, ErrorOrigin::Store, err.to_string())
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[remain::sorted]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// The caller cannot remediate this.
    Internal,

    /// Valid request, but the target does not exist.
    NotFound,

    Query(QueryErrorKind),

    Record(RecordErrorKind),

    /// Model declaration was rejected at registration.
    Schema,

    /// The backing store failed.
    Store,
}

///
/// QueryErrorKind
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum QueryErrorKind {
    /// Query shape is invalid (unknown fields, bad predicates).
    Invalid,

    /// The query is valid but asks for something this model cannot do.
    Unsupported,
}

///
/// RecordErrorKind
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum RecordErrorKind {
    KindMismatch,
    UnknownField,
}

///
/// ErrorOrigin
/// Public origin taxonomy for callers.
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Index,
    Query,
    Record,
    Schema,
    Store,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Index => Self::Index,
            CoreErrorOrigin::Query => Self::Query,
            CoreErrorOrigin::Record => Self::Record,
            CoreErrorOrigin::Schema => Self::Schema,
            CoreErrorOrigin::Store => Self::Store,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_errors_map_to_public_kinds() {
        let err: Error = QueryError::UnknownField {
            model: "Article".to_string(),
            field: "ghost".to_string(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Query(QueryErrorKind::Invalid));
        assert_eq!(err.origin, ErrorOrigin::Query);
        assert!(err.message.contains("ghost"));

        let err: Error = QueryError::RangeNotSupported {
            model: "Article".to_string(),
            field: "title".to_string(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Query(QueryErrorKind::Unsupported));
    }

    #[test]
    fn test_db_error_flattens_through() {
        let inner = QueryError::LimitOffsetMismatch;
        let err: Error = DbError::from(inner).into();
        assert_eq!(err.kind, ErrorKind::Query(QueryErrorKind::Invalid));
    }

    #[test]
    fn test_error_serializes_for_transport() {
        let err = Error::new(ErrorKind::Schema, ErrorOrigin::Schema, "duplicate model");
        let json = serde_json::to_string(&err).expect("error serializes");
        let back: Error = serde_json::from_str(&json).expect("error deserializes");

        assert_eq!(back.kind, ErrorKind::Schema);
        assert_eq!(back.origin, ErrorOrigin::Schema);
        assert_eq!(back.message, "duplicate model");
    }
}
