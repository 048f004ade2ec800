//! Module: db
//! Responsibility: the database handle. Owns the backend, the frozen
//! model registry, and runtime config; exposes record save/load/delete
//! and the query entry points. Query composition lives in `query`,
//! index maintenance in `index`, scratch-key lifecycle in `ephemeral`.

pub(crate) mod ephemeral;
pub(crate) mod index;
pub mod query;

pub use query::{IdList, QueryError, QuerySet, Records};

use crate::{
    config::DbConfig,
    error::InternalError,
    model::{ModelDescriptor, ModelRegistry, SchemaError},
    obs::sink::{ExecKind, Span},
    record::{Record, RecordError},
    store::{Batch, KvBackend, KvError},
    types::RecordId,
    value::{FieldKind, Value},
};
use index::IndexWriter;
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error as ThisError;

///
/// DbError
///

#[derive(Debug, ThisError)]
pub enum DbError {
    #[error(transparent)]
    InternalError(#[from] InternalError),

    #[error(transparent)]
    KvError(#[from] KvError),

    #[error(transparent)]
    QueryError(#[from] QueryError),

    #[error(transparent)]
    RecordError(#[from] RecordError),

    #[error(transparent)]
    SchemaError(#[from] SchemaError),
}

///
/// Db
///
/// A cheaply cloneable handle over one backend and one registry. Every
/// query set holds a clone, so results stay readable after the handle
/// that produced them goes out of scope.
///

struct DbInner<B: KvBackend> {
    backend: B,
    registry: ModelRegistry,
    config: DbConfig,
}

pub struct Db<B: KvBackend> {
    inner: Arc<DbInner<B>>,
}

impl<B: KvBackend> Db<B> {
    /// Open over a backend with default config.
    #[must_use]
    pub fn open(backend: B, registry: ModelRegistry) -> Self {
        Self::open_with(backend, registry, DbConfig::default())
    }

    #[must_use]
    pub fn open_with(backend: B, registry: ModelRegistry, config: DbConfig) -> Self {
        Self {
            inner: Arc::new(DbInner {
                backend,
                registry,
                config,
            }),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    /// Look a model up by name.
    pub fn model(&self, name: &str) -> Result<Arc<ModelDescriptor>, InternalError> {
        self.inner
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| InternalError::unknown_model(name))
    }

    /// An unconstrained query set over `model`.
    #[must_use]
    pub fn query(&self, model: &Arc<ModelDescriptor>) -> QuerySet<B> {
        QuerySet::new(self.clone(), Arc::clone(model))
    }

    /// An unconstrained query set over the model named `name`.
    pub fn find(&self, name: &str) -> Result<QuerySet<B>, DbError> {
        let model = self.model(name)?;

        Ok(self.query(&model))
    }

    /// Persist a record: allocate an id on first save, refresh every
    /// index, then rewrite the row. The index pass reads the previous
    /// row, so it runs before the rewrite.
    pub fn save(&self, record: &mut Record) -> Result<RecordId, DbError> {
        let model = Arc::clone(record.model());
        let keys = model.keys();
        let mut span = Span::new(ExecKind::Save, model.name());

        let id = match record.id() {
            Some(id) => id,
            None => RecordId::new(self.backend().incr(&keys.sequence())?),
        };
        record.assign_id(id);

        IndexWriter::new(self.backend(), &model).reindex(id, record)?;

        let record_key = keys.record(id);
        let mut batch = Batch::new();
        batch.sadd(keys.membership(), id.to_string());
        batch.del(record_key.clone());
        for (field, raw) in record.storage_row() {
            batch.hset(record_key.clone(), field, raw);
        }
        for (field, items) in record.list_rows() {
            let list_key = keys.list_field(id, &field);
            batch.del(list_key.clone());
            if !items.is_empty() {
                batch.rpush(list_key, items);
            }
        }
        self.backend().apply(&batch)?;
        span.set_rows(1);

        Ok(id)
    }

    /// Remove a record and all its index entries. False when the id is
    /// not live.
    pub fn delete(&self, model: &Arc<ModelDescriptor>, id: RecordId) -> Result<bool, DbError> {
        let keys = model.keys();
        let mut span = Span::new(ExecKind::Delete, model.name());

        if !self.backend().sismember(&keys.membership(), &id.to_string())? {
            return Ok(false);
        }

        IndexWriter::new(self.backend(), model).deindex(id)?;

        let mut batch = Batch::new();
        batch.del(keys.record(id));
        for field in model.list_fields() {
            batch.del(keys.list_field(id, field.name()));
        }
        self.backend().apply(&batch)?;
        span.set_rows(1);

        Ok(true)
    }

    /// Load a live record by id.
    pub fn load(
        &self,
        model: &Arc<ModelDescriptor>,
        id: RecordId,
    ) -> Result<Option<Record>, DbError> {
        let mut span = Span::new(ExecKind::Load, model.name());

        let record = self.hydrate(model, id)?;
        span.set_rows(u64::from(record.is_some()));

        Ok(record)
    }

    /// Whether `id` is live for `model`.
    pub fn exists(&self, model: &Arc<ModelDescriptor>, id: RecordId) -> Result<bool, DbError> {
        let live = self
            .backend()
            .sismember(&model.keys().membership(), &id.to_string())?;

        Ok(live)
    }

    /// Atomically add `delta` to a counter field, refreshing its index
    /// entries, and return the new value.
    pub fn incr(
        &self,
        model: &Arc<ModelDescriptor>,
        id: RecordId,
        field: &str,
        delta: i64,
    ) -> Result<i64, DbError> {
        let Some(descriptor) = model.field(field) else {
            return Err(RecordError::UnknownField {
                model: model.name().to_string(),
                field: field.to_string(),
            }
            .into());
        };
        if !matches!(descriptor.kind(), FieldKind::Counter) {
            return Err(RecordError::KindMismatch {
                field: field.to_string(),
                expected: "counter".to_string(),
                found: descriptor.kind().label(),
            }
            .into());
        }

        let keys = model.keys();
        if !self.backend().sismember(&keys.membership(), &id.to_string())? {
            return Err(InternalError::record_not_found(model.name(), id).into());
        }

        let next = self.backend().hincrby(&keys.record(id), field, delta)?;

        // the counter's attribute and range index entries point at the
        // old value; a reindex from the fresh row repairs them
        let Some(record) = self.hydrate(model, id)? else {
            return Err(InternalError::record_not_found(model.name(), id).into());
        };
        IndexWriter::new(self.backend(), model).reindex(id, &record)?;

        Ok(next)
    }

    /// Rebuild a record from its row hash and list keys. Membership is
    /// the liveness authority; a missing member hydrates to `None` no
    /// matter what keys remain.
    pub(crate) fn hydrate(
        &self,
        model: &Arc<ModelDescriptor>,
        id: RecordId,
    ) -> Result<Option<Record>, DbError> {
        let backend = self.backend();
        let keys = model.keys();
        if !backend.sismember(&keys.membership(), &id.to_string())? {
            return Ok(None);
        }

        let row = backend.hgetall(&keys.record(id))?;
        let mut values = BTreeMap::new();
        for field in model.fields() {
            if let FieldKind::List(elem) = field.kind() {
                let items = backend.lrange(&keys.list_field(id, field.name()), 0, -1)?;
                let mut decoded = Vec::with_capacity(items.len());
                for item in items {
                    let value = Value::from_storage(elem, &item)
                        .map_err(|err| bad_stored_value(model.name(), id, field.name(), &err))?;
                    decoded.push(value);
                }
                values.insert(field.name().to_string(), Value::List(decoded));
            } else if let Some(raw) = row.get(field.name()) {
                let value = Value::from_storage(field.kind(), raw)
                    .map_err(|err| bad_stored_value(model.name(), id, field.name(), &err))?;
                values.insert(field.name().to_string(), value);
            }
        }

        Ok(Some(Record::hydrated(model, id, values)))
    }
}

impl<B: KvBackend> Clone for Db<B> {
    // Clones the Arc handle, not the backend.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn bad_stored_value(
    model: &str,
    id: RecordId,
    field: &str,
    err: &crate::value::ValueError,
) -> InternalError {
    InternalError::record_corruption(format!("bad stored value for {model}:{id}:{field}: {err}"))
}

///
/// TESTS
///
