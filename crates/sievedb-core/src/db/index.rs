//! Module: db::index
//! Responsibility: keeping secondary index structures consistent with
//! record writes. Pointer sets make removal exact without re-deriving
//! old index keys from old values.
//! Does not own: record storage or query evaluation.

use crate::{
    model::ModelDescriptor,
    obs::sink::{self, MetricsEvent},
    record::Record,
    store::{Batch, KvBackend, KvError},
    types::RecordId,
    value::Value,
};

///
/// IndexWriter
///
/// Two-phase index maintenance for one model. `reindex` first clears
/// every structure the record's pointer sets name, then inserts entries
/// for the record's current values; `deindex` stops after the clear.
/// Each phase is one write batch, so a fault between phases can leave a
/// record cleared but not yet re-added. That is the accepted hazard of
/// a store without transactions; re-saving the record repairs it.
///

pub(crate) struct IndexWriter<'a, B: KvBackend> {
    backend: &'a B,
    model: &'a ModelDescriptor,
}

impl<'a, B: KvBackend> IndexWriter<'a, B> {
    pub(crate) const fn new(backend: &'a B, model: &'a ModelDescriptor) -> Self {
        Self { backend, model }
    }

    /// Clear stale entries, then index the record's current values.
    pub(crate) fn reindex(&self, id: RecordId, record: &Record) -> Result<(), KvError> {
        let removes = self.clear(id, false)?;
        let inserts = self.add(id, record)?;

        sink::record(MetricsEvent::IndexDelta {
            model: self.model.name(),
            inserts,
            removes,
        });

        Ok(())
    }

    /// Remove the record from every index structure and from membership.
    pub(crate) fn deindex(&self, id: RecordId) -> Result<(), KvError> {
        let removes = self.clear(id, true)?;

        sink::record(MetricsEvent::IndexDelta {
            model: self.model.name(),
            inserts: 0,
            removes,
        });

        Ok(())
    }

    /// Phase 1: walk the pointer sets and remove this id from every
    /// index key they name, drop unique lookup entries for the values
    /// still in the row hash, then delete the pointer sets themselves.
    fn clear(&self, id: RecordId, drop_membership: bool) -> Result<u64, KvError> {
        let keys = self.model.keys();
        let member = id.to_string();
        let mut batch = Batch::new();
        let mut removes: u64 = 0;

        let pointer_key = keys.pointer_set(id);
        for index_key in self.backend.smembers(&pointer_key)? {
            batch.srem(index_key, member.as_str());
            removes = removes.saturating_add(1);
        }
        batch.del(pointer_key);

        let range_pointer_key = keys.range_pointer_set(id);
        for index_key in self.backend.smembers(&range_pointer_key)? {
            batch.zrem(index_key, member.as_str());
            removes = removes.saturating_add(1);
        }
        batch.del(range_pointer_key);

        // Unique lookups are keyed by value, so the old value has to be
        // read back from the row hash before it is overwritten.
        let record_key = keys.record(id);
        for field in self.model.unique_fields() {
            if let Some(old) = self.backend.hget(&record_key, field.name())? {
                batch.hdel(keys.unique_lookup(field.name()), old);
                removes = removes.saturating_add(1);
            }
        }

        if drop_membership {
            batch.srem(keys.membership(), member);
        }

        self.backend.apply(&batch)?;
        Ok(removes)
    }

    /// Phase 2: insert index entries for every indexed field the record
    /// has a value for, recording each touched key in the pointer sets.
    fn add(&self, id: RecordId, record: &Record) -> Result<u64, KvError> {
        let keys = self.model.keys();
        let member = id.to_string();
        let mut batch = Batch::new();
        let mut inserts: u64 = 0;

        let pointer_key = keys.pointer_set(id);
        let range_pointer_key = keys.range_pointer_set(id);

        for field in self.model.indexed_fields() {
            let Some(value) = record.value(field.name()) else {
                continue;
            };

            if let Value::List(items) = value {
                for elem in items {
                    if let Some(storage) = elem.scalar_storage() {
                        let index_key = keys.element_index(field.name(), &storage);
                        batch.sadd(index_key.clone(), member.as_str());
                        batch.sadd(pointer_key.as_str(), index_key);
                        inserts = inserts.saturating_add(1);
                    }
                }
            } else if let Some(storage) = value.scalar_storage() {
                let index_key = keys.attribute_index(field.name(), &storage);
                batch.sadd(index_key.clone(), member.as_str());
                batch.sadd(pointer_key.as_str(), index_key);
                inserts = inserts.saturating_add(1);
            }

            if field.is_range_indexable()
                && let Some(score) = value.score()
            {
                let index_key = keys.range_index(field.name());
                batch.zadd(index_key.clone(), member.as_str(), score);
                batch.sadd(range_pointer_key.as_str(), index_key);
                inserts = inserts.saturating_add(1);
            }
        }

        // Unique lookups are last-write-wins; the constraint itself is
        // not enforced here.
        for field in self.model.unique_fields() {
            if let Some(value) = record.value(field.name())
                && let Some(storage) = value.scalar_storage()
            {
                batch.hset(keys.unique_lookup(field.name()), storage, member.as_str());
            }
        }

        self.backend.apply(&batch)?;
        Ok(inserts)
    }
}

///
/// TESTS
///
