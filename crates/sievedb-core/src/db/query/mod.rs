//! Module: db::query
//! Responsibility: the immutable query surface. A query set collects
//! filters, exclusions, one range predicate, ordering and pagination;
//! every mutator forks, evaluation is lazy and memoized per instance.
//! Does not own: index maintenance or record storage.

mod eval;


use crate::{
    config::ReadConsistency,
    db::{Db, DbError, ephemeral},
    error::InternalError,
    model::ModelDescriptor,
    record::Record,
    store::KvBackend,
    types::RecordId,
    value::Value,
};
use derive_more::{Deref, IntoIterator};
use std::{cell::OnceCell, collections::BTreeMap, sync::Arc};
use thiserror::Error as ThisError;

///
/// QueryError
/// Composition faults, surfaced on first evaluation. Mutators never
/// validate; a malformed query is inert until read.
///

#[remain::sorted]
#[derive(Debug, ThisError, Eq, PartialEq)]
pub enum QueryError {
    #[error("field '{field}' on model '{model}' is not indexed")]
    AttributeNotIndexed { model: String, field: String },

    #[error("range bound for field '{field}' must be numeric")]
    BadRangeBound { field: String },

    #[error("field '{field}' on model '{model}' is not unique")]
    FieldNotUnique { model: String, field: String },

    #[error("filter value for field '{field}' must be a scalar")]
    FilterNotScalar { field: String },

    #[error("limit and offset must be set together")]
    LimitOffsetMismatch,

    #[error("range operator 'between' on field '{field}' needs a high bound")]
    MissingRangeBound { field: String },

    #[error("field '{field}' on model '{model}' does not support range queries")]
    RangeNotSupported { model: String, field: String },

    #[error("unknown field '{field}' on model '{model}'")]
    UnknownField { model: String, field: String },

    #[error("unknown range operator '{token}'")]
    UnknownRangeOp { token: String },
}

///
/// RangeOp
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RangeOp {
    /// `low <= score <= high`, both ends inclusive.
    Between,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    pub fn parse(token: &str) -> Result<Self, QueryError> {
        match token {
            "between" => Ok(Self::Between),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            _ => Err(QueryError::UnknownRangeOp {
                token: token.to_string(),
            }),
        }
    }
}

///
/// RangePredicate
/// Stored unparsed; the operator token is checked at evaluation.
///

#[derive(Clone, Debug)]
pub(crate) struct RangePredicate {
    pub(crate) field: String,
    pub(crate) op: String,
    pub(crate) low: Value,
    pub(crate) high: Option<Value>,
}

///
/// OrderKey
///

#[derive(Clone, Debug)]
pub(crate) struct OrderKey {
    pub(crate) field: String,
    pub(crate) desc: bool,
}

///
/// IdList
/// The materialized, ordered ids of one evaluation. Indexing follows
/// ordinal conventions: negative counts from the end, slices clamp.
///

#[derive(Clone, Debug, Default, Deref, Eq, IntoIterator, PartialEq)]
pub struct IdList(#[into_iterator(owned, ref)] Vec<RecordId>);

impl IdList {
    pub(crate) const fn new(ids: Vec<RecordId>) -> Self {
        Self(ids)
    }

    /// Ordinal access; negative indices count from the end.
    #[must_use]
    pub fn get(&self, index: i64) -> Option<RecordId> {
        let len = i64::try_from(self.0.len()).ok()?;
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 || resolved >= len {
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let resolved = resolved as usize;
        self.0.get(resolved).copied()
    }

    /// Half-open slice `[from, to)`; out-of-bounds ends clamp instead of
    /// panicking, negative ends count from the end.
    #[must_use]
    pub fn slice(&self, from: i64, to: i64) -> &[RecordId] {
        let len = i64::try_from(self.0.len()).unwrap_or(i64::MAX);
        let resolve = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };
        let from = resolve(from);
        let to = resolve(to);
        if from >= to {
            return &[];
        }

        #[allow(clippy::cast_sign_loss)]
        let (from, to) = (from as usize, to as usize);

        &self.0[from..to]
    }
}

///
/// QuerySet
///
/// An immutable description of one query over one model. Mutators fork:
/// the receiver keeps its constraints, its token, and any memoized
/// result; the returned set carries the added constraint, a fresh
/// token, and no memo. Reading (`ids`, `count`, iteration, indexing)
/// evaluates once and pins the result for this instance's lifetime.
///

pub struct QuerySet<B: KvBackend> {
    db: Db<B>,
    model: Arc<ModelDescriptor>,
    filters: BTreeMap<String, Value>,
    exclusions: BTreeMap<String, Value>,
    range: Option<RangePredicate>,
    order: Option<OrderKey>,
    limit: Option<usize>,
    offset: Option<usize>,
    token: u64,
    ids: OnceCell<IdList>,
}

impl<B: KvBackend> QuerySet<B> {
    pub(crate) fn new(db: Db<B>, model: Arc<ModelDescriptor>) -> Self {
        Self {
            db,
            model,
            filters: BTreeMap::new(),
            exclusions: BTreeMap::new(),
            range: None,
            order: None,
            limit: None,
            offset: None,
            token: ephemeral::next_token(),
            ids: OnceCell::new(),
        }
    }

    /// Fork: same constraints, fresh token, empty memo.
    fn fork(&self) -> Self {
        Self {
            db: self.db.clone(),
            model: Arc::clone(&self.model),
            filters: self.filters.clone(),
            exclusions: self.exclusions.clone(),
            range: self.range.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
            token: ephemeral::next_token(),
            ids: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn model(&self) -> &Arc<ModelDescriptor> {
        &self.model
    }

    fn is_constrained(&self) -> bool {
        !self.filters.is_empty() || !self.exclusions.is_empty() || self.range.is_some()
    }

    //
    // Mutators
    //

    /// Require `field == value`. Multiple filters compose as AND.
    #[must_use]
    pub fn filter(&self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.fork();
        next.filters.insert(field.into(), value.into());
        next
    }

    /// Require `field != value`.
    #[must_use]
    pub fn exclude(&self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.fork();
        next.exclusions.insert(field.into(), value.into());
        next
    }

    /// Range-constrain a field: `op` is one of `lt`, `gt`, `gte`, `lte`.
    /// A range predicate replaces any previous one and routes evaluation
    /// through the range index, ignoring filters and ordering.
    #[must_use]
    pub fn range(
        &self,
        field: impl Into<String>,
        op: impl Into<String>,
        bound: impl Into<Value>,
    ) -> Self {
        let mut next = self.fork();
        next.range = Some(RangePredicate {
            field: field.into(),
            op: op.into(),
            low: bound.into(),
            high: None,
        });
        next
    }

    /// Inclusive range constraint `low <= field <= high`.
    #[must_use]
    pub fn range_between(
        &self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        let mut next = self.fork();
        next.range = Some(RangePredicate {
            field: field.into(),
            op: "between".to_string(),
            low: low.into(),
            high: Some(high.into()),
        });
        next
    }

    /// Order ascending by one field. Replaces any previous ordering.
    #[must_use]
    pub fn order(&self, field: impl Into<String>) -> Self {
        let mut next = self.fork();
        next.order = Some(OrderKey {
            field: field.into(),
            desc: false,
        });
        next
    }

    /// Order descending by one field.
    #[must_use]
    pub fn order_desc(&self, field: impl Into<String>) -> Self {
        let mut next = self.fork();
        next.order = Some(OrderKey {
            field: field.into(),
            desc: true,
        });
        next
    }

    /// Keep at most `n` ids. Valid only together with an offset.
    #[must_use]
    pub fn limit(&self, n: usize) -> Self {
        let mut next = self.fork();
        next.limit = Some(n);
        next
    }

    /// Skip the first `n` ids. Valid only together with a limit.
    #[must_use]
    pub fn offset(&self, n: usize) -> Self {
        let mut next = self.fork();
        next.offset = Some(n);
        next
    }

    /// Fork without adding constraints.
    #[must_use]
    pub fn all(&self) -> Self {
        self.fork()
    }

    //
    // Readers
    //

    /// Materialized ids, evaluating on first call and memoized for this
    /// instance afterwards.
    pub fn ids(&self) -> Result<&IdList, DbError> {
        if let Some(ids) = self.ids.get() {
            return Ok(ids);
        }

        let ids = self.evaluate()?;
        Ok(self.ids.get_or_init(|| ids))
    }

    pub fn len(&self) -> Result<usize, DbError> {
        Ok(self.ids()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, DbError> {
        Ok(self.ids()?.is_empty())
    }

    /// Alias of [`len`](Self::len).
    pub fn count(&self) -> Result<usize, DbError> {
        self.len()
    }

    /// Whether `id` is in the composed result.
    pub fn contains_id(&self, id: RecordId) -> Result<bool, DbError> {
        Ok(self.ids()?.contains(&id))
    }

    /// Hydrate the record at an ordinal position; negative counts from
    /// the end. `None` when the position is out of bounds.
    pub fn get(&self, index: i64) -> Result<Option<Record>, DbError> {
        let Some(id) = self.ids()?.get(index) else {
            return Ok(None);
        };

        self.db.load(&self.model, id)
    }

    /// Hydrate the records in `[from, to)`, clamped.
    pub fn slice(&self, from: i64, to: i64) -> Result<Vec<Record>, DbError> {
        let ids: Vec<RecordId> = self.ids()?.slice(from, to).to_vec();
        self.hydrate_ids(&ids)
    }

    /// Iterate hydrated records in result order.
    pub fn iter(&self) -> Result<Records<'_, B>, DbError> {
        let ids = self.ids()?;
        Ok(Records {
            query: self,
            ids: ids.iter(),
        })
    }

    /// Hydrate the whole result.
    pub fn records(&self) -> Result<Vec<Record>, DbError> {
        let ids: Vec<RecordId> = self.ids()?.0.clone();
        self.hydrate_ids(&ids)
    }

    /// The first record under `limit(1)` + `offset(0)`, or `None` when
    /// the result is empty.
    pub fn first(&self) -> Result<Option<Record>, DbError> {
        self.limit(1).offset(0).get(0)
    }

    /// Load by id, respecting active constraints: on a constrained query
    /// the id must be in the composed result; otherwise only liveness is
    /// required.
    pub fn get_by_id(&self, id: RecordId) -> Result<Option<Record>, DbError> {
        if self.is_constrained() && !self.ids()?.contains(&id) {
            return Ok(None);
        }

        self.db.load(&self.model, id)
    }

    /// Resolve a record through a unique field's lookup hash. Only valid
    /// on an unconstrained query; a constrained query answers `None`.
    pub fn get_by_unique(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Record>, DbError> {
        if self.is_constrained() {
            return Ok(None);
        }

        let Some(desc) = self.model.field(field) else {
            return Err(QueryError::UnknownField {
                model: self.model.name().to_string(),
                field: field.to_string(),
            }
            .into());
        };
        if !desc.is_unique() {
            return Err(QueryError::FieldNotUnique {
                model: self.model.name().to_string(),
                field: field.to_string(),
            }
            .into());
        }

        let value: Value = value.into();
        let Some(storage) = value.scalar_storage() else {
            return Err(QueryError::FilterNotScalar {
                field: field.to_string(),
            }
            .into());
        };

        let lookup = self.model.keys().unique_lookup(field);
        let Some(raw_id) = self.db.backend().hget(&lookup, &storage)? else {
            return Ok(None);
        };
        let id: RecordId = raw_id.parse().map_err(|_| {
            InternalError::query_corruption(format!(
                "non-numeric id '{raw_id}' in unique lookup '{lookup}'"
            ))
        })?;

        self.db.load(&self.model, id)
    }

    //
    // Writers
    //

    /// Build and save a record in one step.
    pub fn create(&self, values: BTreeMap<String, Value>) -> Result<Record, DbError> {
        let mut record = Record::new(&self.model, values)?;
        self.db.save(&mut record)?;

        Ok(record)
    }

    /// Find a record matching the indexed subset of `values`, creating
    /// one from the full mapping on miss.
    pub fn get_or_create(&self, values: BTreeMap<String, Value>) -> Result<Record, DbError> {
        let mut probe = self.fork();
        for (field, value) in &values {
            let indexed = self
                .model
                .field(field)
                .is_some_and(|f| f.is_indexed() && !f.kind().is_list());
            if indexed {
                probe.filters.insert(field.clone(), value.clone());
            }
        }

        if let Some(existing) = probe.first()? {
            return Ok(existing);
        }

        self.create(values)
    }

    //
    // Internals
    //

    fn hydrate_ids(&self, ids: &[RecordId]) -> Result<Vec<Record>, DbError> {
        let mut rows = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.db.hydrate(&self.model, id)? {
                Some(record) => rows.push(record),
                None => self.on_missing_row(id)?,
            }
        }

        Ok(rows)
    }

    fn on_missing_row(&self, id: RecordId) -> Result<(), DbError> {
        match self.db.config().read_consistency {
            ReadConsistency::MissingOk => Ok(()),
            ReadConsistency::Strict => Err(InternalError::record_corruption(format!(
                "indexed row missing during read: {}:{id}",
                self.model.name()
            ))
            .into()),
        }
    }
}

impl<B: KvBackend> Clone for QuerySet<B> {
    /// Cloning forks: constraints carry over, the memoized result and
    /// token do not.
    fn clone(&self) -> Self {
        self.fork()
    }
}

///
/// Records
/// Iterator hydrating a materialized result lazily, one row per step.
/// Missing rows are skipped or surfaced per the read consistency policy.
///

pub struct Records<'a, B: KvBackend> {
    query: &'a QuerySet<B>,
    ids: std::slice::Iter<'a, RecordId>,
}

impl<B: KvBackend> Iterator for Records<'_, B> {
    type Item = Result<Record, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = *self.ids.next()?;
            match self.query.db.hydrate(&self.query.model, id) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => match self.query.on_missing_row(id) {
                    Ok(()) => {}
                    Err(err) => return Some(Err(err)),
                },
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
