//! Module: db::query::eval
//! Responsibility: turn one query description into an ordered id list.
//! Two branches: a range predicate reads the range index exclusively;
//! everything else composes membership, intersection and difference
//! into scratch sets, then sorts with store. Every scratch key is put
//! on the TTL clock before the next step runs.

use crate::{
    db::{
        DbError,
        ephemeral::Scratch,
        query::{IdList, QueryError, QuerySet, RangeOp, RangePredicate},
    },
    error::InternalError,
    model::FieldDescriptor,
    obs::sink::{self, ExecKind, MetricsEvent, QueryPhase, Span},
    store::{KvBackend, ScoreRange, SortSpec, Window},
    types::RecordId,
    value::Value,
};

impl<B: KvBackend> QuerySet<B> {
    /// Run the composition pipeline once. Callers memoize the result;
    /// this method itself is stateless.
    pub(super) fn evaluate(&self) -> Result<IdList, DbError> {
        let mut span = Span::new(ExecKind::Query, self.model.name());

        let window = self.validate_window()?;
        self.validate_fields()?;

        let ids = match &self.range {
            Some(predicate) => self.evaluate_range(predicate, window)?,
            None => self.evaluate_set_algebra(window)?,
        };

        span.set_rows(ids.len() as u64);

        Ok(ids)
    }

    /// Limit and offset travel as a pair; one without the other is a
    /// composition fault.
    fn validate_window(&self) -> Result<Option<Window>, QueryError> {
        match (self.limit, self.offset) {
            (Some(count), Some(offset)) => Ok(Some(Window::new(offset, count))),
            (None, None) => Ok(None),
            _ => Err(QueryError::LimitOffsetMismatch),
        }
    }

    /// Every referenced field is checked before any store traffic, even
    /// ones the chosen branch will not consult. A query naming a bad
    /// field fails the same way no matter what else it carries.
    fn validate_fields(&self) -> Result<(), QueryError> {
        for field in self.filters.keys().chain(self.exclusions.keys()) {
            self.require_indexed(field)?;
        }
        if let Some(order) = &self.order {
            self.require_indexed(&order.field)?;
        }
        if let Some(predicate) = &self.range {
            let descriptor = self.require_indexed(&predicate.field)?;
            if !descriptor.is_range_indexable() {
                return Err(QueryError::RangeNotSupported {
                    model: self.model.name().to_string(),
                    field: predicate.field.clone(),
                });
            }
        }

        Ok(())
    }

    fn require_indexed(&self, field: &str) -> Result<&FieldDescriptor, QueryError> {
        let Some(descriptor) = self.model.field(field) else {
            return Err(QueryError::UnknownField {
                model: self.model.name().to_string(),
                field: field.to_string(),
            });
        };
        if !descriptor.is_indexed() {
            return Err(QueryError::AttributeNotIndexed {
                model: self.model.name().to_string(),
                field: field.to_string(),
            });
        }

        Ok(descriptor)
    }

    /// Range branch: read the range index directly. Already ordered
    /// ascending by score, so no scratch keys and no sort pass.
    fn evaluate_range(
        &self,
        predicate: &RangePredicate,
        window: Option<Window>,
    ) -> Result<IdList, DbError> {
        let op = RangeOp::parse(&predicate.op)?;
        let low = score_bound(&predicate.field, &predicate.low)?;

        let range = match op {
            RangeOp::Lt => ScoreRange::below(low),
            RangeOp::Lte => ScoreRange::at_most(low),
            RangeOp::Gt => ScoreRange::above(low),
            RangeOp::Gte => ScoreRange::at_least(low),
            RangeOp::Between => {
                let Some(high) = &predicate.high else {
                    return Err(QueryError::MissingRangeBound {
                        field: predicate.field.clone(),
                    }
                    .into());
                };
                ScoreRange::between(low, score_bound(&predicate.field, high)?)
            }
        };

        let key = self.model.keys().range_index(&predicate.field);
        let members = self.db.backend().zrange_by_score(&key, range, window)?;
        sink::record(MetricsEvent::Phase {
            kind: QueryPhase::Range,
            model: self.model.name(),
            output_size: members.len() as u64,
        });

        self.parse_ids(members)
    }

    /// Set-algebra branch: membership, then intersect filters, then
    /// subtract exclusions, then a store-side sort that also applies
    /// the window. The sort runs even without an ordering key so the
    /// result has a stable id order.
    fn evaluate_set_algebra(&self, window: Option<Window>) -> Result<IdList, DbError> {
        let backend = self.db.backend();
        let keys = self.model.keys();
        let scratch = Scratch::new(
            backend,
            keys,
            self.model.name(),
            self.db.config().ephemeral_ttl_secs,
            self.token,
        );

        let mut current = keys.membership();

        if !self.filters.is_empty() {
            let mut inputs = vec![current.clone()];
            for (field, value) in &self.filters {
                inputs.push(self.constraint_key(field, value)?);
            }
            let dest = scratch.intersection_key(&inputs);
            let output = backend.sinterstore(&dest, &inputs)?;
            scratch.arm(&dest)?;
            sink::record(MetricsEvent::Phase {
                kind: QueryPhase::Intersect,
                model: self.model.name(),
                output_size: output as u64,
            });
            current = dest;
        }

        if !self.exclusions.is_empty() {
            let mut inputs = vec![current.clone()];
            for (field, value) in &self.exclusions {
                inputs.push(self.constraint_key(field, value)?);
            }
            let dest = scratch.difference_key(&inputs);
            let output = backend.sdiffstore(&dest, &inputs)?;
            scratch.arm(&dest)?;
            sink::record(MetricsEvent::Phase {
                kind: QueryPhase::Subtract,
                model: self.model.name(),
                output_size: output as u64,
            });
            current = dest;
        }

        let spec = match &self.order {
            None => SortSpec {
                window,
                ..SortSpec::default()
            },
            Some(order) => {
                // validate_fields already proved the field exists
                let alpha = self
                    .model
                    .field(&order.field)
                    .is_none_or(|f| !f.kind().supports_range());
                SortSpec {
                    by: Some(keys.sort_weight(&order.field)),
                    alpha,
                    desc: order.desc,
                    window,
                }
            }
        };

        let dest = scratch.sort_key(&current);
        let output = backend.sort_store(&current, &dest, &spec)?;
        scratch.arm(&dest)?;
        sink::record(MetricsEvent::Phase {
            kind: QueryPhase::Sort,
            model: self.model.name(),
            output_size: output as u64,
        });

        let members = backend.lrange(&dest, 0, -1)?;

        self.parse_ids(members)
    }

    /// Map one equality constraint to its index key. List fields match
    /// by element through the element index; everything else matches the
    /// whole encoded value.
    fn constraint_key(&self, field: &str, value: &Value) -> Result<String, DbError> {
        let Some(storage) = value.scalar_storage() else {
            return Err(QueryError::FilterNotScalar {
                field: field.to_string(),
            }
            .into());
        };

        let is_list = self.model.field(field).is_some_and(|f| f.kind().is_list());
        let keys = self.model.keys();
        let key = if is_list {
            keys.element_index(field, &storage)
        } else {
            keys.attribute_index(field, &storage)
        };

        Ok(key)
    }

    fn parse_ids(&self, members: Vec<String>) -> Result<IdList, DbError> {
        let mut ids = Vec::with_capacity(members.len());
        for member in members {
            let id: RecordId = member.parse().map_err(|_| {
                InternalError::query_corruption(format!(
                    "non-numeric id '{member}' in result set for model '{}'",
                    self.model.name()
                ))
            })?;
            ids.push(id);
        }

        Ok(IdList::new(ids))
    }
}

fn score_bound(field: &str, value: &Value) -> Result<f64, QueryError> {
    value.score().ok_or_else(|| QueryError::BadRangeBound {
        field: field.to_string(),
    })
}
