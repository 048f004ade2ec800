use crate::{
    model::ModelDescriptor,
    types::RecordId,
    value::{FieldKind, Value},
};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error as ThisError;

///
/// RecordError
///

#[remain::sorted]
#[derive(Debug, ThisError, Eq, PartialEq)]
pub enum RecordError {
    #[error("field '{field}' expects {expected}, got {found}")]
    KindMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },

    #[error("unknown field '{field}' on model '{model}'")]
    UnknownField { model: String, field: String },
}

///
/// Record
///
/// A row of one model: an optional store-allocated id plus a plain
/// field-value mapping. The mapping is kind-checked against the frozen
/// schema on every write, so index encoding never sees a mismatched
/// value. Fields may be absent; absent fields are simply not stored
/// and not indexed.
///

#[derive(Clone, Debug)]
pub struct Record {
    model: Arc<ModelDescriptor>,
    id: Option<RecordId>,
    values: BTreeMap<String, Value>,
}

impl Record {
    /// Build an unsaved record from a value mapping.
    pub fn new(
        model: &Arc<ModelDescriptor>,
        values: BTreeMap<String, Value>,
    ) -> Result<Self, RecordError> {
        let mut record = Self {
            model: Arc::clone(model),
            id: None,
            values: BTreeMap::new(),
        };
        for (field, value) in values {
            record.set(&field, value)?;
        }

        Ok(record)
    }

    /// Rebuild a record from already-decoded storage values.
    pub(crate) fn hydrated(
        model: &Arc<ModelDescriptor>,
        id: RecordId,
        values: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            model: Arc::clone(model),
            id: Some(id),
            values,
        }
    }

    #[must_use]
    pub fn model(&self) -> &Arc<ModelDescriptor> {
        &self.model
    }

    #[must_use]
    pub const fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub(crate) const fn assign_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    #[must_use]
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    #[must_use]
    pub const fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Set a field, kind-checked against the schema.
    pub fn set(&mut self, field: &str, value: Value) -> Result<(), RecordError> {
        let Some(desc) = self.model.field(field) else {
            return Err(RecordError::UnknownField {
                model: self.model.name().to_string(),
                field: field.to_string(),
            });
        };
        if !value.matches(desc.kind()) {
            return Err(RecordError::KindMismatch {
                field: field.to_string(),
                expected: desc.kind().to_string(),
                found: value.kind_label(),
            });
        }

        self.values.insert(field.to_string(), value);
        Ok(())
    }

    /// Clear a field; it will be dropped from storage and indices on the
    /// next save.
    pub fn clear(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    /// Scalar fields as (name, storage string) pairs, in field order.
    pub(crate) fn storage_row(&self) -> Vec<(String, String)> {
        let mut row = Vec::new();
        for (field, value) in &self.values {
            if let Some(storage) = value.scalar_storage() {
                row.push((field.clone(), storage));
            }
        }

        row
    }

    /// List fields as (name, element storage strings) pairs, keeping
    /// element order and duplicates.
    pub(crate) fn list_rows(&self) -> Vec<(String, Vec<String>)> {
        let mut rows = Vec::new();
        for (field, value) in &self.values {
            if let Value::List(items) = value {
                let elems = items.iter().filter_map(Value::scalar_storage).collect();
                rows.push((field.clone(), elems));
            }
        }

        rows
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Arc<ModelDescriptor> {
        Arc::new(
            ModelDescriptor::builder("Article")
                .indexed("title", FieldKind::Text)
                .indexed("score", FieldKind::Int)
                .indexed("tags", FieldKind::List(Box::new(FieldKind::Text)))
                .field("body", FieldKind::Text)
                .build()
                .expect("valid model"),
        )
    }

    #[test]
    fn test_new_checks_kinds() {
        let model = model();
        let mut values = BTreeMap::new();
        values.insert("title".to_string(), Value::from("intro"));
        values.insert("score".to_string(), Value::Int(3));

        let record = Record::new(&model, values).expect("valid record");
        assert_eq!(record.id(), None);
        assert_eq!(record.value("title"), Some(&Value::from("intro")));
    }

    #[test]
    fn test_new_rejects_unknown_field() {
        let model = model();
        let mut values = BTreeMap::new();
        values.insert("missing".to_string(), Value::Int(1));

        let err = Record::new(&model, values).expect_err("unknown field");
        assert_eq!(
            err,
            RecordError::UnknownField {
                model: "Article".to_string(),
                field: "missing".to_string(),
            }
        );
    }

    #[test]
    fn test_set_rejects_kind_mismatch() {
        let model = model();
        let mut record = Record::new(&model, BTreeMap::new()).expect("empty record");

        let err = record.set("score", Value::from("ten")).expect_err("mismatch");
        assert_eq!(
            err,
            RecordError::KindMismatch {
                field: "score".to_string(),
                expected: "int".to_string(),
                found: "text",
            }
        );
    }

    #[test]
    fn test_list_kind_checked_element_wise() {
        let model = model();
        let mut record = Record::new(&model, BTreeMap::new()).expect("empty record");

        record
            .set("tags", Value::List(vec![Value::from("a"), Value::from("b")]))
            .expect("valid list");
        let err = record
            .set("tags", Value::List(vec![Value::Int(1)]))
            .expect_err("wrong element kind");
        assert!(matches!(err, RecordError::KindMismatch { .. }));
    }

    #[test]
    fn test_storage_rows_split_scalars_and_lists() {
        let model = model();
        let mut record = Record::new(&model, BTreeMap::new()).expect("empty record");
        record.set("title", Value::from("intro")).expect("set title");
        record.set("score", Value::Int(3)).expect("set score");
        record
            .set(
                "tags",
                Value::List(vec![Value::from("rust"), Value::from("db")]),
            )
            .expect("set tags");

        let row = record.storage_row();
        assert_eq!(
            row,
            vec![
                ("score".to_string(), "3".to_string()),
                ("title".to_string(), "intro".to_string()),
            ]
        );

        let lists = record.list_rows();
        assert_eq!(
            lists,
            vec![(
                "tags".to_string(),
                vec!["rust".to_string(), "db".to_string()]
            )]
        );
    }

    #[test]
    fn test_clear_removes_value() {
        let model = model();
        let mut record = Record::new(&model, BTreeMap::new()).expect("empty record");
        record.set("title", Value::from("x")).expect("set");

        assert_eq!(record.clear("title"), Some(Value::from("x")));
        assert_eq!(record.value("title"), None);
        assert_eq!(record.clear("title"), None);
    }
}
