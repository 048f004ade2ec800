pub mod registry;

pub use registry::ModelRegistry;

use crate::{
    key::{KeySpace, is_clean_segment},
    value::FieldKind,
};
use thiserror::Error as ThisError;

///
/// SchemaError
/// Registration-time schema validation failures.
///

#[remain::sorted]
#[derive(Debug, ThisError, Eq, PartialEq)]
pub enum SchemaError {
    #[error("duplicate field '{field}' on model '{model}'")]
    DuplicateField { model: String, field: String },

    #[error("duplicate model '{model}'")]
    DuplicateModel { model: String },

    #[error("invalid field name '{field}' on model '{model}'")]
    InvalidFieldName { model: String, field: String },

    #[error("invalid model name '{model}'")]
    InvalidModelName { model: String },

    #[error("nested list field '{field}' on model '{model}' is not supported")]
    NestedList { model: String, field: String },

    #[error("unique field '{field}' on model '{model}' must be a scalar kind")]
    UniqueNotScalar { model: String, field: String },
}

///
/// FieldDescriptor
///
/// One declared attribute: name, kind, and index capabilities. Range
/// support is derived once at build time, never re-decided per query.
///

#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind,
    indexed: bool,
    unique: bool,
    range_indexable: bool,
}

impl FieldDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> &FieldKind {
        &self.kind
    }

    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        self.indexed
    }

    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// Whether this field maintains a range index. True only for indexed
    /// fields whose kind projects onto a numeric score.
    #[must_use]
    pub const fn is_range_indexable(&self) -> bool {
        self.range_indexable
    }
}

///
/// ModelDescriptor
///
/// Frozen runtime schema for one record type: an ordered field list plus
/// the derived key namespace. Built once via [`ModelDescriptor::builder`]
/// and registered in a [`ModelRegistry`].
///

#[derive(Clone, Debug)]
pub struct ModelDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
    keys: KeySpace,
}

impl ModelDescriptor {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn indexed_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.indexed)
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.unique)
    }

    pub fn list_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.kind.is_list())
    }

    #[must_use]
    pub const fn keys(&self) -> &KeySpace {
        &self.keys
    }
}

///
/// ModelBuilder
/// Accumulates field declarations; all validation happens in [`build`].
///

#[derive(Debug)]
pub struct ModelBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl ModelBuilder {
    /// Declare a stored, non-indexed field.
    #[must_use]
    pub fn field(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.push(name.into(), kind, false, false)
    }

    /// Declare an indexed field. Range-capable kinds additionally get a
    /// range index.
    #[must_use]
    pub fn indexed(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.push(name.into(), kind, true, false)
    }

    /// Declare a unique field. Unique implies indexed; a unique lookup
    /// table is maintained for it. Uniqueness is not enforced on save.
    #[must_use]
    pub fn unique(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.push(name.into(), kind, true, true)
    }

    fn push(mut self, name: String, kind: FieldKind, indexed: bool, unique: bool) -> Self {
        let range_indexable = indexed && kind.supports_range();
        self.fields.push(FieldDescriptor {
            name,
            kind,
            indexed,
            unique,
            range_indexable,
        });

        self
    }

    pub fn build(self) -> Result<ModelDescriptor, SchemaError> {
        if !is_clean_segment(&self.name) {
            return Err(SchemaError::InvalidModelName { model: self.name });
        }

        for (i, field) in self.fields.iter().enumerate() {
            if !is_clean_segment(&field.name) {
                return Err(SchemaError::InvalidFieldName {
                    model: self.name,
                    field: field.name.clone(),
                });
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateField {
                    model: self.name,
                    field: field.name.clone(),
                });
            }
            if let FieldKind::List(elem) = &field.kind
                && elem.is_list()
            {
                return Err(SchemaError::NestedList {
                    model: self.name,
                    field: field.name.clone(),
                });
            }
            if field.unique && field.kind.is_list() {
                return Err(SchemaError::UniqueNotScalar {
                    model: self.name,
                    field: field.name.clone(),
                });
            }
        }

        let keys = KeySpace::new(self.name.clone());

        Ok(ModelDescriptor {
            name: self.name,
            fields: self.fields,
            keys,
        })
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> ModelDescriptor {
        ModelDescriptor::builder("Article")
            .indexed("title", FieldKind::Text)
            .indexed("score", FieldKind::Int)
            .unique("slug", FieldKind::Text)
            .indexed("tags", FieldKind::List(Box::new(FieldKind::Text)))
            .field("body", FieldKind::Text)
            .build()
            .expect("valid model")
    }

    #[test]
    fn test_field_capabilities() {
        let model = article();

        let title = model.field("title").expect("title");
        assert!(title.is_indexed());
        assert!(!title.is_unique());
        assert!(!title.is_range_indexable());

        let score = model.field("score").expect("score");
        assert!(score.is_indexed());
        assert!(score.is_range_indexable());

        let slug = model.field("slug").expect("slug");
        assert!(slug.is_indexed());
        assert!(slug.is_unique());

        let body = model.field("body").expect("body");
        assert!(!body.is_indexed());
        assert!(!body.is_range_indexable());

        assert!(model.field("missing").is_none());
    }

    #[test]
    fn test_range_capability_requires_index() {
        let model = ModelDescriptor::builder("M")
            .field("hidden", FieldKind::Int)
            .build()
            .expect("valid model");

        // Range-capable kind, but not indexed, so no range index either.
        assert!(!model.field("hidden").expect("hidden").is_range_indexable());
    }

    #[test]
    fn test_field_order_is_declaration_order() {
        let model = article();
        let names: Vec<_> = model.fields().iter().map(FieldDescriptor::name).collect();
        assert_eq!(names, vec!["title", "score", "slug", "tags", "body"]);
    }

    #[test]
    fn test_build_rejects_duplicate_field() {
        let err = ModelDescriptor::builder("M")
            .indexed("x", FieldKind::Int)
            .field("x", FieldKind::Text)
            .build()
            .expect_err("duplicate");

        assert_eq!(
            err,
            SchemaError::DuplicateField {
                model: "M".to_string(),
                field: "x".to_string(),
            }
        );
    }

    #[test]
    fn test_build_rejects_reserved_names() {
        assert!(matches!(
            ModelDescriptor::builder("A:B").build(),
            Err(SchemaError::InvalidModelName { .. })
        ));
        assert!(matches!(
            ModelDescriptor::builder("M")
                .field("#idx", FieldKind::Int)
                .build(),
            Err(SchemaError::InvalidFieldName { .. })
        ));
        assert!(matches!(
            ModelDescriptor::builder("M")
                .field("a*b", FieldKind::Int)
                .build(),
            Err(SchemaError::InvalidFieldName { .. })
        ));
    }

    #[test]
    fn test_build_rejects_nested_list() {
        let nested = FieldKind::List(Box::new(FieldKind::List(Box::new(FieldKind::Int))));
        assert!(matches!(
            ModelDescriptor::builder("M").field("deep", nested).build(),
            Err(SchemaError::NestedList { .. })
        ));
    }

    #[test]
    fn test_build_rejects_unique_list() {
        let tags = FieldKind::List(Box::new(FieldKind::Text));
        assert!(matches!(
            ModelDescriptor::builder("M").unique("tags", tags).build(),
            Err(SchemaError::UniqueNotScalar { .. })
        ));
    }
}
