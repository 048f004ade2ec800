//! Module: test_support
//! Shared fixtures for db-level tests: one model exercising every field
//! kind and index flavor, plus seeding helpers.

use crate::{
    config::DbConfig,
    db::Db,
    model::{ModelDescriptor, ModelRegistry},
    record::Record,
    store::MemoryBackend,
    types::RecordId,
    value::{FieldKind, Value},
};
use std::collections::BTreeMap;

/// A model touching every field kind: plain, indexed, unique, range
/// indexable, and a list.
pub(crate) fn article_model() -> ModelDescriptor {
    ModelDescriptor::builder("Article")
        .indexed("title", FieldKind::Text)
        .unique("slug", FieldKind::Text)
        .indexed("score", FieldKind::Int)
        .indexed("rating", FieldKind::Float)
        .indexed("published", FieldKind::Bool)
        .indexed("created_at", FieldKind::Timestamp)
        .indexed("views", FieldKind::Counter)
        .indexed("tags", FieldKind::List(Box::new(FieldKind::Text)))
        .field("body", FieldKind::Text)
        .build()
        .expect("article model is valid")
}

pub(crate) fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry
        .register(article_model())
        .expect("article registers");

    registry
}

pub(crate) fn open_db() -> Db<MemoryBackend> {
    Db::open(MemoryBackend::new(), registry())
}

pub(crate) fn open_db_with(config: DbConfig) -> Db<MemoryBackend> {
    Db::open_with(MemoryBackend::new(), registry(), config)
}

/// Save a minimal article (title + score) and return its id.
pub(crate) fn article(db: &Db<MemoryBackend>, title: &str, score: i64) -> RecordId {
    article_with(
        db,
        vec![("title", Value::from(title)), ("score", Value::from(score))],
    )
}

/// Save an article from arbitrary (field, value) pairs.
pub(crate) fn article_with(db: &Db<MemoryBackend>, values: Vec<(&str, Value)>) -> RecordId {
    let model = db.model("Article").expect("model registered");
    let values: BTreeMap<String, Value> = values
        .into_iter()
        .map(|(field, value)| (field.to_string(), value))
        .collect();
    let mut record = Record::new(&model, values).expect("values match the schema");

    db.save(&mut record).expect("save succeeds")
}
