use crate::model::{ModelDescriptor, SchemaError};
use std::{collections::BTreeMap, sync::Arc};

///
/// ModelRegistry
///
/// Catalog of registered models. Populated once at startup, then frozen
/// inside the database handle; queries and writes resolve models here.
///

#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<ModelDescriptor>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built model. The returned handle is the shared
    /// descriptor every record and query for this type carries.
    pub fn register(
        &mut self,
        model: ModelDescriptor,
    ) -> Result<Arc<ModelDescriptor>, SchemaError> {
        let name = model.name().to_string();
        if self.models.contains_key(&name) {
            return Err(SchemaError::DuplicateModel { model: name });
        }

        let model = Arc::new(model);
        self.models.insert(name, Arc::clone(&model));

        Ok(model)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ModelDescriptor>> {
        self.models.get(name)
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<ModelDescriptor>> {
        self.models.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldKind;

    #[test]
    fn test_register_and_get() {
        let mut registry = ModelRegistry::new();
        let model = ModelDescriptor::builder("Article")
            .indexed("title", FieldKind::Text)
            .build()
            .expect("valid model");

        let handle = registry.register(model).expect("register");
        assert_eq!(handle.name(), "Article");
        assert_eq!(registry.len(), 1);

        let looked_up = registry.get("Article").expect("present");
        assert!(Arc::ptr_eq(looked_up, &handle));
        assert!(registry.get("Missing").is_none());
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let mut registry = ModelRegistry::new();
        let build = || {
            ModelDescriptor::builder("Article")
                .indexed("title", FieldKind::Text)
                .build()
                .expect("valid model")
        };

        registry.register(build()).expect("first");
        let err = registry.register(build()).expect_err("duplicate");
        assert_eq!(
            err,
            SchemaError::DuplicateModel {
                model: "Article".to_string(),
            }
        );
    }
}
