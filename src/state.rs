//! Shared application state: one pipeline per entity over a default store.

use crate::config::ResolvedModel;
use crate::error::{AppError, ConfigError};
use crate::service::EntityPipeline;
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;

/// Pipelines keyed by entity name.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    pipelines: HashMap<String, Arc<EntityPipeline>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default pipelines (no hooks, rule validation, config scope rules) for every resolved entity.
    pub fn from_model(model: &ResolvedModel, store: Arc<dyn Store>) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for entity in &model.entities {
            registry.insert(EntityPipeline::builder(entity.clone(), store.clone()).build()?);
        }
        Ok(registry)
    }

    /// Register a pipeline, replacing any earlier one for the same entity.
    pub fn insert(&mut self, pipeline: EntityPipeline) {
        self.pipelines
            .insert(pipeline.entity().name.clone(), Arc::new(pipeline));
    }

    pub fn get(&self, name: &str) -> Option<Arc<EntityPipeline>> {
        self.pipelines.get(name).cloned()
    }

    /// Like `get`, failing with not-found for unknown entities.
    pub fn pipeline(&self, name: &str) -> Result<Arc<EntityPipeline>, AppError> {
        self.get(name)
            .ok_or_else(|| AppError::NotFound(format!("entity {}", name)))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pipelines.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<EntityRegistry>,
    /// Default store, also probed by the readiness route.
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(registry: EntityRegistry, store: Arc<dyn Store>) -> Self {
        AppState {
            registry: Arc::new(registry),
            store,
        }
    }
}
