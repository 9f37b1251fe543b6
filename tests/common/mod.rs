//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use crud_engine::config::{resolve, FullConfig, ResolvedEntity};
use crud_engine::query::Predicate;
use crud_engine::store::{Row, SelectQuery};
use crud_engine::{AppError, MemoryStore, Store};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// `users` entity: bigint ids, tenant column, `role` as the only filterable field.
pub fn users_config(extra: Value) -> Value {
    let mut cfg = json!({
        "name": "users",
        "table": "users",
        "idType": "bigint",
        "columns": [
            { "name": "id", "type": "bigint", "nullable": false },
            { "name": "tenant_id", "type": "text" },
            { "name": "name", "type": "text" },
            { "name": "email", "type": "text" },
            { "name": "role", "type": "text", "nullable": false, "default": "user" },
            { "name": "age", "type": "integer" },
            { "name": "created_at", "type": "timestamptz" },
            { "name": "updated_at", "type": "timestamptz" },
            { "name": "deletedAt", "type": "timestamptz" }
        ],
        "allowedFilters": ["role", "age", "name"],
        "searchFields": ["name", "email"]
    });
    if let (Some(obj), Value::Object(extra)) = (cfg.as_object_mut(), extra) {
        obj.extend(extra);
    }
    cfg
}

pub fn entity(config: Value) -> ResolvedEntity {
    let full = FullConfig {
        entities: vec![serde_json::from_value(config).expect("entity config")],
    };
    let model = resolve(&full).expect("resolve");
    model.entities[0].clone()
}

pub fn users(extra: Value) -> ResolvedEntity {
    entity(users_config(extra))
}

/// Memory store that counts every call it receives.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub calls: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for CountingStore {
    async fn select(&self, entity: &ResolvedEntity, query: &SelectQuery) -> Result<Vec<Row>, AppError> {
        self.hit();
        self.inner.select(entity, query).await
    }

    async fn count(&self, entity: &ResolvedEntity, filter: &[Predicate]) -> Result<u64, AppError> {
        self.hit();
        self.inner.count(entity, filter).await
    }

    async fn insert(&self, entity: &ResolvedEntity, rows: &[Row]) -> Result<Vec<Row>, AppError> {
        self.hit();
        self.inner.insert(entity, rows).await
    }

    async fn update(&self, entity: &ResolvedEntity, changes: &Row, filter: &[Predicate]) -> Result<Vec<Row>, AppError> {
        self.hit();
        self.inner.update(entity, changes, filter).await
    }

    async fn delete(&self, entity: &ResolvedEntity, filter: &[Predicate]) -> Result<Vec<Row>, AppError> {
        self.hit();
        self.inner.delete(entity, filter).await
    }
}
