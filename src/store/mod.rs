//! Storage executors: the only place composed predicates meet persisted rows.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::query::{OrderBy, Predicate};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One record as a JSON object keyed by column name.
pub type Row = Map<String, Value>;

/// Read request: AND-joined predicates, ordering and optional window.
#[derive(Clone, Debug, Default)]
pub struct SelectQuery {
    pub filter: Vec<Predicate>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Executes one statement per call. Predicate slices are AND-joined; writes return the affected rows.
#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, entity: &ResolvedEntity, query: &SelectQuery) -> Result<Vec<Row>, AppError>;

    async fn count(&self, entity: &ResolvedEntity, filter: &[Predicate]) -> Result<u64, AppError>;

    /// Insert all rows as one batch.
    async fn insert(&self, entity: &ResolvedEntity, rows: &[Row]) -> Result<Vec<Row>, AppError>;

    async fn update(&self, entity: &ResolvedEntity, changes: &Row, filter: &[Predicate]) -> Result<Vec<Row>, AppError>;

    async fn delete(&self, entity: &ResolvedEntity, filter: &[Predicate]) -> Result<Vec<Row>, AppError>;

    /// Connectivity check used by readiness probes.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
