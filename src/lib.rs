//! crud-engine: configuration-driven CRUD operation pipelines over relational tables.
//!
//! Entities are declared in JSON ([`config::EntityConfig`]), resolved into descriptors and served by one
//! [`EntityPipeline`] each. Pipelines compose filter, scope and soft-delete predicates and run them
//! against a [`Store`]: [`PgStore`] for PostgreSQL, [`MemoryStore`] in process.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_from_path, resolve, resolve_with, FullConfig, ResolvedEntity, ResolvedModel, Settings};
pub use error::{AppError, ConfigError};
pub use query::{FilterExpression, ListParams, OrderBy, PaginatedResult, Predicate, ScopeFilters, SortDirection};
pub use routes::{common_routes, entity_routes};
pub use service::{
    BulkCreateResult, EntityHooks, EntityPipeline, FindOneParams, MutationResult, OperationContext,
    RuleSchemaAdapter, SchemaAdapter,
};
pub use state::{AppState, EntityRegistry};
pub use store::{MemoryStore, PgStore, Store};
