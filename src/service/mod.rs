//! Per-entity operation pipelines and their injected collaborators.

pub mod context;
pub mod hooks;
pub mod pipeline;
pub mod validation;

pub use context::{Operation, OperationContext};
pub use hooks::{EntityHooks, NoHooks, ValidateArgs};
pub use pipeline::{BulkCreateResult, EntityPipeline, FindOneParams, MutationResult, PipelineBuilder};
pub use validation::{parse_id, RuleSchemaAdapter, SchemaAdapter, Validator};
