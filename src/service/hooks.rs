//! Hook strategy injected into a pipeline. Every method has a pass-through default.

use crate::error::AppError;
use crate::service::context::{Operation, OperationContext};
use async_trait::async_trait;
use serde_json::Value;

/// Input of the `validate` hook.
#[derive(Clone, Copy, Debug)]
pub struct ValidateArgs<'a> {
    pub data: &'a Value,
    pub context: &'a OperationContext,
    pub operation: Operation,
}

#[async_trait]
pub trait EntityHooks: Send + Sync {
    /// Runs before schema validation. `Ok(false)` skips schema validation; an error aborts the call.
    async fn validate(&self, _args: ValidateArgs<'_>) -> Result<bool, AppError> {
        Ok(true)
    }

    /// Output replaces the validated create payload entirely.
    async fn before_create(&self, data: Value) -> Result<Value, AppError> {
        Ok(data)
    }

    /// Output replaces the validated update payload; an empty object means nothing to change.
    async fn before_update(&self, data: Value) -> Result<Value, AppError> {
        Ok(data)
    }
}

/// No hooks: validation always runs, payloads pass through.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

#[async_trait]
impl EntityHooks for NoHooks {}
