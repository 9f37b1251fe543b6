//! Per-call operation context.

use crate::store::Store;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Pipeline verb, passed to the `validate` hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Create,
    FindOne,
    List,
    Update,
    DeleteOne,
    Restore,
    PermanentDelete,
    BulkCreate,
    BulkDelete,
    BulkRestore,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::FindOne => "findOne",
            Operation::List => "list",
            Operation::Update => "update",
            Operation::DeleteOne => "deleteOne",
            Operation::Restore => "restore",
            Operation::PermanentDelete => "permanentDelete",
            Operation::BulkCreate => "bulkCreate",
            Operation::BulkDelete => "bulkDelete",
            Operation::BulkRestore => "bulkRestore",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lives for one operation call; never persisted.
#[derive(Clone, Default)]
pub struct OperationContext {
    /// Replaces the pipeline's default store for this call.
    pub store: Option<Arc<dyn Store>>,
    pub actor: Option<Value>,
    pub scope: Option<Map<String, Value>>,
    pub skip_validation: bool,
}

impl fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContext")
            .field("store_override", &self.store.is_some())
            .field("actor", &self.actor)
            .field("scope", &self.scope)
            .field("skip_validation", &self.skip_validation)
            .finish()
    }
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_actor(mut self, actor: Value) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Set one scope value, e.g. `("tenantId", "A")`.
    pub fn with_scope(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.scope.get_or_insert_with(Map::new).insert(key.into(), value.into());
        self
    }

    pub fn skip_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }
}
