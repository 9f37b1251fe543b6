//! Operation pipeline: validation, hook transform, predicate composition and one store call per operation.

use crate::config::{DeletedValueConfig, ResolvedEntity};
use crate::error::{AppError, ConfigError};
use crate::query::{
    apply_visibility, compile, paginate, CompareOp, ListParams, OrderBy, PaginatedResult, Predicate, ScopeFilters,
    ScopeFn, SoftDelete,
};
use crate::service::context::{Operation, OperationContext};
use crate::service::hooks::{EntityHooks, NoHooks, ValidateArgs};
use crate::service::validation::{RuleSchemaAdapter, SchemaAdapter, Validator};
use crate::store::{Row, SelectQuery, Store};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// `{success, count}` envelope of delete/restore operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResult {
    pub success: bool,
    pub count: u64,
}

impl MutationResult {
    fn affected(count: usize) -> Self {
        MutationResult {
            success: true,
            count: count as u64,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulkCreateResult {
    pub success: bool,
    pub count: u64,
    pub items: Vec<Row>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOneParams {
    #[serde(default)]
    pub include_deleted: bool,
}

pub struct PipelineBuilder {
    entity: ResolvedEntity,
    store: Arc<dyn Store>,
    hooks: Arc<dyn EntityHooks>,
    adapter: Arc<dyn SchemaAdapter>,
    scope: ScopeFilters,
}

impl PipelineBuilder {
    pub fn hooks(mut self, hooks: Arc<dyn EntityHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn schema_adapter(mut self, adapter: Arc<dyn SchemaAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Add (or replace) the scope function for `key`. Config-declared rules are registered first.
    pub fn scope(mut self, key: impl Into<String>, f: ScopeFn) -> Self {
        self.scope.insert(key, f);
        self
    }

    pub fn build(self) -> Result<EntityPipeline, ConfigError> {
        check_entity(&self.entity)?;
        let entity = Arc::new(self.entity);
        Ok(EntityPipeline {
            insert_schema: self.adapter.insert_schema(&entity),
            update_schema: self.adapter.update_schema(&entity),
            list_schema: self.adapter.list_schema(&entity),
            id_schema: self.adapter.id_schema(&entity),
            filter_schema: self.adapter.filter_schema(&entity),
            entity,
            store: self.store,
            hooks: self.hooks,
            scope: self.scope,
        })
    }
}

/// Entities built by hand skip the config validator, so the pieces the pipeline relies on are checked here.
fn check_entity(entity: &ResolvedEntity) -> Result<(), ConfigError> {
    if entity.table_name.trim().is_empty() {
        return Err(ConfigError::MissingReference {
            kind: "table",
            id: entity.name.clone(),
        });
    }
    if !entity.has_column(&entity.id_field) {
        return Err(ConfigError::InvalidIdField {
            entity: entity.name.clone(),
            column: entity.id_field.clone(),
        });
    }
    if let Some(sd) = &entity.soft_delete {
        let reason = if sd.field.is_empty() {
            Some("field is required".to_string())
        } else if !entity.has_column(&sd.field) {
            Some(format!("field {} is not a column", sd.field))
        } else if sd.deleted_value == DeletedValueConfig::Literal(Value::Null) {
            Some("deletedValue must not be null".to_string())
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(ConfigError::SoftDelete {
                entity: entity.name.clone(),
                reason,
            });
        }
    }
    Ok(())
}

/// One entity's operation set. Holds no per-call state; safe to share across tasks.
pub struct EntityPipeline {
    entity: Arc<ResolvedEntity>,
    store: Arc<dyn Store>,
    hooks: Arc<dyn EntityHooks>,
    scope: ScopeFilters,
    insert_schema: Box<dyn Validator>,
    update_schema: Box<dyn Validator>,
    list_schema: Box<dyn Validator>,
    id_schema: Box<dyn Validator>,
    filter_schema: Box<dyn Validator>,
}

impl fmt::Debug for EntityPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityPipeline")
            .field("entity", &self.entity.name)
            .field("scope", &self.scope)
            .finish()
    }
}

impl EntityPipeline {
    /// Pipeline with no hooks, the rule-based schema adapter and scope functions from the entity's scope rules.
    pub fn builder(entity: ResolvedEntity, store: Arc<dyn Store>) -> PipelineBuilder {
        let scope = ScopeFilters::from_rules(&entity.scope_rules);
        PipelineBuilder {
            entity,
            store,
            hooks: Arc::new(NoHooks),
            adapter: Arc::new(RuleSchemaAdapter),
            scope,
        }
    }

    pub fn entity(&self) -> &ResolvedEntity {
        &self.entity
    }

    fn store<'a>(&'a self, ctx: &'a OperationContext) -> &'a dyn Store {
        ctx.store.as_deref().unwrap_or(self.store.as_ref())
    }

    /// False when the caller bypasses validation or the `validate` hook declines it.
    async fn should_validate(&self, data: &Value, ctx: &OperationContext, operation: Operation) -> Result<bool, AppError> {
        if ctx.skip_validation {
            tracing::debug!("validation skipped by context");
            return Ok(false);
        }
        let run = self
            .hooks
            .validate(ValidateArgs {
                data,
                context: ctx,
                operation,
            })
            .await?;
        if !run {
            tracing::debug!("schema validation skipped by hook");
        }
        Ok(run)
    }

    /// Identifying predicates plus scope restrictions, plus the not-deleted predicate when `visible_only`.
    fn compose(&self, mut predicates: Vec<Predicate>, ctx: &OperationContext, visible_only: bool) -> Vec<Predicate> {
        self.scope.apply(&mut predicates, ctx.scope.as_ref(), ctx.actor.as_ref());
        apply_visibility(&mut predicates, self.entity.soft_delete.as_ref(), !visible_only);
        predicates
    }

    fn id_equals(&self, id: Value) -> Predicate {
        Predicate::eq(self.entity.id_field.as_str(), id)
    }

    fn not_found(&self, id: &Value) -> AppError {
        AppError::NotFound(format!("{} {}", self.entity.name, id))
    }

    fn soft_delete(&self) -> Result<&SoftDelete, AppError> {
        self.entity
            .soft_delete
            .as_ref()
            .ok_or_else(|| AppError::Usage(format!("{} has no soft delete configured", self.entity.name)))
    }

    fn stamp_created(&self, row: &mut Row) {
        let ts = &self.entity.timestamps;
        for col in [ts.created_at.as_ref(), ts.updated_at.as_ref()].into_iter().flatten() {
            if row.get(col).map_or(true, Value::is_null) {
                row.insert(col.clone(), now());
            }
        }
    }

    fn stamp_updated(&self, row: &mut Row) {
        if let Some(col) = &self.entity.timestamps.updated_at {
            row.insert(col.clone(), now());
        }
    }

    /// Soft delete writes the deleted marker; otherwise rows are removed.
    async fn remove(&self, store: &dyn Store, predicates: &[Predicate]) -> Result<usize, AppError> {
        match &self.entity.soft_delete {
            Some(sd) => {
                let mut changes = Row::new();
                changes.insert(sd.field.clone(), sd.deleted_marker());
                self.stamp_updated(&mut changes);
                Ok(store.update(&self.entity, &changes, predicates).await?.len())
            }
            None => Ok(store.delete(&self.entity, predicates).await?.len()),
        }
    }

    async fn restore_where(&self, store: &dyn Store, sd: &SoftDelete, predicates: &[Predicate]) -> Result<usize, AppError> {
        let mut changes = Row::new();
        changes.insert(sd.field.clone(), sd.not_deleted_value.clone());
        self.stamp_updated(&mut changes);
        Ok(store.update(&self.entity, &changes, predicates).await?.len())
    }

    async fn parse_ids(&self, ids: Vec<Value>, ctx: &OperationContext, operation: Operation) -> Result<Vec<Value>, AppError> {
        let data = Value::Array(ids);
        let validate = self.should_validate(&data, ctx, operation).await?;
        let Value::Array(ids) = data else {
            return Ok(Vec::new());
        };
        if !validate {
            return Ok(ids);
        }
        ids.into_iter()
            .enumerate()
            .map(|(i, id)| self.id_schema.parse(id).map_err(|e| at_index(i, e)))
            .collect()
    }

    async fn parse_id(&self, id: Value, ctx: &OperationContext, operation: Operation) -> Result<Value, AppError> {
        if self.should_validate(&id, ctx, operation).await? {
            self.id_schema.parse(id)
        } else {
            Ok(id)
        }
    }

    #[tracing::instrument(skip_all, fields(entity = %self.entity.name, operation = "create"))]
    pub async fn create(&self, data: Value, ctx: &OperationContext) -> Result<Row, AppError> {
        let data = if self.should_validate(&data, ctx, Operation::Create).await? {
            self.insert_schema.parse(data)?
        } else {
            data
        };
        let data = self.hooks.before_create(data).await?;
        let mut row = into_row(data)?;
        self.stamp_created(&mut row);
        let mut inserted = self.store(ctx).insert(&self.entity, &[row]).await?;
        inserted.pop().ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    /// First row matching every non-null condition; `None` when nothing is visible.
    #[tracing::instrument(skip_all, fields(entity = %self.entity.name, operation = "findOne"))]
    pub async fn find_one(
        &self,
        conditions: Value,
        params: FindOneParams,
        ctx: &OperationContext,
    ) -> Result<Option<Row>, AppError> {
        let conditions = if self.should_validate(&conditions, ctx, Operation::FindOne).await? {
            self.filter_schema.parse(conditions)?
        } else {
            conditions
        };
        let predicates: Vec<Predicate> = into_row(conditions)?
            .into_iter()
            .filter(|(k, v)| !v.is_null() && self.entity.has_column(k))
            .map(|(k, v)| Predicate::eq(k, v))
            .collect();
        if predicates.is_empty() {
            return Err(AppError::Usage(format!(
                "findOne on {} requires at least one condition",
                self.entity.name
            )));
        }
        let query = SelectQuery {
            filter: self.compose(predicates, ctx, !params.include_deleted),
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.store(ctx).select(&self.entity, &query).await?.into_iter().next())
    }

    #[tracing::instrument(skip_all, fields(entity = %self.entity.name, operation = "list"))]
    pub async fn list(&self, params: ListParams, ctx: &OperationContext) -> Result<PaginatedResult<Row>, AppError> {
        let raw = serde_json::to_value(&params).map_err(|e| AppError::validation("params", e.to_string()))?;
        let params = if self.should_validate(&raw, ctx, Operation::List).await? {
            let parsed = self.list_schema.parse(raw)?;
            serde_json::from_value(parsed).map_err(|e| AppError::validation("params", e.to_string()))?
        } else {
            params
        };

        let mut predicates = params
            .filters
            .as_ref()
            .map(|f| compile(f, &self.entity.allowed_filters))
            .unwrap_or_default();
        if let Some(p) = self.search(params.search.as_deref()) {
            predicates.push(p);
        }
        let predicates = self.compose(predicates, ctx, !params.include_deleted);

        let bounds = paginate(
            params.page,
            params.per_page,
            self.entity.default_page_size,
            self.entity.max_page_size,
        );
        let mut order_by: Vec<OrderBy> = params
            .order_by
            .into_iter()
            .filter(|o| self.entity.has_column(&o.field))
            .collect();
        if order_by.is_empty() {
            order_by.push(OrderBy::asc(self.entity.id_field.as_str()));
        }

        let store = self.store(ctx);
        let query = SelectQuery {
            filter: predicates,
            order_by,
            limit: Some(bounds.per_page),
            offset: Some(bounds.offset),
        };
        let results = store.select(&self.entity, &query).await?;
        let total = store.count(&self.entity, &query.filter).await?;
        Ok(PaginatedResult::new(results, bounds, total))
    }

    /// `ILIKE %term%` over the search fields, OR-joined.
    fn search(&self, term: Option<&str>) -> Option<Predicate> {
        let term = term.map(str::trim).filter(|t| !t.is_empty())?;
        if self.entity.search_fields.is_empty() {
            return None;
        }
        let pattern = Value::String(format!("%{}%", term));
        Some(Predicate::any(
            self.entity
                .search_fields
                .iter()
                .map(|f| Predicate::compare(f.as_str(), CompareOp::ILike, pattern.clone()))
                .collect(),
        ))
    }

    #[tracing::instrument(skip_all, fields(entity = %self.entity.name, operation = "update"))]
    pub async fn update(&self, id: Value, data: Value, ctx: &OperationContext) -> Result<Row, AppError> {
        let (id, data) = if self.should_validate(&data, ctx, Operation::Update).await? {
            (self.id_schema.parse(id)?, self.update_schema.parse(data)?)
        } else {
            (id, data)
        };
        let data = self.hooks.before_update(data).await?;
        let mut changes: Row = into_row(data)?
            .into_iter()
            .filter(|(k, _)| *k != self.entity.id_field && self.entity.has_column(k))
            .collect();

        let store = self.store(ctx);
        let predicates = self.compose(vec![self.id_equals(id.clone())], ctx, true);
        if changes.is_empty() {
            tracing::debug!("empty update payload, reading current row");
            let query = SelectQuery {
                filter: predicates,
                limit: Some(1),
                ..Default::default()
            };
            return store
                .select(&self.entity, &query)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| self.not_found(&id));
        }
        self.stamp_updated(&mut changes);
        store
            .update(&self.entity, &changes, &predicates)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found(&id))
    }

    /// Soft delete when configured, physical delete otherwise. Already-deleted rows are re-marked.
    #[tracing::instrument(skip_all, fields(entity = %self.entity.name, operation = "deleteOne"))]
    pub async fn delete_one(&self, id: Value, ctx: &OperationContext) -> Result<MutationResult, AppError> {
        let id = self.parse_id(id, ctx, Operation::DeleteOne).await?;
        let predicates = self.compose(vec![self.id_equals(id)], ctx, false);
        let count = self.remove(self.store(ctx), &predicates).await?;
        Ok(MutationResult::affected(count))
    }

    #[tracing::instrument(skip_all, fields(entity = %self.entity.name, operation = "restore"))]
    pub async fn restore(&self, id: Value, ctx: &OperationContext) -> Result<MutationResult, AppError> {
        let sd = self.soft_delete()?;
        let id = self.parse_id(id, ctx, Operation::Restore).await?;
        let predicates = self.compose(vec![self.id_equals(id.clone())], ctx, false);
        match self.restore_where(self.store(ctx), sd, &predicates).await? {
            0 => Err(self.not_found(&id)),
            count => Ok(MutationResult::affected(count)),
        }
    }

    /// Physical delete regardless of soft delete. Existence is checked by id alone, the delete itself is scoped.
    #[tracing::instrument(skip_all, fields(entity = %self.entity.name, operation = "permanentDelete"))]
    pub async fn permanent_delete(&self, id: Value, ctx: &OperationContext) -> Result<MutationResult, AppError> {
        let id = self.parse_id(id, ctx, Operation::PermanentDelete).await?;
        let store = self.store(ctx);
        let exists = SelectQuery {
            filter: vec![self.id_equals(id.clone())],
            limit: Some(1),
            ..Default::default()
        };
        if store.select(&self.entity, &exists).await?.is_empty() {
            return Err(self.not_found(&id));
        }
        let predicates = self.compose(vec![self.id_equals(id.clone())], ctx, false);
        match store.delete(&self.entity, &predicates).await?.len() {
            0 => Err(self.not_found(&id)),
            count => Ok(MutationResult::affected(count)),
        }
    }

    #[tracing::instrument(skip_all, fields(entity = %self.entity.name, operation = "bulkCreate"))]
    pub async fn bulk_create(&self, records: Vec<Value>, ctx: &OperationContext) -> Result<BulkCreateResult, AppError> {
        if records.is_empty() {
            tracing::debug!("empty bulk create");
            return Ok(BulkCreateResult {
                success: true,
                count: 0,
                items: Vec::new(),
            });
        }
        let data = Value::Array(records);
        let validate = self.should_validate(&data, ctx, Operation::BulkCreate).await?;
        let Value::Array(records) = data else {
            return Err(AppError::validation("body", "expected an array"));
        };
        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let record = if validate {
                self.insert_schema.parse(record).map_err(|e| at_index(i, e))?
            } else {
                record
            };
            let record = self.hooks.before_create(record).await?;
            let mut row = into_row(record).map_err(|e| at_index(i, e))?;
            self.stamp_created(&mut row);
            rows.push(row);
        }
        let items = self.store(ctx).insert(&self.entity, &rows).await?;
        Ok(BulkCreateResult {
            success: true,
            count: items.len() as u64,
            items,
        })
    }

    #[tracing::instrument(skip_all, fields(entity = %self.entity.name, operation = "bulkDelete"))]
    pub async fn bulk_delete(&self, ids: Vec<Value>, ctx: &OperationContext) -> Result<MutationResult, AppError> {
        if ids.is_empty() {
            tracing::debug!("empty bulk delete");
            return Ok(MutationResult::affected(0));
        }
        let ids = self.parse_ids(ids, ctx, Operation::BulkDelete).await?;
        let predicates = self.compose(vec![Predicate::in_list(self.entity.id_field.as_str(), ids)], ctx, false);
        let count = self.remove(self.store(ctx), &predicates).await?;
        Ok(MutationResult::affected(count))
    }

    #[tracing::instrument(skip_all, fields(entity = %self.entity.name, operation = "bulkRestore"))]
    pub async fn bulk_restore(&self, ids: Vec<Value>, ctx: &OperationContext) -> Result<MutationResult, AppError> {
        let sd = self.soft_delete()?;
        if ids.is_empty() {
            return Ok(MutationResult::affected(0));
        }
        let ids = self.parse_ids(ids, ctx, Operation::BulkRestore).await?;
        let predicates = self.compose(vec![Predicate::in_list(self.entity.id_field.as_str(), ids)], ctx, false);
        let count = self.restore_where(self.store(ctx), sd, &predicates).await?;
        Ok(MutationResult::affected(count))
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn into_row(data: Value) -> Result<Row, AppError> {
    match data {
        Value::Object(m) => Ok(m),
        Value::Null => Ok(Map::new()),
        other => Err(AppError::validation(
            "body",
            format!("expected an object, got {}", crate::config::type_name_of_json(&other)),
        )),
    }
}

/// Prefix validation issue fields with the item index of a bulk payload.
fn at_index(index: usize, err: AppError) -> AppError {
    match err {
        AppError::Validation(mut errors) => {
            for issue in &mut errors.issues {
                issue.field = format!("{}.{}", index, issue.field);
            }
            AppError::Validation(errors)
        }
        other => other,
    }
}
