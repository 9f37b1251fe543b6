//! Entity handlers: each one resolves the pipeline by path segment and runs a single operation.

use crate::error::AppError;
use crate::extractors::Caller;
use crate::query::{FilterExpression, ListParams, OrderBy, SortDirection};
use crate::response::{created, ok};
use crate::service::FindOneParams;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Query string of `GET /:entity`. `filters` is a JSON-encoded filter expression.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub search: Option<String>,
    pub filters: Option<String>,
    /// `field[:asc|desc]`, comma separated.
    pub order_by: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

impl ListQuery {
    pub fn into_params(self) -> Result<ListParams, AppError> {
        let filters = match self.filters.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_filters(raw)?),
            None => None,
        };
        let order_by = match self.order_by.as_deref() {
            Some(raw) => parse_order_by(raw)?,
            None => Vec::new(),
        };
        Ok(ListParams {
            page: self.page,
            per_page: self.per_page,
            search: self.search,
            filters,
            order_by,
            include_deleted: self.include_deleted,
        })
    }
}

fn parse_filters(raw: &str) -> Result<FilterExpression, AppError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(m)) => Ok(m),
        Ok(_) => Err(AppError::BadRequest("filters must be a JSON object".into())),
        Err(e) => Err(AppError::BadRequest(format!("filters: {}", e))),
    }
}

fn parse_order_by(raw: &str) -> Result<Vec<OrderBy>, AppError> {
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (field, dir) = part.split_once(':').unwrap_or((part, "asc"));
        let direction = match dir.trim().to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => return Err(AppError::BadRequest(format!("invalid sort direction: {}", other))),
        };
        out.push(OrderBy {
            field: field.trim().to_string(),
            direction,
        });
    }
    Ok(out)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

/// Body of the bulk delete/restore routes.
#[derive(Debug, Deserialize)]
pub struct IdsBody {
    pub ids: Vec<Value>,
}

pub async fn list(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let pipeline = state.registry.pipeline(&entity)?;
    let page = pipeline.list(query.into_params()?, &caller.context()).await?;
    Ok(ok(page))
}

pub async fn create(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    caller: Caller,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let pipeline = state.registry.pipeline(&entity)?;
    let row = pipeline.create(body, &caller.context()).await?;
    Ok(created(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    caller: Caller,
    Query(query): Query<ReadQuery>,
) -> Result<impl IntoResponse, AppError> {
    let pipeline = state.registry.pipeline(&entity)?;
    let mut conditions = Map::new();
    conditions.insert(pipeline.entity().id_field.clone(), Value::String(id.clone()));
    let params = FindOneParams {
        include_deleted: query.include_deleted,
    };
    let row = pipeline
        .find_one(Value::Object(conditions), params, &caller.context())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity, id)))?;
    Ok(ok(row))
}

pub async fn update(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    caller: Caller,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let pipeline = state.registry.pipeline(&entity)?;
    let row = pipeline.update(Value::String(id), body, &caller.context()).await?;
    Ok(ok(row))
}

pub async fn delete_one(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let pipeline = state.registry.pipeline(&entity)?;
    let result = pipeline.delete_one(Value::String(id), &caller.context()).await?;
    Ok(ok(result))
}

pub async fn restore(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let pipeline = state.registry.pipeline(&entity)?;
    let result = pipeline.restore(Value::String(id), &caller.context()).await?;
    Ok(ok(result))
}

pub async fn permanent_delete(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let pipeline = state.registry.pipeline(&entity)?;
    let result = pipeline.permanent_delete(Value::String(id), &caller.context()).await?;
    Ok(ok(result))
}

pub async fn bulk_create(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    caller: Caller,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let pipeline = state.registry.pipeline(&entity)?;
    let Value::Array(records) = body else {
        return Err(AppError::BadRequest("body must be a JSON array".into()));
    };
    let result = pipeline.bulk_create(records, &caller.context()).await?;
    Ok(created(result))
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    caller: Caller,
    Json(body): Json<IdsBody>,
) -> Result<impl IntoResponse, AppError> {
    let pipeline = state.registry.pipeline(&entity)?;
    let result = pipeline.bulk_delete(body.ids, &caller.context()).await?;
    Ok(ok(result))
}

pub async fn bulk_restore(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    caller: Caller,
    Json(body): Json<IdsBody>,
) -> Result<impl IntoResponse, AppError> {
    let pipeline = state.registry.pipeline(&entity)?;
    let result = pipeline.bulk_restore(body.ids, &caller.context()).await?;
    Ok(ok(result))
}
