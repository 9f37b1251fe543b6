//! Entity routes. The first path segment names the entity; handlers resolve its pipeline from the registry.

use crate::handlers::entity::{
    bulk_create, bulk_delete, bulk_restore, create, delete_one, list, permanent_delete, read, restore, update,
};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

/// Request bodies above this size are rejected with 413.
pub const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:entity", get(list).post(create))
        .route("/:entity/bulk", post(bulk_create))
        .route("/:entity/bulk/delete", post(bulk_delete))
        .route("/:entity/bulk/restore", post(bulk_restore))
        .route("/:entity/:id", get(read).patch(update).delete(delete_one))
        .route("/:entity/:id/restore", post(restore))
        .route("/:entity/:id/permanent", delete(permanent_delete))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .with_state(state)
}
