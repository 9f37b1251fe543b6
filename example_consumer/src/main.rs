//! Example consumer: builds a pipeline by hand over the in-memory store and walks through its operations.
//!
//! Run from repo root: `cargo run -p example-consumer`

use async_trait::async_trait;
use crud_engine::query::Predicate;
use crud_engine::service::ValidateArgs;
use crud_engine::{
    resolve, AppError, EntityHooks, EntityPipeline, FullConfig, ListParams, MemoryStore, OperationContext,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Normalises emails before they are written.
struct UserHooks;

#[async_trait]
impl EntityHooks for UserHooks {
    async fn validate(&self, args: ValidateArgs<'_>) -> Result<bool, AppError> {
        tracing::debug!(operation = %args.operation, "validate hook");
        Ok(true)
    }

    async fn before_create(&self, mut data: Value) -> Result<Value, AppError> {
        if let Some(email) = data.get("email").and_then(Value::as_str) {
            let lower = email.to_lowercase();
            data["email"] = Value::String(lower);
        }
        Ok(data)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crud_engine=debug,example_consumer=info")),
        )
        .init();

    let config = FullConfig {
        entities: vec![serde_json::from_value(json!({
            "name": "users",
            "table": "users",
            "idType": "bigint",
            "columns": [
                { "name": "id", "type": "bigint", "nullable": false },
                { "name": "tenant_id", "type": "text", "nullable": false },
                { "name": "email", "type": "text", "nullable": false },
                { "name": "role", "type": "text", "nullable": false, "default": "user" },
                { "name": "deleted_at", "type": "timestamptz" }
            ],
            "allowedFilters": ["role"],
            "searchFields": ["email"],
            "softDelete": { "field": "deleted_at" },
            "validation": { "email": { "format": "email" } }
        }))?],
    };
    let model = resolve(&config)?;
    let entity = model
        .entity("users")
        .cloned()
        .ok_or("users entity missing")?;

    let store = Arc::new(MemoryStore::new());
    let users = EntityPipeline::builder(entity, store)
        .hooks(Arc::new(UserHooks))
        .scope(
            "tenantId",
            Arc::new(|value: Option<&Value>, _actor: Option<&Value>| {
                Some(match value {
                    Some(v) => Predicate::eq("tenant_id", v.clone()),
                    None => Predicate::deny_all(),
                })
            }),
        )
        .build()?;

    let acme = OperationContext::new().with_scope("tenantId", "acme");
    let globex = OperationContext::new().with_scope("tenantId", "globex");

    let created = users
        .bulk_create(
            vec![
                json!({ "tenant_id": "acme", "email": "Ada@Acme.io", "role": "admin" }),
                json!({ "tenant_id": "acme", "email": "bob@acme.io" }),
                json!({ "tenant_id": "globex", "email": "carol@globex.io" }),
            ],
            &acme,
        )
        .await?;
    tracing::info!(count = created.count, "seeded users");

    let admins = users
        .list(
            ListParams {
                filters: Some(json!({ "role": "admin" }).as_object().cloned().unwrap_or_default()),
                ..Default::default()
            },
            &acme,
        )
        .await?;
    tracing::info!(total = admins.total_items, first = ?admins.results.first(), "acme admins");

    let bob_id = created.items[1]["id"].clone();
    users.delete_one(bob_id.clone(), &acme).await?;
    let visible = users.list(ListParams::default(), &acme).await?;
    tracing::info!(total = visible.total_items, "acme users after soft delete");

    let hidden = users.update(bob_id.clone(), json!({ "role": "admin" }), &globex).await;
    tracing::info!(error = ?hidden.err(), "cross-tenant update");

    users.restore(bob_id, &acme).await?;
    let restored = users.list(ListParams::default(), &acme).await?;
    tracing::info!(total = restored.total_items, "acme users after restore");
    Ok(())
}
