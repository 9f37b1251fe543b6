//! Example server: entity pipelines over PostgreSQL behind the HTTP routes.
//!
//! `DATABASE_URL=postgres://localhost/crud CONFIG_PATH=demos/config cargo run --example server`

use crud_engine::{
    common_routes, entity_routes, load_from_path, resolve_with, AppState, EntityRegistry, PgStore, Settings, Store,
};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("crud_engine=info".parse()?))
        .init();

    let settings = Settings::from_env()?;
    let database_url = settings
        .database_url
        .clone()
        .unwrap_or_else(|| "postgres://localhost/crud".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let config_path = settings.config_path.clone().unwrap_or_else(|| "demos/config".into());
    let config = load_from_path(&config_path).await?;
    let model = resolve_with(&config, &settings)?;
    tracing::info!(entities = model.entities.len(), path = %config_path, "loaded entity config");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let registry = EntityRegistry::from_model(&model, store.clone())?;
    let state = AppState::new(registry, store);

    let app = Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api/v1", entity_routes(state));

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
