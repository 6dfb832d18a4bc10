//! Serves every model of a models.json over Ext Direct.
//!
//! Run from repo root: `cargo run -p ext-store-server`
//! With `CONFIG_PATH=demos/library` and no `DATABASE_URL` it runs on the in-memory store.

use ext_store_api::{
    app, load_from_path, resolve, AppState, DirectConfig, DirectMethod, MemoryStore, PgStore, Settings, Store,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ext_store_api=info,ext_store_server=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let config = load_from_path(&settings.config_path).await?;
    let schema = resolve(&config)?;

    let store: Arc<dyn Store> = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .connect(url)
                .await?;
            tracing::info!("using PostgreSQL store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let direct = schema.models.iter().fold(DirectConfig::default(), |direct, m| {
        direct
            .register(m.name.clone())
            .register_with(m.name.clone(), &[DirectMethod::GetNodes, DirectMethod::FormLoad, DirectMethod::FormSubmit])
    });
    tracing::info!(models = schema.models.len(), "models loaded");

    let state = AppState::new(store, schema, direct);
    let router = app(state, settings.body_limit);
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
