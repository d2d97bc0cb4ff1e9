//! Remix Battle Back binary entrypoint wiring REST, SSE and the storage backend.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use remix_battle_back::{
    config::AppConfig,
    dao::{
        battle_store::{BattleStore, memory::MemoryBattleStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    spawn_storage_supervisor(app_state.clone())?;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the background task that connects the configured backend and
/// toggles degraded mode when connectivity changes.
fn spawn_storage_supervisor(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var(STORAGE_BACKEND_ENV).unwrap_or_else(|_| "memory".into());
    info!(backend = %backend, "selected storage backend");

    match backend.as_str() {
        "memory" => {
            let store: Arc<dyn BattleStore> = Arc::new(MemoryBattleStore::new());
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(store) }
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use remix_battle_back::dao::battle_store::mongodb::{MongoBattleStore, MongoConfig};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoBattleStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn BattleStore>)
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use remix_battle_back::dao::battle_store::couchdb::{CouchBattleStore, CouchConfig};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = CouchConfig::from_env()?;
                let store = CouchBattleStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn BattleStore>)
            }));
        }
        other => bail!("unsupported {STORAGE_BACKEND_ENV} value `{other}`"),
    }

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
