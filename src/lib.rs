pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use std::time::Instant;

use actix_web::{web, HttpResponse};
use tracing::error;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{Session, SessionProvider};
pub use db::{MemoryStore, PgStore, Store};

/// Health check endpoint handler
/// Reports database reachability, round-trip latency and pool counters.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let started = Instant::now();
    let ping = state.store.ping().await;
    let latency_ms = started.elapsed().as_millis() as u64;
    let pool = state.store.pool_status();

    let healthy = match ping {
        Ok(()) => true,
        Err(e) => {
            error!("Health check ping failed: {}", e);
            false
        }
    };

    let body = serde_json::json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "database": {
            "healthy": healthy,
            "latencyMs": latency_ms,
            "totalConnections": pool.total_connections,
            "idleConnections": pool.idle_connections,
            "waitingClients": pool.waiting_clients,
        }
    });

    if healthy {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<dyn Store>,
    pub sessions: Arc<SessionProvider>,
}

impl AppState {
    /// Connects to PostgreSQL and applies pending migrations when enabled.
    pub async fn new(config: Settings) -> Result<Self> {
        let store = PgStore::connect(&config.database).await?;
        if config.database.run_migrations {
            store.migrate().await?;
        }

        Ok(Self::with_store(config, Arc::new(store)))
    }

    pub fn with_store(config: Settings, store: Arc<dyn Store>) -> Self {
        let sessions = SessionProvider::from_config(&config.auth);
        Self {
            config: Arc::new(config),
            store,
            sessions: Arc::new(sessions),
        }
    }
}
