//! HTTP server for faqhubd

use crate::auth;
use crate::control::Handoff;
use crate::presence::PresenceTracker;
use crate::routes;
use crate::storage::JsonStore;
use anyhow::{Context, Result};
use axum::{middleware, Router};
use faqhub_common::Settings;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Upload and asset directory, relative to the work dir
pub const STATIC_DIR: &str = "static";

/// Bind attempts while a previous instance is still releasing the port
const BIND_ATTEMPTS: u32 = 20;
const BIND_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Application state shared across handlers
pub struct AppState {
    pub settings: Settings,
    pub store: JsonStore,
    pub presence: PresenceTracker,
    pub static_dir: PathBuf,
    pub handoff: Arc<dyn Handoff>,
}

impl AppState {
    pub fn new(settings: Settings, work_dir: PathBuf, handoff: Arc<dyn Handoff>) -> Self {
        Self {
            settings,
            store: JsonStore::new(&work_dir),
            presence: PresenceTracker::default(),
            static_dir: work_dir.join(STATIC_DIR),
            handoff,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .merge(routes::editor_routes())
        .merge(routes::control_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .merge(routes::faq_routes())
        .merge(routes::asset_routes())
        .merge(routes::presence_routes())
        .merge(admin)
        .nest_service("/assets", ServeDir::new(&state.static_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server
pub async fn run(state: AppState, addr: SocketAddr) -> Result<()> {
    tokio::fs::create_dir_all(&state.static_dir)
        .await
        .with_context(|| format!("Failed to create {}", state.static_dir.display()))?;

    let app = router(Arc::new(state));
    let listener = bind_with_retry(addr).await?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn bind_with_retry(addr: SocketAddr) -> Result<TcpListener> {
    let mut attempt = 1;
    loop {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) if attempt < BIND_ATTEMPTS => {
                warn!("Bind {} failed ({}), retrying", addr, e);
                attempt += 1;
                tokio::time::sleep(BIND_RETRY_DELAY).await;
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to bind {}", addr)),
        }
    }
}
