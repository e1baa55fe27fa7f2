use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod config;
mod game;
mod net;
mod session;
mod telemetry;
mod util;

use crate::game::Catalog;
use crate::net::handler::MessageHandler;
use crate::session::{GameService, MemoryStore};

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<MessageHandler>,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.handler.service();
    Json(serde_json::json!({
        "active_games": service.active_games(),
        "open_games": service.open_games(),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let catalog = Arc::new(Catalog::load()?);
    let store = Arc::new(MemoryStore::new());
    let service = Arc::new(GameService::new(catalog, store));
    let handler = Arc::new(MessageHandler::new(Arc::clone(&service)));
    let state = AppState {
        handler: Arc::clone(&handler),
    };

    // Periodic maintenance: idle-session reaping and limiter sweep.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            service.sweep_idle();
            handler.sweep_limiter();
        }
    });

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/stats", get(stats))
        .route("/ws", get(net::ws::ws_handler))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config::server_addr();
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
