//! Router assembly and the alarm-sweep background task. Grounded in the
//! teacher's `websocket/routes.rs` (`create_router`/`run_server`): CORS via
//! `tower-http`, a `TraceLayer`, `/health` and `/metrics` mounted alongside
//! the per-room WebSocket route.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::directory::RoomDirectory;
use crate::gateway::{websocket_handler, AppState};
use crate::identity::IdentityVerifier;
use crate::metrics::Metrics;

/// `GET /room/:code/info` response body (§6: no auth, JSON snapshot).
#[derive(Serialize)]
struct RoomInfo {
    room_code: String,
    player_count: usize,
    max_players: u8,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// Builds the one `RoomDirectory` a process owns. Callers keep a handle to
/// pass into both [`create_router`] and [`run_alarm_sweep`] so the sweep
/// drives the same rooms the router hands out.
pub fn build_directory(metrics: Arc<Metrics>) -> Arc<RoomDirectory> {
    Arc::new(RoomDirectory::new(
        crate::store::RoomStoreConfig::InMemory,
        Arc::new(crate::lobby::InMemoryLobbyDirectory::new()),
        metrics,
    ))
}

pub fn create_router(
    directory: Arc<RoomDirectory>,
    identity: Arc<dyn IdentityVerifier>,
    metrics: Arc<Metrics>,
    config: &Config,
) -> Router {
    let state = AppState {
        directory,
        identity,
        metrics,
    };

    let cors = cors_layer(&config.server.cors_origins);

    Router::new()
        .route("/room/{code}", get(websocket_handler))
        .route("/room/{code}/info", get(room_info))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &str) -> CorsLayer {
    if origins == "*" {
        return CorsLayer::permissive();
    }
    let parsed: Vec<_> = origins
        .split(',')
        .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
        .collect();
    if parsed.is_empty() {
        tracing::warn!("no valid CORS origins configured, using permissive CORS");
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render_prometheus()
}

async fn room_info(
    Path(room_code): Path<String>,
    State(state): State<AppState>,
) -> Result<axum::Json<RoomInfo>, StatusCode> {
    let room = state.directory.get(&room_code).ok_or(StatusCode::NOT_FOUND)?;
    let update = room.snapshot().await;
    let created_at = room.created_at().await;
    Ok(axum::Json(RoomInfo {
        room_code: update.room_code,
        player_count: update.player_count,
        max_players: update.max_players,
        created_at,
    }))
}

/// Drives every live room's alarm clock from one process-wide tick, since
/// no actor runtime here schedules a per-room wakeup for us (§4.5's
/// single-alarm model assumes a hosting runtime that calls `on_alarm` at
/// the armed deadline; this sweep polls instead, at a resolution fine
/// enough that no deadline drifts by more than one tick).
pub async fn run_alarm_sweep(directory: Arc<RoomDirectory>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let now = chrono::Utc::now();
        for room in directory.all() {
            if let Some(next) = room.next_alarm_at().await {
                if next <= now {
                    let effects = room.on_alarm(now).await;
                    room.broadcast(&effects.broadcast).await;
                }
            }
        }
    }
}

pub async fn run_server(addr: SocketAddr, router: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "game room server listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
