// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use axum::{Router, routing::{get, post}};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::application::frame_assets::TracingReleaser;
use crate::application::orchestrator::{MultiRoadOrchestrator, OrchestratorSettings};
use crate::application::road_service::RoadService;
use crate::infrastructure::config::load_dashboard_config;
use crate::infrastructure::endpoint_resolver::TemplateResolver;
use crate::infrastructure::road_api::HttpRoadDirectory;
use crate::infrastructure::ws_transport::WebSocketTransport;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    connectivity, health_check, history, list_roads, replace_roads, reset_history, road_frame,
    road_series, stats, traffic_data,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_dashboard_config()?;

    // Create adapters (infrastructure layer)
    let transport = Arc::new(WebSocketTransport::new());
    let resolver = Arc::new(TemplateResolver::from_settings(&config.streams));
    let directory = Arc::new(HttpRoadDirectory::new(config.discovery.roads_url.clone()));
    let releaser = Arc::new(TracingReleaser::default());

    // Create services (application layer)
    let road_service = RoadService::new(directory, config.discovery.fallback_roads.clone());
    let orchestrator = MultiRoadOrchestrator::new(
        transport,
        resolver,
        releaser.clone(),
        OrchestratorSettings {
            policy: config.streams.policy(),
            history_capacity: config.history.capacity,
            channel_capacity: config.streams.channel_capacity,
            thresholds: config.congestion,
        },
    );
    let handle = Arc::new(orchestrator.start());

    let roads = road_service.list_roads().await;
    tracing::info!(roads = roads.len(), "monitoring roads");
    handle.set_roads(roads);

    if config.discovery.refresh_secs > 0 {
        let handle = handle.clone();
        let road_service = road_service.clone();
        let period = Duration::from_secs(config.discovery.refresh_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                handle.set_roads(road_service.list_roads().await);
            }
        });
    }

    // Create application state
    let state = Arc::new(AppState {
        orchestrator: handle.clone(),
        view: handle.view(),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/roads", get(list_roads).put(replace_roads))
        .route("/traffic", get(traffic_data))
        .route("/frames/:road", get(road_frame))
        .route("/connectivity", get(connectivity))
        .route("/history", get(history))
        .route("/history/reset", post(reset_history))
        .route("/history/:road/:metric", get(road_series))
        .route("/stats", get(stats))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting traffic-monitor service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    handle.stop().await;
    tracing::info!(
        frames = releaser.released_frames(),
        bytes = releaser.released_bytes(),
        "frames released during session"
    );

    Ok(())
}
