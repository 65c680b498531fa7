// HTTP request handlers - read-only views over the live dashboard state
use crate::domain::history::Metric;
use crate::domain::road::{ConnectionState, RoadId, StreamKind};
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RoadsRequest {
    pub road_names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RoadsResponse {
    pub road_names: Vec<RoadId>,
    pub desired: Vec<RoadId>,
}

#[derive(Debug, Serialize)]
pub struct StreamStatus {
    pub road: RoadId,
    pub kind: StreamKind,
    pub state: ConnectionState,
    pub decode_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct ConnectivityResponse {
    pub is_any_connected: bool,
    pub streams: Vec<StreamStatus>,
}

#[derive(Debug, Serialize)]
pub struct HistoryPoint {
    pub time: String,
    #[serde(flatten)]
    pub record: crate::domain::history::HistoryRecord,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Roads currently tracked, plus the latest requested set (which may still be converging)
pub async fn list_roads(State(state): State<Arc<AppState>>) -> Json<RoadsResponse> {
    Json(RoadsResponse {
        road_names: state.view.roads().await,
        desired: state.orchestrator.desired_roads(),
    })
}

/// Replace the monitored road set
pub async fn replace_roads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RoadsRequest>,
) -> StatusCode {
    let roads = request.road_names.into_iter().map(RoadId::from).collect();
    state.orchestrator.set_roads(roads);
    StatusCode::ACCEPTED
}

pub async fn traffic_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.view.traffic_data().await)
}

/// Latest camera frame for a road as raw image bytes
pub async fn road_frame(
    Path(road): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.view.frame(&RoadId::from(road)).await {
        Some(asset) => {
            let content_type = sniff_image_type(&asset.bytes);
            (
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CACHE_CONTROL, "no-store"),
                ],
                asset.bytes,
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn connectivity(State(state): State<Arc<AppState>>) -> Json<ConnectivityResponse> {
    let report = state.view.connectivity().await;

    let is_any_connected = report.iter().any(|(_, connection, _)| connection.is_open());
    let streams = report
        .into_iter()
        .map(|(key, connection, decode_failures)| StreamStatus {
            decode_failures,
            road: key.road,
            kind: key.kind,
            state: connection,
        })
        .collect();

    Json(ConnectivityResponse {
        is_any_connected,
        streams,
    })
}

pub async fn history(State(state): State<Arc<AppState>>) -> Json<Vec<HistoryPoint>> {
    let records = state.view.history().await;
    Json(
        records
            .into_iter()
            .map(|record| HistoryPoint {
                time: record.label(),
                record,
            })
            .collect(),
    )
}

/// Per-road series for one metric: cars, motors, car_speed, motor_speed or total
pub async fn road_series(
    Path((road, metric)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(metric) = Metric::parse(&metric) else {
        return (StatusCode::BAD_REQUEST, format!("unknown metric {}", metric)).into_response();
    };
    Json(state.view.series(&RoadId::from(road), metric).await).into_response()
}

pub async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.view.summary().await)
}

pub async fn reset_history(State(state): State<Arc<AppState>>) -> StatusCode {
    state.orchestrator.reset_history();
    StatusCode::ACCEPTED
}

fn sniff_image_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}
