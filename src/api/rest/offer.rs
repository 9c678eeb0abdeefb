use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::engine::tracker::{Resolution, TrackerSnapshot};
use crate::error::AppError;
use crate::models::order::OrderId;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tracker", get(get_snapshot))
        .route("/tracker/online", put(set_online))
        .route("/tracker/refresh", post(refresh))
        .route("/offer/accept", post(accept_offer))
        .route("/offer/reject", post(reject_offer))
}

#[derive(Deserialize)]
pub struct SetOnlineRequest {
    pub online: bool,
}

#[derive(Serialize)]
pub struct ResolutionResponse {
    pub offer_id: OrderId,
    pub resolution: Resolution,
}

async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<TrackerSnapshot> {
    Json(state.tracker.snapshot())
}

async fn set_online(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SetOnlineRequest>,
) -> Result<Json<TrackerSnapshot>, AppError> {
    state.tracker.set_online(payload.online).await?;
    Ok(Json(state.tracker.snapshot()))
}

async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<TrackerSnapshot>, AppError> {
    state.tracker.refresh().await?;
    Ok(Json(state.tracker.snapshot()))
}

async fn accept_offer(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResolutionResponse>, AppError> {
    let offer_id = state.tracker.accept_offer().await?;
    Ok(Json(ResolutionResponse {
        offer_id,
        resolution: Resolution::Accepted,
    }))
}

async fn reject_offer(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResolutionResponse>, AppError> {
    let offer_id = state.tracker.reject_offer().await?;
    Ok(Json(ResolutionResponse {
        offer_id,
        resolution: Resolution::Rejected,
    }))
}
