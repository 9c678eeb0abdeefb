use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::error::AppError;
use crate::models::offer::ActiveStep;
use crate::models::order::OrderId;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/active/picked-up", post(mark_picked_up))
        .route("/active/arrived", post(mark_arrived))
        .route("/active/delivered", post(mark_delivered))
}

#[derive(Serialize)]
pub struct StepResponse {
    pub order_id: OrderId,
    pub step: ActiveStep,
}

async fn advance(state: &AppState, step: ActiveStep) -> Result<Json<StepResponse>, AppError> {
    let order_id = state.tracker.advance(step).await?;
    Ok(Json(StepResponse { order_id, step }))
}

async fn mark_picked_up(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StepResponse>, AppError> {
    advance(&state, ActiveStep::PickUp).await
}

async fn mark_arrived(State(state): State<Arc<AppState>>) -> Result<Json<StepResponse>, AppError> {
    advance(&state, ActiveStep::Arrive).await
}

async fn mark_delivered(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StepResponse>, AppError> {
    advance(&state, ActiveStep::Deliver).await
}
