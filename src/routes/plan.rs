use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use tracing::info;

use crate::{
    dto::{
        plan::{PlanSnapshot, SaveAck},
        validation::validate_trip_id,
    },
    error::AppError,
    services::{flush_scheduler, plan_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/trips/{trip_id}/plan",
    params(("trip_id" = String, Path, description = "Trip identifier")),
    responses(
        (status = 200, description = "Plan opened for editing", body = PlanSnapshot),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Open a trip's plan for editing, hydrating it from storage on first access.
pub async fn open_plan(
    State(state): State<SharedState>,
    Path(trip_id): Path<String>,
) -> Result<Json<PlanSnapshot>, AppError> {
    validate_trip_id(&trip_id).map_err(|err| AppError::BadRequest(err.to_string()))?;

    let plan = plan_service::open_for_editing(&state, &trip_id).await?;
    info!(trip_id = %trip_id, "plan opened for editing");

    Ok(Json(PlanSnapshot { trip_id, plan }))
}

#[utoipa::path(
    post,
    path = "/trips/{trip_id}/plan/save",
    params(("trip_id" = String, Path, description = "Trip identifier")),
    responses(
        (status = 200, description = "Plan flushed to storage", body = SaveAck),
        (status = 404, description = "Trip has not been opened for editing"),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Flush a trip's plan to storage immediately, bypassing the debounce window.
pub async fn save_plan(
    State(state): State<SharedState>,
    Path(trip_id): Path<String>,
) -> Result<Json<SaveAck>, AppError> {
    validate_trip_id(&trip_id).map_err(|err| AppError::BadRequest(err.to_string()))?;

    if state.plan_record(&trip_id).is_none() {
        return Err(AppError::NotFound(format!(
            "trip `{trip_id}` has not been opened for editing"
        )));
    }

    flush_scheduler::force_flush(&state, &trip_id).await?;
    info!(trip_id = %trip_id, "plan flushed on request");

    Ok(Json(SaveAck::saved()))
}

/// Configure the plan routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/trips/{trip_id}/plan", get(open_plan))
        .route("/trips/{trip_id}/plan/save", post(save_plan))
}
