//! services/api/src/web/points.rs
//!
//! Handlers for the loyalty point balance and the two accrual triggers.

use crate::error::{ApiError, ErrorBody};
use crate::web::{
    dto::{DistanceAccrualDto, DistanceRequest, LedgerEntryDto, LocationCheckDto, LocationRequest, PointsDto},
    middleware::Caller,
    state::AppState,
};
use axum::{extract::State, response::Json, Extension};
use smart_cart_core::domain::Position;
use std::sync::Arc;

/// The caller's balance and whether it matches the ledger.
#[utoipa::path(
    get,
    path = "/points",
    tag = "points",
    params(("x-account-id" = String, Header, description = "The calling account.")),
    responses((status = 200, description = "Current balance", body = PointsDto))
)]
pub async fn balance_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<PointsDto>, ApiError> {
    let audit = state.points.audit(&caller.0).await?;
    Ok(Json(audit.into()))
}

/// Ledger entries for the caller, newest first.
#[utoipa::path(
    get,
    path = "/points/history",
    tag = "points",
    params(("x-account-id" = String, Header, description = "The calling account.")),
    responses((status = 200, description = "Ledger entries", body = [LedgerEntryDto]))
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<LedgerEntryDto>>, ApiError> {
    let entries = state.points.history(&caller.0).await?;
    Ok(Json(entries.into_iter().map(LedgerEntryDto::from).collect()))
}

/// Credit points for distance walked.
#[utoipa::path(
    post,
    path = "/points/distance",
    tag = "points",
    request_body = DistanceRequest,
    params(("x-account-id" = String, Header, description = "The calling account.")),
    responses(
        (status = 200, description = "Distance recorded", body = DistanceAccrualDto),
        (status = 400, description = "Negative or non-finite distance", body = ErrorBody)
    )
)]
pub async fn accrue_distance_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<DistanceRequest>,
) -> Result<Json<DistanceAccrualDto>, ApiError> {
    let accrual = state
        .points
        .accrue_distance(&caller.0, request.distance)
        .await?;
    Ok(Json(accrual.into()))
}

/// Fire the first location event in range of the given position, if any.
#[utoipa::path(
    post,
    path = "/points/location",
    tag = "points",
    request_body = LocationRequest,
    params(("x-account-id" = String, Header, description = "The calling account.")),
    responses(
        (status = 200, description = "Check result", body = LocationCheckDto),
        (status = 400, description = "Invalid coordinates", body = ErrorBody)
    )
)]
pub async fn check_location_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<LocationRequest>,
) -> Result<Json<LocationCheckDto>, ApiError> {
    let position = Position {
        x: request.x,
        y: request.y,
    };
    let triggered = state
        .points
        .check_location_event(&caller.0, position)
        .await?;
    Ok(Json(triggered.into()))
}
