//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::NaiveDateTime;

use crate::devices::types::{HomeId, SuggestionId};
use crate::engine::schedule::Schedule;
use crate::error::EngineError;
use crate::ports::HomeDataSource;
use crate::runtime::TickSummary;

use super::AppState;
use super::types::{
    AcceptSuggestionRequest, CreateScheduleRequest, EconomyToggleRequest, ErrorResponse,
    HomeStateResponse, HomeSummary, SavingsQuery, SavingsResponse, SuggestionDecisionResponse,
};

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Maps engine errors onto HTTP statuses: caller mistakes are 400/403,
/// unknown targets 404, everything else 500.
fn to_api_error(e: EngineError) -> ApiError {
    let status = match &e {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::Authorization { .. } => StatusCode::FORBIDDEN,
        EngineError::Config(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// `GET /homes` → 200 + `Vec<HomeSummary>` JSON
pub async fn list_homes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HomeSummary>>, ApiError> {
    let backend = &state.backend;
    let ids = backend.home_ids().await.map_err(to_api_error)?;
    let mut homes = Vec::with_capacity(ids.len());
    for id in ids {
        let settings = backend.economy_settings(id).await.map_err(to_api_error)?;
        homes.push(HomeSummary {
            id,
            supply: backend.supply(id).await.map_err(to_api_error)?,
            economy_active: settings.is_active,
            balance_gnf: backend.account_balance(id).await.map_err(to_api_error)?,
            battery_percent: backend.battery_percent(id).await.map_err(to_api_error)?,
        });
    }
    Ok(Json(homes))
}

/// `GET /homes/{id}/state` → 200 + `HomeStateResponse` JSON, 404 unknown home
pub async fn get_home_state(
    State(state): State<Arc<AppState>>,
    Path(id): Path<HomeId>,
) -> Result<Json<HomeStateResponse>, ApiError> {
    let backend = &state.backend;
    Ok(Json(HomeStateResponse {
        id,
        supply: backend.supply(id).await.map_err(to_api_error)?,
        settings: backend.economy_settings(id).await.map_err(to_api_error)?,
        balance_gnf: backend.account_balance(id).await.map_err(to_api_error)?,
        battery_percent: backend.battery_percent(id).await.map_err(to_api_error)?,
        devices: backend
            .list_controllable_devices(id)
            .await
            .map_err(to_api_error)?,
        schedules: backend
            .list_active_schedules(id)
            .await
            .map_err(to_api_error)?,
    }))
}

/// `POST /homes/{id}/economy` → 204, 404 unknown home
///
/// Administrator toggle; takes effect from the next tick's snapshot.
pub async fn set_economy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<HomeId>,
    Json(body): Json<EconomyToggleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .backend
        .set_economy_active(id, body.active)
        .await
        .map_err(to_api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /homes/{id}/schedules` → 201 + `Schedule` JSON, 400 invalid window
pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<HomeId>,
    Json(body): Json<CreateScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let schedule = Schedule {
        id: 0,
        device_id: body.device_id,
        days_of_week: body.days_of_week,
        start_time: body.start_time,
        end_time: body.end_time,
        action: body.action,
        is_active: true,
        applies_to_all: body.applies_to_all,
        allowed_member_ids: body.allowed_member_ids,
        created_by: body.created_by,
        created_at: chrono::Local::now().naive_local(),
        auto_detected: false,
    };
    let created = state
        .backend
        .create_schedule(id, schedule)
        .map_err(to_api_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /homes/{id}/savings` → 200 + `SavingsResponse` JSON
/// `GET /homes/{id}/savings?from=T&to=T` → filtered range (inclusive)
/// `GET /homes/{id}/savings?from=later&to=earlier` → 400 + `ErrorResponse`
pub async fn get_savings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<HomeId>,
    Query(query): Query<SavingsQuery>,
) -> Result<Json<SavingsResponse>, ApiError> {
    let from = query.from.unwrap_or(NaiveDateTime::MIN);
    let to = query.to.unwrap_or(NaiveDateTime::MAX);

    if from > to {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("`from` ({from}) must be <= `to` ({to})"),
            }),
        ));
    }

    let records: Vec<_> = state
        .backend
        .ledger()
        .snapshot()
        .into_iter()
        .filter(|r| r.home_id == id && r.timestamp >= from && r.timestamp <= to)
        .collect();
    let total_energy_kwh = records.iter().map(|r| r.energy_kwh_saved).sum();
    let total_cost_gnf = records.iter().map(|r| r.cost_gnf_saved).sum();

    Ok(Json(SavingsResponse {
        home_id: id,
        total_energy_kwh,
        total_cost_gnf,
        records,
    }))
}

/// `POST /suggestions/{id}/accept` → 200 + materialized schedule,
/// 404 unknown or already-decided suggestion, 400 malformed proposal
pub async fn accept_suggestion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SuggestionId>,
    Json(body): Json<AcceptSuggestionRequest>,
) -> Result<Json<SuggestionDecisionResponse>, ApiError> {
    let schedule = state
        .backend
        .accept_suggestion(id, body.member_id, chrono::Local::now().naive_local())
        .map_err(to_api_error)?;
    Ok(Json(SuggestionDecisionResponse {
        suggestion_id: id,
        schedule: Some(schedule),
    }))
}

/// `POST /suggestions/{id}/reject` → 200, 404 unknown suggestion
pub async fn reject_suggestion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SuggestionId>,
) -> Result<Json<SuggestionDecisionResponse>, ApiError> {
    state.backend.reject_suggestion(id).map_err(to_api_error)?;
    Ok(Json(SuggestionDecisionResponse {
        suggestion_id: id,
        schedule: None,
    }))
}

/// `POST /tick` → 200 + `TickSummary` JSON
///
/// Forces one evaluation pass at the current wall-clock time, ahead of the
/// regular interval.
pub async fn run_tick(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TickSummary>, ApiError> {
    let now = chrono::Local::now().naive_local();
    let summary = state.runtime.tick_once(now).await.map_err(to_api_error)?;
    Ok(Json(summary))
}
