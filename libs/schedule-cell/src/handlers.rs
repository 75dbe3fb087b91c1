// libs/schedule-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Caller, CallerRole, User};
use shared_models::error::AppError;
use shared_utils::extractor::caller_from_user;

use crate::models::{
    CreateExceptionRequest, CreateScheduleRequest, GenerateSlotsRequest, WeeklySchedule,
};
use crate::services::validate_schedule;
use crate::state::ScheduleState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: NaiveDate,
}

/// Schedule writes are reserved to the doctor who owns them, or an admin.
fn require_schedule_owner(user: &User, doctor_id: Uuid) -> Result<Caller, AppError> {
    let caller = caller_from_user(user)?;
    if caller.is_doctor(doctor_id) || caller.role == CallerRole::Admin {
        Ok(caller)
    } else {
        Err(AppError::Forbidden(
            "Only the doctor can manage their own schedule".to_string(),
        ))
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

pub async fn validate_schedule_request(
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let schedule = WeeklySchedule::from_request(Uuid::nil(), request);
    let report = validate_schedule(&schedule);

    Ok(Json(json!({
        "valid": report.is_valid(),
        "issues": report.issues,
    })))
}

pub async fn get_available_slots(
    State(state): State<ScheduleState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .availability_service()
        .get_available_slots(doctor_id, query.from, query.to)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "total": slots.len(),
        "slots": slots,
    })))
}

pub async fn resolve_day_schedule(
    State(state): State<ScheduleState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Value>, AppError> {
    let day = state
        .availability_service()
        .resolve_day(doctor_id, query.date)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "schedule": day,
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

pub async fn create_schedule(
    State(state): State<ScheduleState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_schedule_owner(&user, doctor_id)?;

    let schedule = state
        .schedule_service()
        .create_schedule(doctor_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(schedule))))
}

pub async fn list_schedules(
    State(state): State<ScheduleState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    caller_from_user(&user)?;

    let schedules = state.schedule_service().list_schedules(doctor_id).await?;
    Ok(Json(json!(schedules)))
}

pub async fn set_default_schedule(
    State(state): State<ScheduleState>,
    Path((doctor_id, schedule_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_schedule_owner(&user, doctor_id)?;

    let schedule = state
        .schedule_service()
        .set_default_schedule(doctor_id, schedule_id)
        .await?;

    Ok(Json(json!(schedule)))
}

pub async fn create_exception(
    State(state): State<ScheduleState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateExceptionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_schedule_owner(&user, doctor_id)?;

    let exception = state
        .schedule_service()
        .create_exception(doctor_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(exception))))
}

pub async fn list_exceptions(
    State(state): State<ScheduleState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    caller_from_user(&user)?;

    let exceptions = state
        .schedule_service()
        .list_exceptions(doctor_id, query.from, query.to)
        .await?;

    Ok(Json(json!(exceptions)))
}

pub async fn delete_exception(
    State(state): State<ScheduleState>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    require_schedule_owner(&user, doctor_id)?;

    state.schedule_service().delete_exception(doctor_id, date).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn generate_slots(
    State(state): State<ScheduleState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    require_schedule_owner(&user, doctor_id)?;

    let duration = request
        .duration_minutes
        .unwrap_or(state.config.default_slot_duration_minutes);

    let summary = state
        .slot_generator()
        .generate(doctor_id, request.from_date, request.to_date, duration)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "from_date": request.from_date,
        "to_date": request.to_date,
        "duration_minutes": duration,
        "summary": summary,
        "generated_at": Utc::now().to_rfc3339(),
    })))
}
