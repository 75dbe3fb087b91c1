// libs/appointment-cell/src/handlers.rs
use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{CallerRole, User};
use shared_models::error::AppError;
use shared_utils::extractor::caller_from_user;

use crate::models::{
    BookAppointmentRequest, CancelAppointmentRequest, RescheduleAppointmentRequest,
    UpdateAppointmentStatusRequest,
};
use crate::state::AppointmentState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

// ==============================================================================
// BOOKING LIFECYCLE HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let caller = caller_from_user(&user)?;

    // Patients book for themselves; admins must name the patient.
    let patient_id = match (caller.role, request.patient_id) {
        (CallerRole::Patient, None) => caller.id,
        (CallerRole::Patient, Some(id)) if id == caller.id => caller.id,
        (CallerRole::Admin, Some(id)) => id,
        (CallerRole::Admin, None) => {
            return Err(AppError::BadRequest("patient_id is required".to_string()))
        }
        _ => {
            return Err(AppError::Forbidden(
                "Not authorized to book appointment for this patient".to_string(),
            ))
        }
    };

    let appointment = state
        .booking_service()
        .book_appointment(patient_id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "appointment_id": appointment.id,
            "appointment": appointment,
        })),
    ))
}

pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from_user(&user)?;
    let appointment = state
        .booking_service()
        .get_appointment(appointment_id, caller)
        .await?;

    Ok(Json(json!(appointment)))
}

pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from_user(&user)?;

    // The body is optional; an empty one cancels without a reason.
    let request: CancelAppointmentRequest = if body.is_empty() {
        CancelAppointmentRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid cancellation body: {}", e)))?
    };
    let reason = request.reason;

    let appointment = state
        .booking_service()
        .cancel_appointment(appointment_id, caller, reason)
        .await?;

    Ok(Json(json!({
        "message": "Appointment cancelled",
        "appointment": appointment,
    })))
}

pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from_user(&user)?;
    let appointment = state
        .booking_service()
        .reschedule_appointment(appointment_id, request.new_slot_id, caller)
        .await?;

    Ok(Json(json!(appointment)))
}

pub async fn update_appointment_status(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from_user(&user)?;
    let appointment = state
        .booking_service()
        .update_status(appointment_id, request.status, caller)
        .await?;

    Ok(Json(json!(appointment)))
}

pub async fn get_doctor_appointments(
    State(state): State<AppointmentState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from_user(&user)?;
    let appointments = state
        .booking_service()
        .list_doctor_appointments(doctor_id, query.from, query.to, caller)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "total": appointments.len(),
        "appointments": appointments,
    })))
}

// ==============================================================================
// SLOT HOLDS AND MAINTENANCE
// ==============================================================================

pub async fn block_slot(
    State(state): State<AppointmentState>,
    Path(slot_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from_user(&user)?;
    let slot = state.booking_service().block_slot(slot_id, caller).await?;
    Ok(Json(json!(slot)))
}

pub async fn unblock_slot(
    State(state): State<AppointmentState>,
    Path(slot_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from_user(&user)?;
    let slot = state.booking_service().unblock_slot(slot_id, caller).await?;
    Ok(Json(json!(slot)))
}

pub async fn reconcile_doctor_slots(
    State(state): State<AppointmentState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = caller_from_user(&user)?;
    if !caller.is_doctor(doctor_id) && caller.role != CallerRole::Admin {
        return Err(AppError::Forbidden(
            "Only the doctor or an admin can reconcile slots".to_string(),
        ));
    }

    let report = state
        .reconciliation_service()
        .reconcile(doctor_id, query.from, query.to)
        .await?;

    Ok(Json(json!(report)))
}
