// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use schedule_cell::time::hhmm;
use schedule_cell::Slot;
use shared_database::DbError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// A booking of one slot. Date and times are copied from the slot at booking
/// time and stay fixed even if the slot is later regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: u16,
    #[serde(with = "hhmm")]
    pub end_time: u16,
    pub duration_minutes: u16,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn from_slot(
        patient_id: Uuid,
        slot: &Slot,
        appointment_type: AppointmentType,
        notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: slot.doctor_id,
            slot_id: Some(slot.id),
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            duration_minutes: slot.duration_minutes,
            status: AppointmentStatus::Scheduled,
            appointment_type,
            notes,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move this appointment onto another slot, keeping its identity.
    pub fn adopt_slot(&mut self, slot: &Slot) {
        self.slot_id = Some(slot.id);
        self.date = slot.date;
        self.start_time = slot.start_time;
        self.end_time = slot.end_time;
        self.duration_minutes = slot.duration_minutes;
        self.updated_at = Utc::now();
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Whether this appointment is the rightful holder of `slot_id`.
    pub fn holds_slot(&self, slot_id: Uuid) -> bool {
        self.status.holds_slot() && self.slot_id == Some(slot_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Scheduled and confirmed appointments can still be moved or cancelled.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    /// Every status but cancelled keeps its slot booked, completed visits included.
    pub fn holds_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum AppointmentType {
    #[serde(alias = "general_consultation", alias = "consultation", alias = "general")]
    GeneralConsultation,

    #[serde(alias = "initial_consultation", alias = "initial", alias = "new_patient")]
    InitialConsultation,

    #[serde(alias = "follow_up_consultation", alias = "follow_up", alias = "followup")]
    FollowUpConsultation,

    #[serde(alias = "emergency_consultation", alias = "emergency", alias = "urgent")]
    EmergencyConsultation,

    #[serde(alias = "prescription_renewal", alias = "prescription")]
    PrescriptionRenewal,

    #[serde(alias = "specialty_consultation", alias = "specialist")]
    SpecialtyConsultation,

    #[serde(alias = "telehealth_checkin", alias = "telehealth", alias = "virtual")]
    TelehealthCheckIn,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::GeneralConsultation => write!(f, "GeneralConsultation"),
            AppointmentType::InitialConsultation => write!(f, "InitialConsultation"),
            AppointmentType::FollowUpConsultation => write!(f, "FollowUpConsultation"),
            AppointmentType::EmergencyConsultation => write!(f, "EmergencyConsultation"),
            AppointmentType::PrescriptionRenewal => write!(f, "PrescriptionRenewal"),
            AppointmentType::SpecialtyConsultation => write!(f, "SpecialtyConsultation"),
            AppointmentType::TelehealthCheckIn => write!(f, "TelehealthCheckIn"),
        }
    }
}

/// Precondition for a guarded appointment write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentGuard {
    pub status: AppointmentStatus,
    pub slot_id: Option<Uuid>,
}

impl AppointmentGuard {
    pub fn of(appointment: &Appointment) -> Self {
        Self {
            status: appointment.status,
            slot_id: appointment.slot_id,
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        appointment.status == self.status && appointment.slot_id == self.slot_id
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    /// Required when an admin books on a patient's behalf; patients book for themselves.
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub slot_id: Uuid,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_slot_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentStatusRequest {
    pub status: AppointmentStatus,
}

/// Outcome of a slot/appointment consistency pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub slots_checked: usize,
    pub appointments_checked: usize,
    /// Booked slots freed because no live appointment holds them.
    pub slots_released: Vec<Uuid>,
    /// Available slots re-linked to the live appointment referencing them.
    pub slots_relinked: Vec<Uuid>,
    pub unresolved: Vec<String>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.slots_released.is_empty() && self.slots_relinked.is_empty() && self.unresolved.is_empty()
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Slot not found")]
    SlotNotFound,

    #[error("Appointment slot not available")]
    SlotNotAvailable,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("A {0} appointment cannot be rescheduled")]
    NotReschedulable(AppointmentStatus),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store temporarily unavailable: {0}")]
    TransientInfra(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DbError> for AppointmentError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::PermissionDenied(_) => AppointmentError::Unauthorized,
            DbError::IndexNotReady(msg) | DbError::Unavailable(msg) => AppointmentError::TransientInfra(msg),
            DbError::Duplicate(msg) => AppointmentError::Conflict(msg),
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::SlotNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotNotAvailable | AppointmentError::Conflict(_) => AppError::Conflict(err.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::InvalidStatusTransition { .. } | AppointmentError::NotReschedulable(_) => {
                AppError::InvalidTransition(err.to_string())
            }
            AppointmentError::ValidationError(msg) => AppError::validation(msg.clone(), vec![msg]),
            AppointmentError::TransientInfra(msg) => AppError::Unavailable(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
