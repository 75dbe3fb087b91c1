// libs/schedule-cell/src/models.rs
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;

use crate::time::{format_hhmm, hhmm, parse_hhmm, TimeParseError};

// ==============================================================================
// TIME RANGES AND DAYS
// ==============================================================================

/// Half-open interval `[start, end)` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "hhmm")]
    pub start: u16,
    #[serde(with = "hhmm")]
    pub end: u16,
}

impl TimeRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, TimeParseError> {
        Ok(Self::new(parse_hhmm(start)?, parse_hhmm(end)?))
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_well_formed(&self) -> bool {
        self.start < self.end && self.end < crate::time::MINUTES_PER_DAY
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_hhmm(self.start), format_hhmm(self.end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        };
        f.write_str(name)
    }
}

/// Working pattern for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub is_working: bool,
    #[serde(default)]
    pub shifts: Vec<TimeRange>,
    #[serde(default)]
    pub breaks: Vec<TimeRange>,
}

impl DaySchedule {
    pub fn non_working() -> Self {
        Self {
            is_working: false,
            shifts: Vec::new(),
            breaks: Vec::new(),
        }
    }

    pub fn working(shifts: Vec<TimeRange>, breaks: Vec<TimeRange>) -> Self {
        Self {
            is_working: true,
            shifts,
            breaks,
        }
    }
}

impl Default for DaySchedule {
    fn default() -> Self {
        Self::non_working()
    }
}

// ==============================================================================
// WEEKLY SCHEDULE TEMPLATE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub name: String,
    /// Derived from the doctor's default pointer; not authoritative in storage.
    #[serde(default)]
    pub is_default: bool,
    pub timezone: String,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub days: BTreeMap<DayOfWeek, DaySchedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeeklySchedule {
    pub fn from_request(doctor_id: Uuid, request: CreateScheduleRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            name: request.name,
            is_default: false,
            timezone: request.timezone,
            effective_from: request.effective_from.unwrap_or(now),
            effective_to: request.effective_to,
            days: request.days,
            created_at: now,
            updated_at: now,
        }
    }

    /// The template for a weekday; days missing from the map are non-working.
    pub fn day(&self, day: DayOfWeek) -> DaySchedule {
        self.days.get(&day).cloned().unwrap_or_default()
    }

    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        if date < self.effective_from.date_naive() {
            return false;
        }
        match self.effective_to {
            Some(end) => date <= end.date_naive(),
            None => true,
        }
    }
}

// ==============================================================================
// EXCEPTION OVERLAY
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionType {
    Unavailable,
    Holiday,
    ModifiedHours,
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionType::Unavailable => write!(f, "unavailable"),
            ExceptionType::Holiday => write!(f, "holiday"),
            ExceptionType::ModifiedHours => write!(f, "modified_hours"),
        }
    }
}

/// Date-specific override of the weekly template, unique per `(doctor_id, date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleException {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub exception_type: ExceptionType,
    pub modified_schedule: Option<DaySchedule>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScheduleException {
    pub fn from_request(doctor_id: Uuid, request: CreateExceptionRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            date: request.date,
            exception_type: request.exception_type,
            modified_schedule: request.modified_schedule,
            reason: request.reason,
            created_at: Utc::now(),
        }
    }
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Blocked,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Booked => write!(f, "booked"),
            SlotStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// A materialized bookable unit; `appointment_id` is set iff `status == Booked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: u16,
    #[serde(with = "hhmm")]
    pub end_time: u16,
    pub duration_minutes: u16,
    pub status: SlotStatus,
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn available(doctor_id: Uuid, date: NaiveDate, range: TimeRange) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            date,
            start_time: range.start,
            end_time: range.end,
            duration_minutes: range.duration_minutes(),
            status: SlotStatus::Available,
            appointment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }

    /// Natural key: one slot per doctor, date and start minute.
    pub fn natural_key(&self) -> (Uuid, NaiveDate, u16) {
        (self.doctor_id, self.date, self.start_time)
    }
}

/// Guarded slot write: applied only while the slot still matches `expected_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTransition {
    pub expected_status: SlotStatus,
    pub expected_appointment: Option<Uuid>,
    pub new_status: SlotStatus,
    pub new_appointment: Option<Uuid>,
}

impl SlotTransition {
    pub fn book(appointment_id: Uuid) -> Self {
        Self {
            expected_status: SlotStatus::Available,
            expected_appointment: None,
            new_status: SlotStatus::Booked,
            new_appointment: Some(appointment_id),
        }
    }

    pub fn release(appointment_id: Uuid) -> Self {
        Self {
            expected_status: SlotStatus::Booked,
            expected_appointment: Some(appointment_id),
            new_status: SlotStatus::Available,
            new_appointment: None,
        }
    }

    pub fn block() -> Self {
        Self {
            expected_status: SlotStatus::Available,
            expected_appointment: None,
            new_status: SlotStatus::Blocked,
            new_appointment: None,
        }
    }

    pub fn unblock() -> Self {
        Self {
            expected_status: SlotStatus::Blocked,
            expected_appointment: None,
            new_status: SlotStatus::Available,
            new_appointment: None,
        }
    }

    pub fn matches(&self, slot: &Slot) -> bool {
        slot.status == self.expected_status && slot.appointment_id == self.expected_appointment
    }

    /// True when the slot already reflects this transition's outcome.
    pub fn is_applied_to(&self, slot: &Slot) -> bool {
        slot.status == self.new_status && slot.appointment_id == self.new_appointment
    }

    pub fn apply(&self, slot: &mut Slot) {
        slot.status = self.new_status;
        slot.appointment_id = self.new_appointment;
        slot.updated_at = Utc::now();
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    pub timezone: String,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub days: BTreeMap<DayOfWeek, DaySchedule>,
    #[serde(default)]
    pub make_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExceptionRequest {
    pub date: NaiveDate,
    pub exception_type: ExceptionType,
    pub modified_schedule: Option<DaySchedule>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSlotsRequest {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub days_considered: u32,
    pub working_days: u32,
    pub slots_cleared: usize,
    pub slots_preserved: usize,
    pub slots_created: usize,
}

// ==============================================================================
// VALIDATION AND ERRORS
// ==============================================================================

/// One rule violation, scoped to a field or weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub scope: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, scope: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::new(scope, message));
    }

    pub fn into_result(self) -> Result<(), ScheduleError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ScheduleError::Validation(self.issues))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Validation failed with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Store temporarily unavailable: {0}")]
    TransientInfra(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl ScheduleError {
    pub fn invalid(scope: impl Into<String>, message: impl Into<String>) -> Self {
        ScheduleError::Validation(vec![ValidationIssue::new(scope, message)])
    }
}

impl From<DbError> for ScheduleError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::PermissionDenied(msg) => ScheduleError::Unauthorized(msg),
            DbError::IndexNotReady(msg) | DbError::Unavailable(msg) => ScheduleError::TransientInfra(msg),
            DbError::NotFound(msg) => ScheduleError::NotFound(msg),
            DbError::Duplicate(msg) => ScheduleError::Conflict(msg),
            other => ScheduleError::Database(other.to_string()),
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Validation(issues) => AppError::validation(
                "Schedule validation failed",
                issues.iter().map(ToString::to_string).collect(),
            ),
            ScheduleError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            ScheduleError::Conflict(msg) => AppError::Conflict(msg),
            ScheduleError::Unauthorized(msg) => AppError::Forbidden(msg),
            ScheduleError::TransientInfra(msg) => AppError::Unavailable(msg),
            ScheduleError::Database(msg) => AppError::Database(msg),
        }
    }
}
