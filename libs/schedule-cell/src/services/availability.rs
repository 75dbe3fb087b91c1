use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use shared_database::{with_retry, RetryPolicy};

use crate::models::{DaySchedule, ScheduleError, Slot, SlotStatus};
use crate::services::overlay::effective_day;
use crate::services::schedule::load_default_schedule;
use crate::store::{ScheduleStore, SlotStore};
use crate::time::days_in_range;

/// Widest slot listing accepted unless configured otherwise.
pub const DEFAULT_MAX_RANGE_DAYS: u32 = 92;

/// Read side: effective days and bookable slots.
pub struct AvailabilityService {
    schedules: Arc<dyn ScheduleStore>,
    slots: Arc<dyn SlotStore>,
    retry: RetryPolicy,
    max_days: u32,
}

impl AvailabilityService {
    pub fn new(schedules: Arc<dyn ScheduleStore>, slots: Arc<dyn SlotStore>, retry: RetryPolicy) -> Self {
        Self {
            schedules,
            slots,
            retry,
            max_days: DEFAULT_MAX_RANGE_DAYS,
        }
    }

    pub fn with_max_days(mut self, max_days: u32) -> Self {
        self.max_days = max_days;
        self
    }

    pub async fn resolve_day(&self, doctor_id: Uuid, date: NaiveDate) -> Result<DaySchedule, ScheduleError> {
        let schedule = load_default_schedule(self.schedules.as_ref(), &self.retry, doctor_id).await?;
        let exception = with_retry(&self.retry, "get_exception", || {
            self.schedules.get_exception(doctor_id, date)
        })
        .await?;

        Ok(effective_day(&schedule, exception.as_ref(), date))
    }

    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, ScheduleError> {
        if from > to {
            return Err(ScheduleError::invalid("to", "End date must not precede start date"));
        }
        if days_in_range(from, to) > i64::from(self.max_days) {
            return Err(ScheduleError::invalid(
                "to",
                format!("Cannot list more than {} days at once", self.max_days),
            ));
        }

        let slots = with_retry(&self.retry, "list_slots", || {
            self.slots.list_slots(doctor_id, from, to, Some(SlotStatus::Available))
        })
        .await?;

        debug!("Found {} available slots for doctor {}", slots.len(), doctor_id);
        Ok(slots)
    }
}
