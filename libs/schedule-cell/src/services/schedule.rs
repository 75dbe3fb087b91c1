use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{with_retry, DbError, RetryPolicy};

use crate::models::{
    CreateExceptionRequest, CreateScheduleRequest, ScheduleError, ScheduleException,
    WeeklySchedule,
};
use crate::services::template::{validate_exception, validate_schedule};
use crate::store::ScheduleStore;

/// Resolve the doctor's default template through the pointer table.
pub(crate) async fn load_default_schedule(
    store: &dyn ScheduleStore,
    retry: &RetryPolicy,
    doctor_id: Uuid,
) -> Result<WeeklySchedule, ScheduleError> {
    let schedule_id = with_retry(retry, "default_schedule_id", || store.default_schedule_id(doctor_id))
        .await?
        .ok_or_else(|| ScheduleError::NotFound(format!("Default schedule for doctor {}", doctor_id)))?;

    let mut schedule = with_retry(retry, "get_schedule", || store.get_schedule(schedule_id))
        .await?
        .ok_or_else(|| ScheduleError::NotFound(format!("Schedule {}", schedule_id)))?;

    schedule.is_default = true;
    Ok(schedule)
}

fn normalize(schedule: &mut WeeklySchedule) {
    for day in schedule.days.values_mut() {
        day.shifts.sort_by_key(|shift| shift.start);
        day.breaks.sort_by_key(|b| b.start);
    }
}

pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
    retry: RetryPolicy,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Validate and save a template. The doctor's first schedule becomes the default.
    pub async fn create_schedule(
        &self,
        doctor_id: Uuid,
        request: CreateScheduleRequest,
    ) -> Result<WeeklySchedule, ScheduleError> {
        let make_default = request.make_default;
        let mut schedule = WeeklySchedule::from_request(doctor_id, request);
        validate_schedule(&schedule).into_result()?;
        normalize(&mut schedule);

        self.store.insert_schedule(&schedule).await?;

        let current_default = with_retry(&self.retry, "default_schedule_id", || {
            self.store.default_schedule_id(doctor_id)
        })
        .await?;

        if make_default || current_default.is_none() {
            self.store.set_default_schedule(doctor_id, schedule.id).await?;
            schedule.is_default = true;
        }

        info!("Created schedule {} for doctor {}", schedule.id, doctor_id);
        Ok(schedule)
    }

    pub async fn list_schedules(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, ScheduleError> {
        let default_id = with_retry(&self.retry, "default_schedule_id", || {
            self.store.default_schedule_id(doctor_id)
        })
        .await?;

        let mut schedules = with_retry(&self.retry, "list_schedules", || self.store.list_schedules(doctor_id)).await?;
        for schedule in &mut schedules {
            schedule.is_default = Some(schedule.id) == default_id;
        }
        Ok(schedules)
    }

    pub async fn get_schedule(&self, doctor_id: Uuid, schedule_id: Uuid) -> Result<WeeklySchedule, ScheduleError> {
        let mut schedule = with_retry(&self.retry, "get_schedule", || self.store.get_schedule(schedule_id))
            .await?
            .filter(|s| s.doctor_id == doctor_id)
            .ok_or_else(|| ScheduleError::NotFound(format!("Schedule {}", schedule_id)))?;

        let default_id = with_retry(&self.retry, "default_schedule_id", || {
            self.store.default_schedule_id(doctor_id)
        })
        .await?;
        schedule.is_default = Some(schedule.id) == default_id;
        Ok(schedule)
    }

    pub async fn get_default_schedule(&self, doctor_id: Uuid) -> Result<WeeklySchedule, ScheduleError> {
        load_default_schedule(self.store.as_ref(), &self.retry, doctor_id).await
    }

    /// Repoint the doctor's default. A single write, so there is never a
    /// moment with two defaults.
    pub async fn set_default_schedule(
        &self,
        doctor_id: Uuid,
        schedule_id: Uuid,
    ) -> Result<WeeklySchedule, ScheduleError> {
        let mut schedule = self.get_schedule(doctor_id, schedule_id).await?;
        self.store.set_default_schedule(doctor_id, schedule_id).await?;
        schedule.is_default = true;

        info!("Doctor {} default schedule is now {}", doctor_id, schedule_id);
        Ok(schedule)
    }

    pub async fn create_exception(
        &self,
        doctor_id: Uuid,
        request: CreateExceptionRequest,
    ) -> Result<ScheduleException, ScheduleError> {
        let mut exception = ScheduleException::from_request(doctor_id, request);
        validate_exception(&exception).into_result()?;
        if let Some(day) = exception.modified_schedule.as_mut() {
            day.shifts.sort_by_key(|shift| shift.start);
            day.breaks.sort_by_key(|b| b.start);
        }

        match self.store.insert_exception(&exception).await {
            Ok(()) => {}
            Err(DbError::Duplicate(_)) => {
                return Err(ScheduleError::Conflict(format!(
                    "Doctor already has an exception on {}",
                    exception.date
                )))
            }
            Err(err) => return Err(err.into()),
        }

        debug!(
            "Created {} exception for doctor {} on {}",
            exception.exception_type, doctor_id, exception.date
        );
        Ok(exception)
    }

    pub async fn list_exceptions(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ScheduleException>, ScheduleError> {
        if from > to {
            return Err(ScheduleError::invalid("to", "End date must not precede start date"));
        }
        let exceptions = with_retry(&self.retry, "list_exceptions", || {
            self.store.list_exceptions(doctor_id, from, to)
        })
        .await?;
        Ok(exceptions)
    }

    pub async fn delete_exception(&self, doctor_id: Uuid, date: NaiveDate) -> Result<(), ScheduleError> {
        if self.store.delete_exception(doctor_id, date).await? {
            Ok(())
        } else {
            Err(ScheduleError::NotFound(format!("Exception on {}", date)))
        }
    }
}
