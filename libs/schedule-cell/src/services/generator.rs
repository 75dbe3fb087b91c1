use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shared_database::{with_retry, RetryPolicy};

use crate::models::{
    DaySchedule, GenerationSummary, ScheduleError, ScheduleException, Slot, SlotStatus, TimeRange,
};
use crate::services::overlay::effective_day;
use crate::services::schedule::load_default_schedule;
use crate::store::{ScheduleStore, SlotStore};
use crate::time::{dates_in_range, days_in_range, MINUTES_PER_DAY};

/// Candidate slots for one day.
///
/// Each shift is walked from its start in `duration` steps; a candidate is
/// kept only if it ends within the shift and intersects neither a break nor
/// a `reserved` range (slots that survive regeneration).
pub fn plan_day_slots(
    doctor_id: Uuid,
    date: NaiveDate,
    day: &DaySchedule,
    duration: u16,
    reserved: &[TimeRange],
) -> Vec<Slot> {
    if !day.is_working || duration == 0 {
        return Vec::new();
    }

    let mut shifts = day.shifts.clone();
    shifts.sort_by_key(|shift| shift.start);

    let mut slots = Vec::new();
    for shift in shifts {
        let mut cursor = shift.start;
        while cursor + duration <= shift.end {
            let candidate = TimeRange::new(cursor, cursor + duration);
            let blocked = day.breaks.iter().any(|b| b.overlaps(&candidate))
                || reserved.iter().any(|r| r.overlaps(&candidate));
            if !blocked {
                slots.push(Slot::available(doctor_id, date, candidate));
            }
            cursor += duration;
        }
    }
    slots
}

pub struct SlotGenerator {
    schedules: Arc<dyn ScheduleStore>,
    slots: Arc<dyn SlotStore>,
    retry: RetryPolicy,
    batch_size: usize,
    max_days: u32,
}

impl SlotGenerator {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        slots: Arc<dyn SlotStore>,
        retry: RetryPolicy,
        batch_size: usize,
        max_days: u32,
    ) -> Self {
        Self {
            schedules,
            slots,
            retry,
            batch_size: batch_size.max(1),
            max_days,
        }
    }

    fn check_request(&self, from: NaiveDate, to: NaiveDate, duration_minutes: u32) -> Result<(), ScheduleError> {
        if from > to {
            return Err(ScheduleError::invalid("to_date", "End date must not precede start date"));
        }
        if duration_minutes == 0 || duration_minutes >= u32::from(MINUTES_PER_DAY) {
            return Err(ScheduleError::invalid(
                "duration_minutes",
                "Slot duration must be between 1 and 1439 minutes",
            ));
        }
        if days_in_range(from, to) > i64::from(self.max_days) {
            return Err(ScheduleError::invalid(
                "to_date",
                format!("Cannot generate more than {} days at once", self.max_days),
            ));
        }
        Ok(())
    }

    /// Regenerates the doctor's slots for `[from, to]`.
    ///
    /// Booked slots are kept, and every slot still present after the clear
    /// blocks any overlapping candidate. Only the clearing step tolerates a
    /// transient store failure.
    #[instrument(skip(self), fields(doctor_id = %doctor_id))]
    pub async fn generate(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        duration_minutes: u32,
    ) -> Result<GenerationSummary, ScheduleError> {
        self.check_request(from, to, duration_minutes)?;
        let duration = duration_minutes as u16;
        let mut summary = GenerationSummary::default();

        match with_retry(&self.retry, "delete_unbooked_slots", || {
            self.slots.delete_unbooked_slots(doctor_id, from, to)
        })
        .await
        {
            Ok(cleared) => summary.slots_cleared = cleared,
            Err(err) if err.is_retryable() => {
                warn!("Could not clear stale slots for {}..{}, continuing: {}", from, to, err);
            }
            Err(err) => return Err(err.into()),
        }

        let schedule = load_default_schedule(self.schedules.as_ref(), &self.retry, doctor_id).await?;

        let exceptions: HashMap<NaiveDate, ScheduleException> = with_retry(&self.retry, "list_exceptions", || {
            self.schedules.list_exceptions(doctor_id, from, to)
        })
        .await?
        .into_iter()
        .map(|exception| (exception.date, exception))
        .collect();

        // Everything that survived the clear is reserved, whatever its status
        // is now. A cancel landing after the clear leaves an available slot behind.
        let survivors = with_retry(&self.retry, "list_slots", || {
            self.slots.list_slots(doctor_id, from, to, None)
        })
        .await?;
        summary.slots_preserved = survivors.iter().filter(|s| s.status == SlotStatus::Booked).count();

        let mut reserved: HashMap<NaiveDate, Vec<TimeRange>> = HashMap::new();
        for slot in &survivors {
            reserved.entry(slot.date).or_default().push(slot.range());
        }

        let mut planned = Vec::new();
        for date in dates_in_range(from, to) {
            summary.days_considered += 1;
            let day = effective_day(&schedule, exceptions.get(&date), date);
            if !day.is_working {
                continue;
            }
            summary.working_days += 1;

            let reserved_today = reserved.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            planned.extend(plan_day_slots(doctor_id, date, &day, duration, reserved_today));
        }

        debug!(
            "Planned {} slots over {} working days",
            planned.len(),
            summary.working_days
        );

        for (index, batch) in planned.chunks(self.batch_size).enumerate() {
            let inserted = with_retry(&self.retry, "insert_slots", || self.slots.insert_slots(batch))
                .await
                .map_err(|err| {
                    error!(
                        "Slot batch {} failed after {} slots written: {}",
                        index + 1,
                        summary.slots_created,
                        err
                    );
                    ScheduleError::from(err)
                })?;
            summary.slots_created += inserted;
        }

        info!(
            "Generated {} slots for {}..{} ({} cleared, {} booked preserved)",
            summary.slots_created, from, to, summary.slots_cleared, summary.slots_preserved
        );

        Ok(summary)
    }
}
