use chrono::NaiveDate;

use crate::models::{DaySchedule, ExceptionType, ScheduleException, WeeklySchedule};
use crate::time::day_of_week;

/// Effective working pattern for `date`.
///
/// An exception always wins over the weekly template. Without one, dates
/// outside the template's effective window are non-working.
pub fn effective_day(
    schedule: &WeeklySchedule,
    exception: Option<&ScheduleException>,
    date: NaiveDate,
) -> DaySchedule {
    match exception {
        Some(exception) => match exception.exception_type {
            ExceptionType::Unavailable | ExceptionType::Holiday => DaySchedule::non_working(),
            ExceptionType::ModifiedHours => exception
                .modified_schedule
                .clone()
                .unwrap_or_else(DaySchedule::non_working),
        },
        None if schedule.is_effective_on(date) => schedule.day(day_of_week(date)),
        None => DaySchedule::non_working(),
    }
}
