//! Weekly schedule template rules.
//!
//! Every rule runs and every violation is collected; callers get the full
//! list instead of the first failure.

use crate::models::{
    DayOfWeek, DaySchedule, ExceptionType, ScheduleException, TimeRange, ValidationReport,
    WeeklySchedule,
};

pub fn validate_schedule(schedule: &WeeklySchedule) -> ValidationReport {
    let mut report = ValidationReport::default();

    if schedule.name.trim().is_empty() {
        report.push("name", "Schedule name is required");
    }
    if schedule.timezone.trim().is_empty() {
        report.push("timezone", "Timezone is required");
    }
    if let Some(effective_to) = schedule.effective_to {
        if effective_to < schedule.effective_from {
            report.push("effective_to", "Effective end must not precede effective start");
        }
    }

    for day in DayOfWeek::ALL {
        if let Some(day_schedule) = schedule.days.get(&day) {
            validate_day(&day.to_string(), day_schedule, &mut report);
        }
    }

    report
}

pub fn validate_exception(exception: &ScheduleException) -> ValidationReport {
    let mut report = ValidationReport::default();
    let scope = exception.date.to_string();

    match (exception.exception_type, &exception.modified_schedule) {
        (ExceptionType::ModifiedHours, Some(day)) => validate_day(&scope, day, &mut report),
        (ExceptionType::ModifiedHours, None) => {
            report.push(scope, "Modified hours exception requires a modified schedule")
        }
        (other, Some(_)) => report.push(
            scope,
            format!("A {} exception must not carry a modified schedule", other),
        ),
        (_, None) => {}
    }

    report
}

/// Rules for a single day, reported under `scope`.
pub fn validate_day(scope: &str, day: &DaySchedule, report: &mut ValidationReport) {
    if !day.is_working {
        if !day.shifts.is_empty() || !day.breaks.is_empty() {
            report.push(scope, "Non-working day must not define shifts or breaks");
        }
        return;
    }

    if day.shifts.is_empty() {
        report.push(scope, "Working day requires at least one shift");
    }

    let mut sorted: Vec<&TimeRange> = day.shifts.iter().collect();
    sorted.sort_by_key(|shift| shift.start);
    for pair in sorted.windows(2) {
        if pair[0].end > pair[1].start {
            report.push(
                scope,
                format!("Shifts {} and {} overlap", pair[0], pair[1]),
            );
        }
    }

    for shift in &day.shifts {
        if !shift.is_well_formed() {
            report.push(scope, format!("Shift {} must start before it ends", shift));
        }
    }

    for break_range in &day.breaks {
        if !break_range.is_well_formed() {
            report.push(scope, format!("Break {} must start before it ends", break_range));
        } else if !day.shifts.iter().any(|shift| shift.contains(break_range)) {
            report.push(
                scope,
                format!("Break {} does not fall within any shift", break_range),
            );
        }
    }
}
