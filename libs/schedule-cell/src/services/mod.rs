pub mod availability;
pub mod generator;
pub mod overlay;
pub mod schedule;
pub mod template;

pub use availability::AvailabilityService;
pub use generator::{plan_day_slots, SlotGenerator};
pub use overlay::effective_day;
pub use schedule::ScheduleService;
pub use template::{validate_exception, validate_schedule};
