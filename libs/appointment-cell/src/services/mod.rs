pub mod booking;
pub mod lifecycle;
pub mod reconciliation;
mod slot_write;

pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use reconciliation::ReconciliationService;
