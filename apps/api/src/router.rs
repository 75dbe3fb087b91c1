use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use appointment_cell::AppointmentState;
use schedule_cell::router::schedule_routes;
use schedule_cell::ScheduleState;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let schedule_state = ScheduleState::from_config(config.clone());
    // Booking must see the slots the generator writes.
    let appointment_state = AppointmentState::from_config(config, schedule_state.slots.clone());

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/schedules", schedule_routes(schedule_state))
        .nest("/appointments", appointment_routes(appointment_state))
}
