use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::ScheduleState;

pub fn schedule_routes(state: ScheduleState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/validate", post(handlers::validate_schedule_request))
        .route("/doctors/{doctor_id}/slots", get(handlers::get_available_slots))
        .route("/doctors/{doctor_id}/day", get(handlers::resolve_day_schedule));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route(
            "/doctors/{doctor_id}",
            post(handlers::create_schedule).get(handlers::list_schedules),
        )
        .route(
            "/doctors/{doctor_id}/default/{schedule_id}",
            put(handlers::set_default_schedule),
        )
        .route(
            "/doctors/{doctor_id}/exceptions",
            post(handlers::create_exception).get(handlers::list_exceptions),
        )
        .route(
            "/doctors/{doctor_id}/exceptions/{date}",
            delete(handlers::delete_exception),
        )
        .route(
            "/doctors/{doctor_id}/slots/generate",
            post(handlers::generate_slots),
        )
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
