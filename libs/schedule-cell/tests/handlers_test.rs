// libs/schedule-cell/tests/handlers_test.rs
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use schedule_cell::router::schedule_routes;
use schedule_cell::ScheduleState;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn app() -> Router {
    schedule_routes(ScheduleState::in_memory(TestConfig::default().to_arc()))
}

fn weekday_body(make_default: bool) -> Value {
    let working = json!({
        "is_working": true,
        "shifts": [{"start": "09:00", "end": "17:00"}],
        "breaks": [{"start": "12:00", "end": "13:00"}]
    });
    json!({
        "name": "Weekdays",
        "timezone": "Europe/London",
        "effective_from": "2024-01-01T00:00:00Z",
        "days": {
            "monday": working,
            "tuesday": working,
            "wednesday": working,
            "thursday": working,
            "friday": working,
            "saturday": {"is_working": false},
            "sunday": {"is_working": false}
        },
        "make_default": make_default
    })
}

async fn send(app: &Router, method: Method, uri: &str, auth: Option<&TestUser>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = auth {
        builder = builder.header(header::AUTHORIZATION, JwtTestUtils::bearer(user));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn validate_reports_every_issue_without_auth() {
    let app = app();
    let mut body = weekday_body(false);
    body["name"] = json!("");
    body["days"]["monday"]["breaks"] = json!([{"start": "18:00", "end": "18:30"}]);

    let (status, value) = send(&app, Method::POST, "/validate", None, Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["valid"], json!(false));
    assert_eq!(value["issues"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn doctor_sets_up_schedule_and_generates_slots() {
    let app = app();
    let doctor = TestUser::doctor("doc@example.com");
    let base = format!("/doctors/{}", doctor.id);

    let (status, schedule) = send(&app, Method::POST, &base, Some(&doctor), Some(weekday_body(true))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(schedule["is_default"], json!(true));

    let (status, generated) = send(
        &app,
        Method::POST,
        &format!("{}/slots/generate", base),
        Some(&doctor),
        Some(json!({"from_date": "2024-05-06", "to_date": "2024-05-06"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(generated["duration_minutes"], json!(30));
    assert_eq!(generated["summary"]["slots_created"], json!(14));

    let (status, slots) = send(
        &app,
        Method::GET,
        &format!("{}/slots?from=2024-05-06&to=2024-05-06", base),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slots["total"], json!(14));
    assert_eq!(slots["slots"][0]["start_time"], json!("09:00"));
    assert_eq!(slots["slots"][0]["status"], json!("available"));
}

#[tokio::test]
async fn holiday_exception_shows_in_resolved_day() {
    let app = app();
    let doctor = TestUser::doctor("doc@example.com");
    let base = format!("/doctors/{}", doctor.id);
    send(&app, Method::POST, &base, Some(&doctor), Some(weekday_body(true))).await;

    let exception = json!({"date": "2024-05-06", "exception_type": "holiday", "reason": "Bank holiday"});
    let (status, _) = send(&app, Method::POST, &format!("{}/exceptions", base), Some(&doctor), Some(exception.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::POST, &format!("{}/exceptions", base), Some(&doctor), Some(exception)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], json!("conflict"));

    let (_, day) = send(&app, Method::GET, &format!("{}/day?date=2024-05-06", base), None, None).await;
    assert_eq!(day["schedule"]["is_working"], json!(false));

    let (status, _) = send(&app, Method::DELETE, &format!("{}/exceptions/2024-05-06", base), Some(&doctor), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, day) = send(&app, Method::GET, &format!("{}/day?date=2024-05-06", base), None, None).await;
    assert_eq!(day["schedule"]["is_working"], json!(true));
    assert_eq!(day["schedule"]["shifts"][0]["start"], json!("09:00"));
}

#[tokio::test]
async fn invalid_schedule_returns_validation_details() {
    let app = app();
    let doctor = TestUser::doctor("doc@example.com");
    let mut body = weekday_body(true);
    body["days"]["tuesday"]["shifts"] = json!([
        {"start": "09:00", "end": "13:00"},
        {"start": "12:00", "end": "17:00"}
    ]);

    let (status, value) = send(&app, Method::POST, &format!("/doctors/{}", doctor.id), Some(&doctor), Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["kind"], json!("validation"));
    assert!(value["details"][0].as_str().unwrap().starts_with("tuesday"));
}

#[tokio::test]
async fn other_doctors_cannot_manage_the_schedule() {
    let app = app();
    let owner = TestUser::doctor("owner@example.com");
    let intruder = TestUser::doctor("other@example.com");
    let patient = TestUser::patient("patient@example.com");
    let uri = format!("/doctors/{}", owner.id);

    let (status, _) = send(&app, Method::POST, &uri, Some(&intruder), Some(weekday_body(true))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::POST, &uri, Some(&patient), Some(weekday_body(true))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::POST, &uri, None, Some(weekday_body(true))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn switching_default_through_the_api() {
    let app = app();
    let doctor = TestUser::doctor("doc@example.com");
    let base = format!("/doctors/{}", doctor.id);

    let (_, first) = send(&app, Method::POST, &base, Some(&doctor), Some(weekday_body(true))).await;
    let (_, second) = send(&app, Method::POST, &base, Some(&doctor), Some(weekday_body(false))).await;
    assert_eq!(second["is_default"], json!(false));

    let second_id = second["id"].as_str().unwrap();
    let (status, _) = send(&app, Method::PUT, &format!("{}/default/{}", base, second_id), Some(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = send(&app, Method::GET, &base, Some(&doctor), None).await;
    let defaults: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["is_default"] == json!(true))
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(defaults, vec![second_id]);
    assert_ne!(first["id"].as_str().unwrap(), second_id);
}

#[tokio::test]
async fn resolving_a_day_without_default_schedule_is_not_found() {
    let app = app();
    let doctor = TestUser::doctor("doc@example.com");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/doctors/{}/day?date=2024-05-06", doctor.id),
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], json!("not_found"));
}

#[tokio::test]
async fn slot_listing_rejects_unbounded_ranges() {
    let app = app();
    let doctor = TestUser::doctor("doc@example.com");

    let (status, value) = send(
        &app,
        Method::GET,
        &format!("/doctors/{}/slots?from=2024-05-06&to=2124-05-06", doctor.id),
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["kind"], json!("validation"));
}
