use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use tokio_test::assert_ok;
use uuid::Uuid;

use schedule_cell::store::InMemoryScheduleStore;
use schedule_cell::*;
use shared_database::{DbError, RetryPolicy};

fn service(store: Arc<InMemoryScheduleStore>) -> ScheduleService {
    ScheduleService::new(store, RetryPolicy::new(3, Duration::from_millis(1)))
}

fn request(name: &str, make_default: bool) -> CreateScheduleRequest {
    let mut days = BTreeMap::new();
    days.insert(
        DayOfWeek::Wednesday,
        DaySchedule::working(
            vec![
                TimeRange::parse("14:00", "18:00").unwrap(),
                TimeRange::parse("08:00", "12:00").unwrap(),
            ],
            vec![],
        ),
    );
    CreateScheduleRequest {
        name: name.to_string(),
        timezone: "UTC".to_string(),
        effective_from: None,
        effective_to: None,
        days,
        make_default,
    }
}

fn christmas() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 25).unwrap()
}

#[tokio::test]
async fn first_schedule_becomes_default_and_shifts_are_ordered() {
    let service = service(Arc::new(InMemoryScheduleStore::new()));
    let doctor_id = Uuid::new_v4();

    let schedule = service.create_schedule(doctor_id, request("Main", false)).await.unwrap();

    assert!(schedule.is_default);
    let wednesday = schedule.day(DayOfWeek::Wednesday);
    assert_eq!(wednesday.shifts[0], TimeRange::parse("08:00", "12:00").unwrap());
    assert_eq!(service.get_default_schedule(doctor_id).await.unwrap().id, schedule.id);
}

#[tokio::test]
async fn switching_default_keeps_exactly_one() {
    let service = service(Arc::new(InMemoryScheduleStore::new()));
    let doctor_id = Uuid::new_v4();

    let first = service.create_schedule(doctor_id, request("Winter", false)).await.unwrap();
    let second = service.create_schedule(doctor_id, request("Summer", false)).await.unwrap();
    assert!(!second.is_default);

    service.set_default_schedule(doctor_id, second.id).await.unwrap();

    let schedules = service.list_schedules(doctor_id).await.unwrap();
    let defaults: Vec<Uuid> = schedules.iter().filter(|s| s.is_default).map(|s| s.id).collect();
    assert_eq!(defaults, vec![second.id]);
    assert!(!service.get_schedule(doctor_id, first.id).await.unwrap().is_default);
}

#[tokio::test]
async fn make_default_takes_over_pointer() {
    let service = service(Arc::new(InMemoryScheduleStore::new()));
    let doctor_id = Uuid::new_v4();

    service.create_schedule(doctor_id, request("Old", false)).await.unwrap();
    let latest = service.create_schedule(doctor_id, request("New", true)).await.unwrap();

    assert!(latest.is_default);
    assert_eq!(service.get_default_schedule(doctor_id).await.unwrap().id, latest.id);
}

#[tokio::test]
async fn another_doctors_schedule_cannot_become_default() {
    let service = service(Arc::new(InMemoryScheduleStore::new()));
    let owner = Uuid::new_v4();
    let schedule = service.create_schedule(owner, request("Main", false)).await.unwrap();

    let result = service.set_default_schedule(Uuid::new_v4(), schedule.id).await;
    assert_matches!(result, Err(ScheduleError::NotFound(_)));
}

#[tokio::test]
async fn invalid_schedule_is_rejected_with_every_issue() {
    let store = Arc::new(InMemoryScheduleStore::new());
    let service = service(store.clone());
    let doctor_id = Uuid::new_v4();

    let mut bad = request("", false);
    bad.timezone = String::new();
    bad.days.insert(DayOfWeek::Friday, DaySchedule::working(vec![], vec![]));

    let result = service.create_schedule(doctor_id, bad).await;
    assert_matches!(result, Err(ScheduleError::Validation(issues)) if issues.len() == 3);
    assert!(service.list_schedules(doctor_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn exceptions_are_unique_per_doctor_and_date() {
    let service = service(Arc::new(InMemoryScheduleStore::new()));
    let doctor_id = Uuid::new_v4();
    let holiday = || CreateExceptionRequest {
        date: christmas(),
        exception_type: ExceptionType::Holiday,
        modified_schedule: None,
        reason: Some("Christmas".to_string()),
    };

    assert_ok!(service.create_exception(doctor_id, holiday()).await);
    assert_matches!(
        service.create_exception(doctor_id, holiday()).await,
        Err(ScheduleError::Conflict(_))
    );

    // A different doctor may take the same date.
    assert_ok!(service.create_exception(Uuid::new_v4(), holiday()).await);

    let listed = service
        .list_exceptions(doctor_id, christmas(), christmas())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn deleting_exceptions() {
    let service = service(Arc::new(InMemoryScheduleStore::new()));
    let doctor_id = Uuid::new_v4();

    service
        .create_exception(
            doctor_id,
            CreateExceptionRequest {
                date: christmas(),
                exception_type: ExceptionType::Unavailable,
                modified_schedule: None,
                reason: None,
            },
        )
        .await
        .unwrap();

    assert_ok!(service.delete_exception(doctor_id, christmas()).await);
    assert_matches!(
        service.delete_exception(doctor_id, christmas()).await,
        Err(ScheduleError::NotFound(_))
    );
}

#[tokio::test]
async fn permission_errors_are_not_retried() {
    let store = Arc::new(InMemoryScheduleStore::new());
    let service = service(store.clone());
    let doctor_id = Uuid::new_v4();
    service.create_schedule(doctor_id, request("Main", false)).await.unwrap();

    store
        .failures
        .push("list_schedules", DbError::PermissionDenied("denied".to_string()));

    assert_matches!(
        service.list_schedules(doctor_id).await,
        Err(ScheduleError::Unauthorized(_))
    );
    // The queued failure was consumed by the single attempt.
    assert_eq!(service.list_schedules(doctor_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn exhausted_index_retries_surface_as_transient() {
    let store = Arc::new(InMemoryScheduleStore::new());
    let service = service(store.clone());
    let doctor_id = Uuid::new_v4();

    for _ in 0..3 {
        store
            .failures
            .push("list_exceptions", DbError::IndexNotReady("requires an index".to_string()));
    }

    assert_matches!(
        service.list_exceptions(doctor_id, christmas(), christmas()).await,
        Err(ScheduleError::TransientInfra(_))
    );
}
