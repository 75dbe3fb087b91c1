// libs/schedule-cell/tests/generator_test.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use schedule_cell::store::{InMemoryScheduleStore, InMemorySlotStore};
use schedule_cell::time::format_hhmm;
use schedule_cell::*;
use shared_database::{DbError, RetryPolicy};

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

fn range(start: &str, end: &str) -> TimeRange {
    TimeRange::parse(start, end).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
}

fn weekday_template() -> CreateScheduleRequest {
    let mut days = BTreeMap::new();
    for day in [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
    ] {
        days.insert(
            day,
            DaySchedule::working(vec![range("09:00", "17:00")], vec![range("12:00", "13:00")]),
        );
    }
    days.insert(DayOfWeek::Saturday, DaySchedule::non_working());
    days.insert(DayOfWeek::Sunday, DaySchedule::non_working());

    CreateScheduleRequest {
        name: "Weekdays".to_string(),
        timezone: "Europe/London".to_string(),
        effective_from: Some("2024-01-01T00:00:00Z".parse().unwrap()),
        effective_to: None,
        days,
        make_default: true,
    }
}

struct Fixture {
    doctor_id: Uuid,
    schedules: Arc<InMemoryScheduleStore>,
    slots: Arc<InMemorySlotStore>,
}

impl Fixture {
    async fn with_default_template() -> Self {
        let fixture = Self::empty();
        fixture
            .schedule_service()
            .create_schedule(fixture.doctor_id, weekday_template())
            .await
            .unwrap();
        fixture
    }

    fn empty() -> Self {
        Self {
            doctor_id: Uuid::new_v4(),
            schedules: Arc::new(InMemoryScheduleStore::new()),
            slots: Arc::new(InMemorySlotStore::new()),
        }
    }

    fn schedule_service(&self) -> ScheduleService {
        ScheduleService::new(self.schedules.clone(), fast_retry())
    }

    fn availability(&self) -> AvailabilityService {
        AvailabilityService::new(self.schedules.clone(), self.slots.clone(), fast_retry())
    }

    fn generator(&self, batch_size: usize) -> SlotGenerator {
        SlotGenerator::new(self.schedules.clone(), self.slots.clone(), fast_retry(), batch_size, 92)
    }

    async fn available_on(&self, date: NaiveDate) -> Vec<Slot> {
        self.availability()
            .get_available_slots(self.doctor_id, date, date)
            .await
            .unwrap()
    }
}

fn shape(slots: &[Slot]) -> BTreeSet<(NaiveDate, u16, u16, u16)> {
    slots
        .iter()
        .map(|s| (s.date, s.start_time, s.end_time, s.duration_minutes))
        .collect()
}

#[tokio::test]
async fn single_monday_yields_fourteen_slots_around_lunch() {
    let fixture = Fixture::with_default_template().await;

    let summary = fixture
        .generator(100)
        .generate(fixture.doctor_id, monday(), monday(), 30)
        .await
        .unwrap();

    assert_eq!(summary.slots_created, 14);
    assert_eq!(summary.working_days, 1);

    let slots = fixture.available_on(monday()).await;
    let starts: Vec<String> = slots.iter().map(|s| format_hhmm(s.start_time)).collect();
    assert_eq!(
        starts,
        vec![
            "09:00", "09:30", "10:00", "10:30", "11:00", "11:30", "13:00", "13:30", "14:00",
            "14:30", "15:00", "15:30", "16:00", "16:30"
        ]
    );
    assert!(slots.iter().all(|s| !s.range().overlaps(&range("12:00", "13:00"))));
}

#[tokio::test]
async fn regeneration_is_idempotent() {
    let fixture = Fixture::with_default_template().await;
    let sunday = NaiveDate::from_ymd_opt(2024, 5, 12).unwrap();
    let generator = fixture.generator(100);

    let first = generator.generate(fixture.doctor_id, monday(), sunday, 30).await.unwrap();
    let before = fixture
        .availability()
        .get_available_slots(fixture.doctor_id, monday(), sunday)
        .await
        .unwrap();

    let second = generator.generate(fixture.doctor_id, monday(), sunday, 30).await.unwrap();
    let after = fixture
        .availability()
        .get_available_slots(fixture.doctor_id, monday(), sunday)
        .await
        .unwrap();

    assert_eq!(first.slots_created, 70);
    assert_eq!(first.days_considered, 7);
    assert_eq!(first.working_days, 5);
    assert_eq!(second.slots_cleared, 70);
    assert_eq!(shape(&before), shape(&after));
    assert_eq!(fixture.slots.len(), 70);
}

#[tokio::test]
async fn holiday_exception_overrides_working_monday() {
    let fixture = Fixture::with_default_template().await;
    fixture
        .schedule_service()
        .create_exception(
            fixture.doctor_id,
            CreateExceptionRequest {
                date: monday(),
                exception_type: ExceptionType::Holiday,
                modified_schedule: None,
                reason: Some("Bank holiday".to_string()),
            },
        )
        .await
        .unwrap();

    let day = fixture.availability().resolve_day(fixture.doctor_id, monday()).await.unwrap();
    assert!(!day.is_working);
    assert!(day.shifts.is_empty());

    let summary = fixture
        .generator(100)
        .generate(fixture.doctor_id, monday(), monday(), 30)
        .await
        .unwrap();
    assert_eq!(summary.slots_created, 0);
    assert!(fixture.available_on(monday()).await.is_empty());
}

#[tokio::test]
async fn modified_hours_replace_the_template_for_that_date() {
    let fixture = Fixture::with_default_template().await;
    fixture
        .schedule_service()
        .create_exception(
            fixture.doctor_id,
            CreateExceptionRequest {
                date: monday(),
                exception_type: ExceptionType::ModifiedHours,
                modified_schedule: Some(DaySchedule::working(vec![range("14:00", "16:00")], vec![])),
                reason: None,
            },
        )
        .await
        .unwrap();

    fixture
        .generator(100)
        .generate(fixture.doctor_id, monday(), monday(), 60)
        .await
        .unwrap();

    let starts: Vec<String> = fixture
        .available_on(monday())
        .await
        .iter()
        .map(|s| format_hhmm(s.start_time))
        .collect();
    assert_eq!(starts, vec!["14:00", "15:00"]);
}

#[tokio::test]
async fn regeneration_preserves_booked_slots() {
    let fixture = Fixture::with_default_template().await;
    let generator = fixture.generator(100);
    generator.generate(fixture.doctor_id, monday(), monday(), 30).await.unwrap();

    let ten = fixture
        .available_on(monday())
        .await
        .into_iter()
        .find(|s| format_hhmm(s.start_time) == "10:00")
        .unwrap();
    let appointment_id = Uuid::new_v4();
    fixture
        .slots
        .transition_slot(ten.id, SlotTransition::book(appointment_id))
        .await
        .unwrap()
        .unwrap();

    let summary = generator.generate(fixture.doctor_id, monday(), monday(), 20).await.unwrap();
    assert_eq!(summary.slots_preserved, 1);
    assert_eq!(summary.slots_cleared, 13);

    let kept = fixture.slots.get_slot(ten.id).await.unwrap().unwrap();
    assert_eq!(kept.status, SlotStatus::Booked);
    assert_eq!(kept.appointment_id, Some(appointment_id));

    let available = fixture.available_on(monday()).await;
    assert_eq!(available.len(), 19);
    assert!(available.iter().all(|s| !s.range().overlaps(&kept.range())));
}

#[tokio::test]
async fn transient_clearing_failure_is_tolerated() {
    let fixture = Fixture::with_default_template().await;
    let generator = fixture.generator(100);
    generator.generate(fixture.doctor_id, monday(), monday(), 30).await.unwrap();

    for _ in 0..3 {
        fixture
            .slots
            .failures
            .push("delete_unbooked_slots", DbError::IndexNotReady("index building".to_string()));
    }

    let summary = generator.generate(fixture.doctor_id, monday(), monday(), 30).await.unwrap();
    assert_eq!(summary.slots_cleared, 0);
    assert_eq!(summary.slots_created, 0);
    assert_eq!(fixture.available_on(monday()).await.len(), 14);
}

#[tokio::test]
async fn permission_error_while_clearing_is_not_tolerated() {
    let fixture = Fixture::with_default_template().await;
    fixture
        .slots
        .failures
        .push("delete_unbooked_slots", DbError::PermissionDenied("rls".to_string()));

    let result = fixture
        .generator(100)
        .generate(fixture.doctor_id, monday(), monday(), 30)
        .await;

    assert_matches!(result, Err(ScheduleError::Unauthorized(_)));
    assert!(fixture.slots.is_empty());
}

#[tokio::test]
async fn transient_insert_failure_is_retried() {
    let fixture = Fixture::with_default_template().await;
    fixture
        .slots
        .failures
        .push("insert_slots", DbError::Unavailable("timeout".to_string()));

    let summary = fixture
        .generator(100)
        .generate(fixture.doctor_id, monday(), monday(), 30)
        .await
        .unwrap();

    assert_eq!(summary.slots_created, 14);
}

/// Slot store whose Nth `insert_slots` call fails permanently.
struct FailingBatchStore {
    inner: InMemorySlotStore,
    calls: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl SlotStore for FailingBatchStore {
    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<Slot>, DbError> {
        self.inner.get_slot(slot_id).await
    }

    async fn list_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        status: Option<SlotStatus>,
    ) -> Result<Vec<Slot>, DbError> {
        self.inner.list_slots(doctor_id, from, to, status).await
    }

    async fn delete_unbooked_slots(&self, doctor_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<usize, DbError> {
        self.inner.delete_unbooked_slots(doctor_id, from, to).await
    }

    async fn insert_slots(&self, slots: &[Slot]) -> Result<usize, DbError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(DbError::Other("write quota exceeded".to_string()));
        }
        self.inner.insert_slots(slots).await
    }

    async fn transition_slot(&self, slot_id: Uuid, transition: SlotTransition) -> Result<Option<Slot>, DbError> {
        self.inner.transition_slot(slot_id, transition).await
    }
}

#[tokio::test]
async fn failed_batch_aborts_remaining_batches() {
    let fixture = Fixture::with_default_template().await;
    let store = Arc::new(FailingBatchStore {
        inner: InMemorySlotStore::new(),
        calls: AtomicUsize::new(0),
        fail_on: 2,
    });
    let generator = SlotGenerator::new(fixture.schedules.clone(), store.clone(), fast_retry(), 5, 92);

    let result = generator.generate(fixture.doctor_id, monday(), monday(), 30).await;

    assert_matches!(result, Err(ScheduleError::Database(_)));
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.inner.len(), 5);
}

#[tokio::test]
async fn generation_without_default_schedule_fails_fast() {
    let fixture = Fixture::empty();

    let result = fixture
        .generator(100)
        .generate(fixture.doctor_id, monday(), monday(), 30)
        .await;

    assert_matches!(result, Err(ScheduleError::NotFound(_)));
    assert!(fixture.slots.is_empty());
}

#[tokio::test]
async fn rejects_malformed_generation_requests() {
    let fixture = Fixture::with_default_template().await;
    let generator = fixture.generator(100);
    let tuesday = monday().succ_opt().unwrap();

    assert_matches!(
        generator.generate(fixture.doctor_id, tuesday, monday(), 30).await,
        Err(ScheduleError::Validation(_))
    );
    assert_matches!(
        generator.generate(fixture.doctor_id, monday(), monday(), 0).await,
        Err(ScheduleError::Validation(_))
    );
    assert_matches!(
        generator.generate(fixture.doctor_id, monday(), monday(), 1440).await,
        Err(ScheduleError::Validation(_))
    );

    let far = monday() + chrono::Duration::days(92);
    assert_matches!(
        generator.generate(fixture.doctor_id, monday(), far, 30).await,
        Err(ScheduleError::Validation(issues)) if issues[0].scope == "to_date"
    );
}

#[tokio::test]
async fn availability_listing_is_capped_like_generation() {
    let fixture = Fixture::with_default_template().await;
    let last_allowed = monday() + chrono::Duration::days(13);

    assert_matches!(
        fixture
            .availability()
            .with_max_days(14)
            .get_available_slots(fixture.doctor_id, monday(), last_allowed)
            .await,
        Ok(_)
    );
    assert_matches!(
        fixture
            .availability()
            .with_max_days(14)
            .get_available_slots(fixture.doctor_id, monday(), last_allowed + chrono::Duration::days(1))
            .await,
        Err(ScheduleError::Validation(issues)) if issues[0].scope == "to"
    );

    let decades = NaiveDate::from_ymd_opt(2124, 5, 6).unwrap();
    assert_matches!(
        fixture
            .availability()
            .get_available_slots(fixture.doctor_id, monday(), decades)
            .await,
        Err(ScheduleError::Validation(_))
    );
}

/// Slot store where a patient cancels right after the stale slots are cleared.
struct CancelAfterClearStore {
    inner: InMemorySlotStore,
    slot_id: Uuid,
    holder: Uuid,
}

#[async_trait]
impl SlotStore for CancelAfterClearStore {
    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<Slot>, DbError> {
        self.inner.get_slot(slot_id).await
    }

    async fn list_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        status: Option<SlotStatus>,
    ) -> Result<Vec<Slot>, DbError> {
        self.inner.list_slots(doctor_id, from, to, status).await
    }

    async fn delete_unbooked_slots(&self, doctor_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<usize, DbError> {
        let cleared = self.inner.delete_unbooked_slots(doctor_id, from, to).await?;
        self.inner
            .transition_slot(self.slot_id, SlotTransition::release(self.holder))
            .await?;
        Ok(cleared)
    }

    async fn insert_slots(&self, slots: &[Slot]) -> Result<usize, DbError> {
        self.inner.insert_slots(slots).await
    }

    async fn transition_slot(&self, slot_id: Uuid, transition: SlotTransition) -> Result<Option<Slot>, DbError> {
        self.inner.transition_slot(slot_id, transition).await
    }
}

#[tokio::test]
async fn slot_released_during_regeneration_is_not_overlapped() {
    let fixture = Fixture::with_default_template().await;
    fixture.generator(100).generate(fixture.doctor_id, monday(), monday(), 30).await.unwrap();
    let ten = fixture
        .available_on(monday())
        .await
        .into_iter()
        .find(|s| format_hhmm(s.start_time) == "10:00")
        .unwrap();
    let holder = Uuid::new_v4();
    fixture
        .slots
        .transition_slot(ten.id, SlotTransition::book(holder))
        .await
        .unwrap()
        .unwrap();

    let store = Arc::new(CancelAfterClearStore {
        inner: InMemorySlotStore::new(),
        slot_id: ten.id,
        holder,
    });
    for slot in fixture.slots.list_slots(fixture.doctor_id, monday(), monday(), None).await.unwrap() {
        store.inner.put_raw(slot);
    }
    let generator = SlotGenerator::new(fixture.schedules.clone(), store.clone(), fast_retry(), 100, 92);

    let summary = generator.generate(fixture.doctor_id, monday(), monday(), 20).await.unwrap();
    assert_eq!(summary.slots_cleared, 13);
    assert_eq!(summary.slots_preserved, 0);

    let released = store.inner.get_slot(ten.id).await.unwrap().unwrap();
    assert_eq!(released.status, SlotStatus::Available);

    let all = store.inner.list_slots(fixture.doctor_id, monday(), monday(), None).await.unwrap();
    assert!(all.len() > 1);
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            assert!(
                !a.range().overlaps(&b.range()),
                "{} overlaps {}",
                format_hhmm(a.start_time),
                format_hhmm(b.start_time)
            );
        }
    }
}
