use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use shared_database::DbError;

use crate::models::{ScheduleException, Slot, SlotStatus, SlotTransition, WeeklySchedule};

use super::{ScheduleStore, SlotStore};

/// Queues errors to be returned by the next call of a named store operation.
#[derive(Debug, Default)]
pub struct FailureInjector {
    queued: DashMap<&'static str, VecDeque<DbError>>,
}

impl FailureInjector {
    pub fn push(&self, operation: &'static str, error: DbError) {
        self.queued.entry(operation).or_default().push_back(error);
    }

    pub fn check(&self, operation: &'static str) -> Result<(), DbError> {
        match self.queued.get_mut(operation).and_then(|mut queue| queue.pop_front()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    schedules: DashMap<Uuid, WeeklySchedule>,
    defaults: DashMap<Uuid, Uuid>,
    exceptions: DashMap<(Uuid, NaiveDate), ScheduleException>,
    pub failures: FailureInjector,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn insert_schedule(&self, schedule: &WeeklySchedule) -> Result<(), DbError> {
        self.failures.check("insert_schedule")?;
        match self.schedules.entry(schedule.id) {
            Entry::Occupied(_) => Err(DbError::Duplicate(format!("schedule {}", schedule.id))),
            Entry::Vacant(entry) => {
                entry.insert(schedule.clone());
                Ok(())
            }
        }
    }

    async fn get_schedule(&self, schedule_id: Uuid) -> Result<Option<WeeklySchedule>, DbError> {
        self.failures.check("get_schedule")?;
        Ok(self.schedules.get(&schedule_id).map(|s| s.clone()))
    }

    async fn list_schedules(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, DbError> {
        self.failures.check("list_schedules")?;
        let mut schedules: Vec<WeeklySchedule> = self
            .schedules
            .iter()
            .filter(|s| s.doctor_id == doctor_id)
            .map(|s| s.clone())
            .collect();
        schedules.sort_by_key(|s| s.created_at);
        Ok(schedules)
    }

    async fn default_schedule_id(&self, doctor_id: Uuid) -> Result<Option<Uuid>, DbError> {
        self.failures.check("default_schedule_id")?;
        Ok(self.defaults.get(&doctor_id).map(|id| *id))
    }

    async fn set_default_schedule(&self, doctor_id: Uuid, schedule_id: Uuid) -> Result<(), DbError> {
        self.failures.check("set_default_schedule")?;
        self.defaults.insert(doctor_id, schedule_id);
        Ok(())
    }

    async fn insert_exception(&self, exception: &ScheduleException) -> Result<(), DbError> {
        self.failures.check("insert_exception")?;
        match self.exceptions.entry((exception.doctor_id, exception.date)) {
            Entry::Occupied(_) => Err(DbError::Duplicate(format!(
                "exception for doctor {} on {}",
                exception.doctor_id, exception.date
            ))),
            Entry::Vacant(entry) => {
                entry.insert(exception.clone());
                Ok(())
            }
        }
    }

    async fn get_exception(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<ScheduleException>, DbError> {
        self.failures.check("get_exception")?;
        Ok(self.exceptions.get(&(doctor_id, date)).map(|e| e.clone()))
    }

    async fn list_exceptions(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ScheduleException>, DbError> {
        self.failures.check("list_exceptions")?;
        let mut exceptions: Vec<ScheduleException> = self
            .exceptions
            .iter()
            .filter(|e| e.doctor_id == doctor_id && e.date >= from && e.date <= to)
            .map(|e| e.clone())
            .collect();
        exceptions.sort_by_key(|e| e.date);
        Ok(exceptions)
    }

    async fn delete_exception(&self, doctor_id: Uuid, date: NaiveDate) -> Result<bool, DbError> {
        self.failures.check("delete_exception")?;
        Ok(self.exceptions.remove(&(doctor_id, date)).is_some())
    }
}

/// Slot store keeping a natural-key index so re-inserts are ignored.
#[derive(Debug, Default)]
pub struct InMemorySlotStore {
    slots: DashMap<Uuid, Slot>,
    keys: DashMap<(Uuid, NaiveDate, u16), Uuid>,
    pub failures: FailureInjector,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Writes a slot as-is, bypassing every guard. Test setup only.
    pub fn put_raw(&self, slot: Slot) {
        self.keys.insert(slot.natural_key(), slot.id);
        self.slots.insert(slot.id, slot);
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<Slot>, DbError> {
        self.failures.check("get_slot")?;
        Ok(self.slots.get(&slot_id).map(|s| s.clone()))
    }

    async fn list_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        status: Option<SlotStatus>,
    ) -> Result<Vec<Slot>, DbError> {
        self.failures.check("list_slots")?;
        let mut slots: Vec<Slot> = self
            .slots
            .iter()
            .filter(|s| s.doctor_id == doctor_id && s.date >= from && s.date <= to)
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .map(|s| s.clone())
            .collect();
        slots.sort_by_key(|s| (s.date, s.start_time));
        Ok(slots)
    }

    async fn delete_unbooked_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<usize, DbError> {
        self.failures.check("delete_unbooked_slots")?;
        let candidates: Vec<Uuid> = self
            .slots
            .iter()
            .filter(|s| s.doctor_id == doctor_id && s.date >= from && s.date <= to)
            .map(|s| s.id)
            .collect();

        let mut removed = 0;
        for id in candidates {
            // Re-checked under the entry lock; a slot booked meanwhile survives.
            if let Some((_, slot)) = self.slots.remove_if(&id, |_, s| s.status != SlotStatus::Booked) {
                self.keys.remove_if(&slot.natural_key(), |_, owner| *owner == slot.id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn insert_slots(&self, slots: &[Slot]) -> Result<usize, DbError> {
        self.failures.check("insert_slots")?;
        let mut inserted = 0;
        for slot in slots {
            if let Entry::Vacant(entry) = self.keys.entry(slot.natural_key()) {
                entry.insert(slot.id);
                self.slots.insert(slot.id, slot.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn transition_slot(
        &self,
        slot_id: Uuid,
        transition: SlotTransition,
    ) -> Result<Option<Slot>, DbError> {
        self.failures.check("transition_slot")?;
        // The shard write lock held by `get_mut` makes check-and-set atomic.
        match self.slots.get_mut(&slot_id) {
            Some(mut slot) if transition.matches(&slot) => {
                transition.apply(&mut slot);
                Ok(Some(slot.clone()))
            }
            _ => Ok(None),
        }
    }
}
