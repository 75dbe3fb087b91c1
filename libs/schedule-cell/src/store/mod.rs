//! Persistence seams for templates, exceptions and materialized slots.

mod memory;
mod supabase;

pub use memory::{FailureInjector, InMemoryScheduleStore, InMemorySlotStore};
pub use supabase::{SupabaseScheduleStore, SupabaseSlotStore};

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_database::DbError;

use crate::models::{ScheduleException, Slot, SlotStatus, SlotTransition, WeeklySchedule};

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert_schedule(&self, schedule: &WeeklySchedule) -> Result<(), DbError>;

    async fn get_schedule(&self, schedule_id: Uuid) -> Result<Option<WeeklySchedule>, DbError>;

    async fn list_schedules(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, DbError>;

    /// Single `doctor_id -> schedule_id` pointer; switching defaults is one write.
    async fn default_schedule_id(&self, doctor_id: Uuid) -> Result<Option<Uuid>, DbError>;

    async fn set_default_schedule(&self, doctor_id: Uuid, schedule_id: Uuid) -> Result<(), DbError>;

    /// Fails with `DbError::Duplicate` when the doctor already has an exception on that date.
    async fn insert_exception(&self, exception: &ScheduleException) -> Result<(), DbError>;

    async fn get_exception(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<ScheduleException>, DbError>;

    async fn list_exceptions(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ScheduleException>, DbError>;

    async fn delete_exception(&self, doctor_id: Uuid, date: NaiveDate) -> Result<bool, DbError>;
}

#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<Slot>, DbError>;

    /// Slots in `[from, to]` ordered by date then start time.
    async fn list_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        status: Option<SlotStatus>,
    ) -> Result<Vec<Slot>, DbError>;

    /// Removes every slot in range that is not booked; returns how many went.
    async fn delete_unbooked_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<usize, DbError>;

    /// Inserts slots, skipping any whose natural key already exists; returns inserted count.
    async fn insert_slots(&self, slots: &[Slot]) -> Result<usize, DbError>;

    /// Compare-and-swap on `(status, appointment_id)`. `Ok(None)` means the guard did not match.
    async fn transition_slot(
        &self,
        slot_id: Uuid,
        transition: SlotTransition,
    ) -> Result<Option<Slot>, DbError>;
}
