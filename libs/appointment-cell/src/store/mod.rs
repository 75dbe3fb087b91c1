mod memory;
mod supabase;

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_database::DbError;

use crate::models::{Appointment, AppointmentGuard};

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<(), DbError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DbError>;

    /// Writes `appointment` only while the stored row still matches `guard`.
    /// `Ok(None)` means someone else changed it first.
    async fn update_appointment(
        &self,
        appointment: &Appointment,
        guard: AppointmentGuard,
    ) -> Result<Option<Appointment>, DbError>;

    /// Appointments on dates in `[from, to]`, ordered by date then start time.
    async fn list_doctor_appointments(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, DbError>;
}
