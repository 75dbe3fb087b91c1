use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use schedule_cell::store::FailureInjector;
use shared_database::DbError;

use crate::models::{Appointment, AppointmentGuard};

use super::AppointmentStore;

#[derive(Debug, Default)]
pub struct InMemoryAppointmentStore {
    appointments: DashMap<Uuid, Appointment>,
    pub failures: FailureInjector,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }

    /// Writes an appointment as-is, bypassing every guard. Test setup only.
    pub fn put_raw(&self, appointment: Appointment) {
        self.appointments.insert(appointment.id, appointment);
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<(), DbError> {
        self.failures.check("insert_appointment")?;
        match self.appointments.entry(appointment.id) {
            Entry::Occupied(_) => Err(DbError::Duplicate(format!("appointment {}", appointment.id))),
            Entry::Vacant(entry) => {
                entry.insert(appointment.clone());
                Ok(())
            }
        }
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DbError> {
        self.failures.check("get_appointment")?;
        Ok(self.appointments.get(&appointment_id).map(|a| a.clone()))
    }

    async fn update_appointment(
        &self,
        appointment: &Appointment,
        guard: AppointmentGuard,
    ) -> Result<Option<Appointment>, DbError> {
        self.failures.check("update_appointment")?;
        match self.appointments.get_mut(&appointment.id) {
            Some(mut stored) if guard.matches(&stored) => {
                *stored = appointment.clone();
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_doctor_appointments(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, DbError> {
        self.failures.check("list_doctor_appointments")?;
        let mut appointments: Vec<Appointment> = self
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id && a.date >= from && a.date <= to)
            .map(|a| a.clone())
            .collect();
        appointments.sort_by_key(|a| (a.date, a.start_time));
        Ok(appointments)
    }
}
