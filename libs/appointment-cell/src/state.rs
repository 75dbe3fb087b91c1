use std::sync::Arc;

use tracing::warn;

use schedule_cell::SlotStore;
use shared_config::AppConfig;
use shared_database::{RetryPolicy, SupabaseClient};

use crate::services::{AppointmentBookingService, ReconciliationService};
use crate::store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};

/// Router state for the appointment routes. The slot store is shared with
/// the schedule routes so both sides see the same slots.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub slots: Arc<dyn SlotStore>,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, appointments: Arc<dyn AppointmentStore>, slots: Arc<dyn SlotStore>) -> Self {
        Self {
            config,
            appointments,
            slots,
        }
    }

    pub fn from_config(config: Arc<AppConfig>, slots: Arc<dyn SlotStore>) -> Self {
        let appointments: Arc<dyn AppointmentStore> = if config.is_configured() {
            Arc::new(SupabaseAppointmentStore::new(Arc::new(SupabaseClient::new(&config))))
        } else {
            warn!("Supabase is not configured, appointments are kept in memory");
            Arc::new(InMemoryAppointmentStore::new())
        };
        Self::new(config, appointments, slots)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config)
    }

    pub fn booking_service(&self) -> AppointmentBookingService {
        AppointmentBookingService::new(self.appointments.clone(), self.slots.clone(), self.retry_policy())
    }

    pub fn reconciliation_service(&self) -> ReconciliationService {
        ReconciliationService::new(self.appointments.clone(), self.slots.clone(), self.retry_policy())
    }
}
