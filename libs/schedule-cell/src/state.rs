use std::sync::Arc;

use tracing::warn;

use shared_config::AppConfig;
use shared_database::{RetryPolicy, SupabaseClient};

use crate::services::{AvailabilityService, ScheduleService, SlotGenerator};
use crate::store::{
    InMemoryScheduleStore, InMemorySlotStore, ScheduleStore, SlotStore, SupabaseScheduleStore,
    SupabaseSlotStore,
};

/// Router state for the schedule routes.
#[derive(Clone)]
pub struct ScheduleState {
    pub config: Arc<AppConfig>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub slots: Arc<dyn SlotStore>,
}

impl ScheduleState {
    pub fn new(config: Arc<AppConfig>, schedules: Arc<dyn ScheduleStore>, slots: Arc<dyn SlotStore>) -> Self {
        Self { config, schedules, slots }
    }

    /// PostgREST-backed stores when Supabase is configured, in-memory otherwise.
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        if config.is_configured() {
            let supabase = Arc::new(SupabaseClient::new(&config));
            Self::new(
                config,
                Arc::new(SupabaseScheduleStore::new(supabase.clone())),
                Arc::new(SupabaseSlotStore::new(supabase)),
            )
        } else {
            warn!("Supabase is not configured, schedules and slots are kept in memory");
            Self::in_memory(config)
        }
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryScheduleStore::new()),
            Arc::new(InMemorySlotStore::new()),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config)
    }

    pub fn schedule_service(&self) -> ScheduleService {
        ScheduleService::new(self.schedules.clone(), self.retry_policy())
    }

    pub fn availability_service(&self) -> AvailabilityService {
        AvailabilityService::new(self.schedules.clone(), self.slots.clone(), self.retry_policy())
            .with_max_days(self.config.max_generation_days)
    }

    pub fn slot_generator(&self) -> SlotGenerator {
        SlotGenerator::new(
            self.schedules.clone(),
            self.slots.clone(),
            self.retry_policy(),
            self.config.slot_write_batch_size,
            self.config.max_generation_days,
        )
    }
}
