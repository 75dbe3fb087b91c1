// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use schedule_cell::{Slot, SlotStore, SlotTransition};
use shared_database::{with_retry, RetryPolicy};
use shared_models::auth::{Caller, CallerRole};

use crate::models::{
    Appointment, AppointmentError, AppointmentGuard, AppointmentStatus, BookAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::slot_write::apply_slot_transition;
use crate::store::AppointmentStore;

/// Book, cancel, reschedule and status changes.
///
/// A slot is always claimed with a guarded write before the appointment that
/// points at it is written, and the claim is undone if that write fails.
pub struct AppointmentBookingService {
    appointments: Arc<dyn AppointmentStore>,
    slots: Arc<dyn SlotStore>,
    lifecycle: AppointmentLifecycleService,
    retry: RetryPolicy,
}

impl AppointmentBookingService {
    pub fn new(appointments: Arc<dyn AppointmentStore>, slots: Arc<dyn SlotStore>, retry: RetryPolicy) -> Self {
        Self {
            appointments,
            slots,
            lifecycle: AppointmentLifecycleService::new(),
            retry,
        }
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    #[instrument(skip(self, request), fields(slot_id = %request.slot_id))]
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Booking slot {} for patient {}", request.slot_id, patient_id);

        // A missing slot is reported like a taken one: it may be gone for good.
        let slot = self
            .find_slot(request.slot_id)
            .await?
            .ok_or(AppointmentError::SlotNotAvailable)?;

        if slot.doctor_id != request.doctor_id {
            return Err(AppointmentError::ValidationError(
                "Slot does not belong to the requested doctor".to_string(),
            ));
        }
        if !slot.is_available() {
            return Err(AppointmentError::SlotNotAvailable);
        }

        let appointment = Appointment::from_slot(patient_id, &slot, request.appointment_type, request.notes);

        if !self.transition(slot.id, SlotTransition::book(appointment.id)).await? {
            info!("Slot {} was taken before it could be claimed", slot.id);
            return Err(AppointmentError::SlotNotAvailable);
        }

        if let Err(err) = self.appointments.insert_appointment(&appointment).await {
            error!("Failed to record appointment {} after claiming slot {}: {}", appointment.id, slot.id, err);
            self.undo_claim(slot.id, appointment.id).await;
            return Err(err.into());
        }

        info!("Appointment {} booked on slot {}", appointment.id, slot.id);
        Ok(appointment)
    }

    // ==============================================================================
    // CANCELLATION
    // ==============================================================================

    #[instrument(skip(self, reason))]
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        caller: Caller,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        authorize_participant(&appointment, caller)?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let now = Utc::now();
        let mut cancelled = appointment.clone();
        cancelled.status = AppointmentStatus::Cancelled;
        cancelled.cancellation_reason = reason;
        cancelled.cancelled_at = Some(now);
        cancelled.updated_at = now;

        let stored = self
            .appointments
            .update_appointment(&cancelled, AppointmentGuard::of(&appointment))
            .await?
            .ok_or_else(|| AppointmentError::Conflict("Appointment was modified concurrently".to_string()))?;

        if let Some(slot_id) = appointment.slot_id {
            if !self.transition(slot_id, SlotTransition::release(appointment.id)).await? {
                warn!("Slot {} was not held by cancelled appointment {}", slot_id, appointment.id);
            }
        }

        info!("Appointment {} cancelled by {:?} {}", appointment_id, caller.role, caller.id);
        Ok(stored)
    }

    // ==============================================================================
    // RESCHEDULING
    // ==============================================================================

    #[instrument(skip(self))]
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        new_slot_id: Uuid,
        caller: Caller,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        authorize_participant(&appointment, caller)?;
        self.lifecycle.validate_reschedule(appointment.status)?;

        if appointment.slot_id == Some(new_slot_id) {
            return Err(AppointmentError::ValidationError(
                "Appointment already holds this slot".to_string(),
            ));
        }

        let new_slot = self
            .find_slot(new_slot_id)
            .await?
            .ok_or(AppointmentError::SlotNotFound)?;
        if new_slot.doctor_id != appointment.doctor_id {
            return Err(AppointmentError::ValidationError(
                "Appointments can only move between the same doctor's slots".to_string(),
            ));
        }
        if !new_slot.is_available() {
            return Err(AppointmentError::SlotNotAvailable);
        }

        // Claim the new slot first so the appointment always holds one.
        if !self.transition(new_slot.id, SlotTransition::book(appointment.id)).await? {
            return Err(AppointmentError::SlotNotAvailable);
        }

        let mut moved = appointment.clone();
        moved.adopt_slot(&new_slot);

        let stored = match self
            .appointments
            .update_appointment(&moved, AppointmentGuard::of(&appointment))
            .await
        {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                self.undo_claim(new_slot.id, appointment.id).await;
                return Err(AppointmentError::Conflict(
                    "Appointment was modified concurrently".to_string(),
                ));
            }
            Err(err) => {
                error!("Failed to move appointment {} to slot {}: {}", appointment.id, new_slot.id, err);
                self.undo_claim(new_slot.id, appointment.id).await;
                return Err(err.into());
            }
        };

        if let Some(old_slot_id) = appointment.slot_id {
            if !self.transition(old_slot_id, SlotTransition::release(appointment.id)).await? {
                warn!("Previous slot {} was not held by appointment {}", old_slot_id, appointment.id);
            }
        }

        info!("Appointment {} moved to slot {}", appointment.id, new_slot.id);
        Ok(stored)
    }

    // ==============================================================================
    // STATUS UPDATES
    // ==============================================================================

    /// Doctor-driven transitions. Cancelling through here also frees the slot.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        caller: Caller,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if !caller.is_doctor(appointment.doctor_id) {
            return Err(AppointmentError::Unauthorized);
        }

        if new_status == AppointmentStatus::Cancelled {
            return self.cancel_appointment(appointment_id, caller, None).await;
        }

        self.lifecycle.validate_status_transition(appointment.status, new_status)?;

        let mut updated = appointment.clone();
        updated.status = new_status;
        updated.updated_at = Utc::now();

        let stored = self
            .appointments
            .update_appointment(&updated, AppointmentGuard::of(&appointment))
            .await?
            .ok_or_else(|| AppointmentError::Conflict("Appointment was modified concurrently".to_string()))?;

        info!("Appointment {} is now {}", appointment_id, new_status);
        Ok(stored)
    }

    // ==============================================================================
    // MANUAL HOLDS
    // ==============================================================================

    pub async fn block_slot(&self, slot_id: Uuid, caller: Caller) -> Result<Slot, AppointmentError> {
        self.hold(slot_id, caller, SlotTransition::block()).await
    }

    pub async fn unblock_slot(&self, slot_id: Uuid, caller: Caller) -> Result<Slot, AppointmentError> {
        self.hold(slot_id, caller, SlotTransition::unblock()).await
    }

    async fn hold(&self, slot_id: Uuid, caller: Caller, transition: SlotTransition) -> Result<Slot, AppointmentError> {
        let slot = self.find_slot(slot_id).await?.ok_or(AppointmentError::SlotNotFound)?;
        if !caller.is_doctor(slot.doctor_id) {
            return Err(AppointmentError::Unauthorized);
        }

        match self
            .slots
            .transition_slot(slot_id, transition)
            .await
            .map_err(AppointmentError::from)?
        {
            Some(updated) => {
                debug!("Slot {} is now {}", slot_id, updated.status);
                Ok(updated)
            }
            None => Err(AppointmentError::Conflict(format!(
                "Slot is {}, expected {}",
                slot.status, transition.expected_status
            ))),
        }
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn get_appointment(&self, appointment_id: Uuid, caller: Caller) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if caller.role != CallerRole::Admin {
            authorize_participant(&appointment, caller)?;
        }
        Ok(appointment)
    }

    pub async fn list_doctor_appointments(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        caller: Caller,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !caller.is_doctor(doctor_id) && caller.role != CallerRole::Admin {
            return Err(AppointmentError::Unauthorized);
        }
        if from > to {
            return Err(AppointmentError::ValidationError(
                "End date must not precede start date".to_string(),
            ));
        }

        let appointments = with_retry(&self.retry, "list_doctor_appointments", || {
            self.appointments.list_doctor_appointments(doctor_id, from, to)
        })
        .await?;
        Ok(appointments)
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        with_retry(&self.retry, "get_appointment", || self.appointments.get_appointment(appointment_id))
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    async fn find_slot(&self, slot_id: Uuid) -> Result<Option<Slot>, AppointmentError> {
        Ok(with_retry(&self.retry, "get_slot", || self.slots.get_slot(slot_id)).await?)
    }

    /// Apply a guarded slot write. `false` means the slot was in some other state.
    async fn transition(&self, slot_id: Uuid, transition: SlotTransition) -> Result<bool, AppointmentError> {
        let applied = apply_slot_transition(self.slots.as_ref(), &self.retry, slot_id, transition).await?;
        Ok(applied.is_some())
    }

    async fn undo_claim(&self, slot_id: Uuid, appointment_id: Uuid) {
        match self.transition(slot_id, SlotTransition::release(appointment_id)).await {
            Ok(true) => debug!("Released slot {} after failed write", slot_id),
            Ok(false) => warn!("Slot {} no longer held by {} during compensation", slot_id, appointment_id),
            Err(err) => error!(
                "Slot {} left booked for missing appointment {}, reconciliation required: {}",
                slot_id, appointment_id, err
            ),
        }
    }
}

/// Only the appointment's own patient or doctor may act on it.
fn authorize_participant(appointment: &Appointment, caller: Caller) -> Result<(), AppointmentError> {
    let allowed = match caller.role {
        CallerRole::Patient => appointment.patient_id == caller.id,
        CallerRole::Doctor => appointment.doctor_id == caller.id,
        CallerRole::Admin => false,
    };

    if allowed {
        Ok(())
    } else {
        warn!("Caller {} denied access to appointment {}", caller.id, appointment.id);
        Err(AppointmentError::Unauthorized)
    }
}
