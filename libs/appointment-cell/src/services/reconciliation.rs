use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use schedule_cell::{Slot, SlotStatus, SlotStore, SlotTransition};
use shared_database::{with_retry, RetryPolicy};

use crate::models::{Appointment, AppointmentError, ReconciliationReport};
use crate::services::slot_write::apply_slot_transition;
use crate::store::AppointmentStore;

/// Slots touched more recently than this are left alone; a booking may still be in flight.
pub const DEFAULT_GRACE_SECONDS: i64 = 60;

/// Repairs slot/appointment pairs left inconsistent by a failed booking step.
pub struct ReconciliationService {
    appointments: Arc<dyn AppointmentStore>,
    slots: Arc<dyn SlotStore>,
    retry: RetryPolicy,
    grace: Duration,
}

impl ReconciliationService {
    pub fn new(appointments: Arc<dyn AppointmentStore>, slots: Arc<dyn SlotStore>, retry: RetryPolicy) -> Self {
        Self {
            appointments,
            slots,
            retry,
            grace: Duration::seconds(DEFAULT_GRACE_SECONDS),
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<ReconciliationReport, AppointmentError> {
        if from > to {
            return Err(AppointmentError::ValidationError(
                "End date must not precede start date".to_string(),
            ));
        }

        let slots = with_retry(&self.retry, "list_slots", || {
            self.slots.list_slots(doctor_id, from, to, None)
        })
        .await?;
        let appointments = with_retry(&self.retry, "list_doctor_appointments", || {
            self.appointments.list_doctor_appointments(doctor_id, from, to)
        })
        .await?;

        let mut report = ReconciliationReport {
            slots_checked: slots.len(),
            appointments_checked: appointments.len(),
            ..ReconciliationReport::default()
        };

        let settled_before = Utc::now() - self.grace;
        let by_id: HashMap<Uuid, &Appointment> = appointments.iter().map(|a| (a.id, a)).collect();
        let mut slot_state: HashMap<Uuid, Slot> = slots.into_iter().map(|s| (s.id, s)).collect();

        // Booked slots whose holder is gone or cancelled.
        let mut booked: Vec<Slot> = slot_state
            .values()
            .filter(|s| s.status == SlotStatus::Booked && s.updated_at <= settled_before)
            .cloned()
            .collect();
        booked.sort_by_key(|s| (s.date, s.start_time));

        for slot in booked {
            let Some(holder) = slot.appointment_id else {
                report
                    .unresolved
                    .push(format!("Slot {} is booked without an appointment reference", slot.id));
                continue;
            };

            let held = match by_id.get(&holder) {
                Some(appointment) => appointment.holds_slot(slot.id),
                None => self.is_held_elsewhere(holder, slot.id).await?,
            };
            if held {
                continue;
            }

            match self.write(slot.id, SlotTransition::release(holder)).await {
                Ok(Some(updated)) => {
                    warn!("Released slot {} held by dead appointment {}", slot.id, holder);
                    report.slots_released.push(slot.id);
                    slot_state.insert(updated.id, updated);
                }
                Ok(None) => report
                    .unresolved
                    .push(format!("Slot {} changed while being released", slot.id)),
                Err(err) => {
                    warn!("Could not release slot {}: {}", slot.id, err);
                    report
                        .unresolved
                        .push(format!("Slot {} could not be released: {}", slot.id, err));
                }
            }
        }

        // Holding appointments whose slot does not point back at them.
        for appointment in appointments.iter().filter(|a| a.status.holds_slot()) {
            let Some(slot_id) = appointment.slot_id else {
                continue;
            };

            match slot_state.get(&slot_id) {
                Some(slot) if slot.appointment_id == Some(appointment.id) => {}
                Some(slot) if slot.status == SlotStatus::Available => {
                    match self.write(slot_id, SlotTransition::book(appointment.id)).await {
                        Ok(Some(updated)) => {
                            warn!("Re-linked slot {} to appointment {}", slot_id, appointment.id);
                            report.slots_relinked.push(slot_id);
                            slot_state.insert(updated.id, updated);
                        }
                        Ok(None) => report
                            .unresolved
                            .push(format!("Slot {} changed while being re-linked", slot_id)),
                        Err(err) => {
                            warn!("Could not re-link slot {}: {}", slot_id, err);
                            report
                                .unresolved
                                .push(format!("Slot {} could not be re-linked: {}", slot_id, err));
                        }
                    }
                }
                Some(slot) => report.unresolved.push(format!(
                    "Appointment {} references slot {} which is {}",
                    appointment.id, slot_id, slot.status
                )),
                None => report.unresolved.push(format!(
                    "Appointment {} references missing slot {}",
                    appointment.id, slot_id
                )),
            }
        }

        info!(
            "Reconciled doctor {}: {} released, {} re-linked, {} unresolved",
            doctor_id,
            report.slots_released.len(),
            report.slots_relinked.len(),
            report.unresolved.len()
        );
        Ok(report)
    }

    /// Holder outside the listed range; look it up directly.
    async fn is_held_elsewhere(&self, appointment_id: Uuid, slot_id: Uuid) -> Result<bool, AppointmentError> {
        let appointment = with_retry(&self.retry, "get_appointment", || {
            self.appointments.get_appointment(appointment_id)
        })
        .await?;
        Ok(appointment.map_or(false, |a| a.holds_slot(slot_id)))
    }

    async fn write(&self, slot_id: Uuid, transition: SlotTransition) -> Result<Option<Slot>, AppointmentError> {
        apply_slot_transition(self.slots.as_ref(), &self.retry, slot_id, transition).await
    }
}
