use uuid::Uuid;

use schedule_cell::{Slot, SlotStore, SlotTransition};
use shared_database::{with_retry, RetryPolicy};

use crate::models::AppointmentError;

/// Apply a guarded slot write, retrying transient store failures.
///
/// A transient failure may hide a write that landed, so a missed guard is
/// re-read and counted as applied when the slot already shows the outcome.
/// `None` means the slot is in some other state.
pub(crate) async fn apply_slot_transition(
    slots: &dyn SlotStore,
    retry: &RetryPolicy,
    slot_id: Uuid,
    transition: SlotTransition,
) -> Result<Option<Slot>, AppointmentError> {
    let applied = with_retry(retry, "transition_slot", || slots.transition_slot(slot_id, transition)).await?;
    if applied.is_some() {
        return Ok(applied);
    }

    let current = with_retry(retry, "get_slot", || slots.get_slot(slot_id)).await?;
    Ok(current.filter(|slot| transition.is_applied_to(slot)))
}
