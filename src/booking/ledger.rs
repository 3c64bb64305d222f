use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::model::{FacilityKey, PassType};
use crate::store::{IncrementOutcome, InitOutcome, Table};

use super::BookingError;

/// One slot's share of a facility's reservation counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotKey {
    pub facility: FacilityKey,
    pub date: NaiveDate,
    pub pass_type: PassType,
}

/// Reserve `guests` units for a slot, or refuse without writing anything.
///
/// Three single-row conditional writes in order: materialize the date
/// entry, materialize the type entry, then the bounded increment. The first
/// two converge when callers race; losing one of them is not an error.
/// Only the third decides admission.
pub async fn reserve(table: &dyn Table, slot: &SlotKey, guests: u32) -> Result<u32, BookingError> {
    if table.init_date_entry(&slot.facility, slot.date).await? == InitOutcome::AlreadyExists {
        debug!(facility = %slot.facility, date = %slot.date, "date entry exists");
    }
    if table
        .init_type_entry(&slot.facility, slot.date, slot.pass_type)
        .await?
        == InitOutcome::AlreadyExists
    {
        debug!(facility = %slot.facility, date = %slot.date, pass_type = %slot.pass_type, "type entry exists");
    }

    match table
        .increment_within_max(&slot.facility, slot.date, slot.pass_type, guests)
        .await?
    {
        IncrementOutcome::Admitted { count } => {
            debug!(facility = %slot.facility, date = %slot.date, pass_type = %slot.pass_type, count, "capacity reserved");
            Ok(count)
        }
        IncrementOutcome::Rejected { count, max } => {
            warn!(
                facility = %slot.facility,
                date = %slot.date,
                pass_type = %slot.pass_type,
                count,
                ?max,
                guests,
                "slot full"
            );
            metrics::counter!(crate::observability::CAPACITY_REJECTIONS_TOTAL).increment(1);
            Err(BookingError::CapacityExhausted)
        }
    }
}

/// Undo a reservation whose pass could not be written.
pub async fn release(table: &dyn Table, slot: &SlotKey, guests: u32) -> Result<u32, BookingError> {
    let count = table
        .release(&slot.facility, slot.date, slot.pass_type, guests)
        .await?;
    metrics::counter!(crate::observability::COMPENSATIONS_TOTAL).increment(1);
    Ok(count)
}
