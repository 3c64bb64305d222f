use chrono::NaiveDate;
use tracing::debug;

use crate::model::{PassFilter, PassStatus, PassType};
use crate::store::Table;

use super::BookingError;

/// Refuse a second live pass for the same email, facility, date and type.
///
/// Read-then-decide: two identical requests racing each other can both
/// pass this check. Capacity is the backstop for that case.
pub async fn check_duplicate(
    table: &dyn Table,
    park: &str,
    facility: &str,
    email: &str,
    pass_type: PassType,
    date: NaiveDate,
) -> Result<(), BookingError> {
    let filter = PassFilter {
        facility_name: Some(facility.to_string()),
        email: Some(email.to_string()),
        pass_type: Some(pass_type),
        date: Some(date),
        statuses: vec![PassStatus::Reserved, PassStatus::Active],
    };
    let existing = table.query_passes(park, &filter).await?;
    debug!(park, facility, %date, %pass_type, matches = existing.len(), "duplicate check");
    if existing.is_empty() {
        Ok(())
    } else {
        Err(BookingError::DuplicateBooking)
    }
}
