use chrono::{DateTime, NaiveDate, Timelike, Utc};

use crate::config::BookingConfig;
use crate::model::{PassStatus, PassType};

use super::BookingError;

/// Initial status of a new pass.
///
/// Future dates are always `Reserved`. On the day itself the pass is
/// `Active` once the slot has opened: the facility's opening hour for AM
/// and DAY, the fixed PM hour for PM. AM cannot be booked once the PM hour
/// has been reached.
pub fn resolve_status(
    pass_type: PassType,
    date: NaiveDate,
    now: DateTime<Utc>,
    facility_opening_hour: Option<u32>,
    config: &BookingConfig,
) -> Result<PassStatus, BookingError> {
    let local_now = now.with_timezone(&config.timezone);
    if date != local_now.date_naive() {
        return Ok(PassStatus::Reserved);
    }

    let hour = local_now.hour();
    let am_opening_hour = facility_opening_hour.unwrap_or(config.default_am_opening_hour);
    if pass_type == PassType::AM && hour >= config.pm_opening_hour {
        return Err(BookingError::SlotExpired {
            opening_hour: am_opening_hour,
            closing_hour: config.pm_opening_hour,
        });
    }

    let opening_hour = match pass_type {
        PassType::PM => config.pm_opening_hour,
        PassType::AM | PassType::DAY => am_opening_hour,
    };
    if hour >= opening_hour {
        Ok(PassStatus::Active)
    } else {
        Ok(PassStatus::Reserved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    /// `hour`:15 local time on 2026-10-19 in Vancouver (UTC-7).
    fn at(hour: u32) -> DateTime<Utc> {
        format!("2026-10-19T{:02}:15:00-07:00", hour).parse().unwrap()
    }

    fn status(pass_type: PassType, date: NaiveDate, hour: u32, opening: Option<u32>) -> Result<PassStatus, BookingError> {
        resolve_status(pass_type, date, at(hour), opening, &BookingConfig::default())
    }

    #[test]
    fn future_dates_are_reserved() {
        let tomorrow = today().succ_opt().unwrap();
        for pass_type in [PassType::AM, PassType::PM, PassType::DAY] {
            assert_eq!(status(pass_type, tomorrow, 16, None).unwrap(), PassStatus::Reserved);
        }
    }

    #[test]
    fn same_day_am_expires_at_noon() {
        assert!(matches!(
            status(PassType::AM, today(), 12, None),
            Err(BookingError::SlotExpired {
                opening_hour: 7,
                closing_hour: 12
            })
        ));
        assert!(status(PassType::AM, today(), 18, None).is_err());
    }

    #[test]
    fn same_day_am_active_after_opening() {
        assert_eq!(status(PassType::AM, today(), 7, None).unwrap(), PassStatus::Active);
        assert_eq!(status(PassType::AM, today(), 11, None).unwrap(), PassStatus::Active);
        assert_eq!(status(PassType::AM, today(), 6, None).unwrap(), PassStatus::Reserved);
    }

    #[test]
    fn facility_opening_hour_applies_to_am_and_day() {
        assert_eq!(status(PassType::AM, today(), 8, Some(9)).unwrap(), PassStatus::Reserved);
        assert_eq!(status(PassType::DAY, today(), 8, Some(9)).unwrap(), PassStatus::Reserved);
        assert_eq!(status(PassType::DAY, today(), 9, Some(9)).unwrap(), PassStatus::Active);
    }

    #[test]
    fn pm_ignores_facility_opening_hour() {
        assert_eq!(status(PassType::PM, today(), 11, Some(6)).unwrap(), PassStatus::Reserved);
        assert_eq!(status(PassType::PM, today(), 12, Some(6)).unwrap(), PassStatus::Active);
    }

    #[test]
    fn day_pass_bookable_all_day() {
        assert_eq!(status(PassType::DAY, today(), 22, None).unwrap(), PassStatus::Active);
    }
}
