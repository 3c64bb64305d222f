use chrono::{DateTime, Days, NaiveDate, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::BookingConfig;
use crate::limits::MAX_BOOKING_DAYS_AHEAD;

use super::{BookingError, ValidationError};

/// Hour of day every slot is pinned to. Mid-day keeps the calendar date
/// stable across DST shifts of either direction.
const CANONICAL_SLOT_HOUR: u32 = 12;

/// A requested calendar date pinned to the operating timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDate {
    pub date: NaiveDate,
    pub instant: DateTime<Tz>,
}

impl SlotDate {
    /// UTC ISO-8601 with millisecond precision, e.g. `2026-10-20T19:00:00.000Z`.
    pub fn utc_iso(&self) -> String {
        self.instant
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp whose own calendar date is used.
pub fn parse_requested_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

pub fn normalize(date: NaiveDate, tz: Tz) -> Result<SlotDate, ValidationError> {
    date.and_hms_opt(CANONICAL_SLOT_HOUR, 0, 0)
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|instant| SlotDate { date, instant })
        .ok_or_else(|| ValidationError::InvalidDate(date.to_string()))
}

/// Today's calendar date in the operating timezone.
pub fn today(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Pin `date` to its slot instant and reject dates before today. Needs no
/// facility data, so it runs before any store read.
pub fn check_not_past(date: NaiveDate, now: DateTime<Utc>, config: &BookingConfig) -> Result<SlotDate, BookingError> {
    let slot = normalize(date, config.timezone)?;
    if date < today(now, config.timezone) {
        return Err(BookingError::PastDate);
    }
    Ok(slot)
}

/// Reject dates beyond the booking-ahead horizon. The facility's override
/// replaces the configured default; today + N is still bookable.
pub fn check_horizon(
    date: NaiveDate,
    now: DateTime<Utc>,
    days_ahead_override: Option<u32>,
    config: &BookingConfig,
) -> Result<(), BookingError> {
    let days_ahead = days_ahead_override
        .unwrap_or(config.default_booking_days_ahead)
        .min(MAX_BOOKING_DAYS_AHEAD);
    let last_bookable = today(now, config.timezone)
        .checked_add_days(Days::new(u64::from(days_ahead)))
        .unwrap_or(NaiveDate::MAX);
    if date > last_bookable {
        return Err(BookingError::HorizonExceeded { days_ahead });
    }
    Ok(())
}

/// Both window checks in order.
pub fn check_window(
    date: NaiveDate,
    now: DateTime<Utc>,
    days_ahead_override: Option<u32>,
    config: &BookingConfig,
) -> Result<SlotDate, BookingError> {
    let slot = check_not_past(date, now, config)?;
    check_horizon(date, now, days_ahead_override, config)?;
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// 2026-10-19 09:30 in Vancouver (PDT, UTC-7).
    fn now() -> DateTime<Utc> {
        "2026-10-19T16:30:00Z".parse().unwrap()
    }

    #[test]
    fn parses_plain_and_timestamp_dates() {
        assert_eq!(parse_requested_date("2026-10-20").unwrap(), d(2026, 10, 20));
        assert_eq!(
            parse_requested_date("2026-10-20T00:00:00-07:00").unwrap(),
            d(2026, 10, 20)
        );
        assert!(matches!(
            parse_requested_date("next tuesday"),
            Err(ValidationError::InvalidDate(_))
        ));
    }

    #[test]
    fn slot_is_local_noon() {
        let slot = normalize(d(2026, 10, 20), chrono_tz::America::Vancouver).unwrap();
        assert_eq!(slot.utc_iso(), "2026-10-20T19:00:00.000Z");
        // PST after the November DST change
        let slot = normalize(d(2026, 11, 2), chrono_tz::America::Vancouver).unwrap();
        assert_eq!(slot.utc_iso(), "2026-11-02T20:00:00.000Z");
    }

    #[test]
    fn today_uses_operating_timezone() {
        // 03:00 UTC on the 20th is still the 19th in Vancouver
        let late: DateTime<Utc> = "2026-10-20T03:00:00Z".parse().unwrap();
        assert_eq!(today(late, chrono_tz::America::Vancouver), d(2026, 10, 19));
    }

    #[test]
    fn past_dates_rejected() {
        let config = BookingConfig::default();
        let result = check_window(d(2026, 10, 18), now(), None, &config);
        assert!(matches!(result, Err(BookingError::PastDate)));
    }

    #[test]
    fn past_check_ignores_horizon() {
        let config = BookingConfig::default();
        assert!(matches!(
            check_not_past(d(2026, 10, 18), now(), &config),
            Err(BookingError::PastDate)
        ));
        // far future passes the first check; the horizon catches it later
        assert!(check_not_past(d(2027, 1, 1), now(), &config).is_ok());
        assert!(check_horizon(d(2027, 1, 1), now(), None, &config).is_err());
    }

    #[test]
    fn today_is_bookable() {
        let config = BookingConfig::default();
        let slot = check_window(d(2026, 10, 19), now(), None, &config).unwrap();
        assert_eq!(slot.date, d(2026, 10, 19));
    }

    #[test]
    fn horizon_boundary_is_inclusive() {
        let config = BookingConfig::default();
        assert!(check_window(d(2026, 10, 22), now(), None, &config).is_ok());
        assert!(matches!(
            check_window(d(2026, 10, 23), now(), None, &config),
            Err(BookingError::HorizonExceeded { days_ahead: 3 })
        ));
    }

    #[test]
    fn facility_override_replaces_default() {
        let config = BookingConfig::default();
        assert!(check_window(d(2026, 10, 26), now(), Some(7), &config).is_ok());
        assert!(matches!(
            check_window(d(2026, 10, 20), now(), Some(0), &config),
            Err(BookingError::HorizonExceeded { days_ahead: 0 })
        ));
    }
}
