use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Malformed or disallowed input, rejected before any store interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("request body missing or unparseable")]
    BadRequest,
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("field too long: {0}")]
    FieldTooLong(&'static str),
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
    #[error("guest count must be at least 1")]
    NoGuests,
    #[error("too many guests: {requested} > {max}")]
    TooManyGuests { requested: u32, max: u32, on_trail: bool },
    #[error("missing bot verification token")]
    MissingCaptcha,
    #[error("bot verification failed")]
    CaptchaFailed,
}

/// Every way a booking can be refused.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("requested date is before today")]
    PastDate,
    #[error("requested date is more than {days_ahead} days ahead")]
    HorizonExceeded { days_ahead: u32 },
    #[error("AM slot closed at {closing_hour}:00")]
    SlotExpired { opening_hour: u32, closing_hour: u32 },
    #[error("identity already holds a pass for this slot")]
    DuplicateBooking,
    #[error("slot is full")]
    CapacityExhausted,
    #[error("registration number already in use: {0}")]
    DuplicateKey(String),
    #[error("facility not found: {0}")]
    FacilityNotFound(String),
    #[error("park not found or not visible: {0}")]
    ParkUnavailable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// User-facing `{title, msg}` pair. Carries no internal detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub title: String,
    pub msg: String,
}

impl Rejection {
    fn new(title: &str, msg: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            msg: msg.into(),
        }
    }

    pub fn operation_failed() -> Self {
        Self::new("Operation Failed", "Something went wrong.")
    }
}

/// `7` → `7am`, `12` → `12pm`, `15` → `3pm`.
pub(crate) fn to_12h(hour: u32) -> String {
    let period = if hour > 11 { "pm" } else { "am" };
    let hour = match hour {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    format!("{hour}{period}")
}

impl BookingError {
    pub fn rejection(&self) -> Rejection {
        match self {
            BookingError::Validation(v) => match v {
                ValidationError::MissingCaptcha => {
                    Rejection::new("Missing CAPTCHA verification", "Missing CAPTCHA verification.")
                }
                ValidationError::CaptchaFailed => {
                    Rejection::new("CAPTCHA verification failed", "CAPTCHA verification failed.")
                }
                ValidationError::TooManyGuests { max, on_trail, .. } => Rejection::new(
                    "Too many guests",
                    format!(
                        "You cannot have more than {max} guests on a {}.",
                        if *on_trail { "trail" } else { "pass" }
                    ),
                ),
                _ => Rejection::new("Bad Request", "There was an error in your submission."),
            },
            BookingError::PastDate => Rejection::new(
                "Booking date in the past",
                "You cannot book for a date in the past.",
            ),
            BookingError::HorizonExceeded { .. } => Rejection::new(
                "Booking date in the future invalid",
                "You cannot book for a date that far ahead.",
            ),
            BookingError::SlotExpired {
                opening_hour,
                closing_hour,
            } => Rejection::new(
                "AM time slot has expired",
                format!(
                    "It is too late to book an AM pass on this day (AM time slot is from {} to {}).",
                    to_12h(*opening_hour),
                    to_12h(*closing_hour)
                ),
            ),
            BookingError::DuplicateBooking => Rejection::new(
                "This email account already has a reservation for this booking time.",
                "A reservation associated with this email for this booking time already exists. \
                 Please check to see if you already have a reservation for this time. If you do not \
                 have an email confirmation of your reservation please contact \
                 <a href=\"mailto:parkinfo@gov.bc.ca\">parkinfo@gov.bc.ca</a>",
            ),
            BookingError::CapacityExhausted => Rejection::new(
                "Sorry, we are unable to fill your specific request.",
                "We have sold out of allotted passes for this time, please check back on the site \
                 from time to time as new passes may come available.",
            ),
            BookingError::DuplicateKey(_)
            | BookingError::FacilityNotFound(_)
            | BookingError::ParkUnavailable(_)
            | BookingError::Store(_) => Rejection::operation_failed(),
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "validation",
            BookingError::PastDate => "past_date",
            BookingError::HorizonExceeded { .. } => "horizon_exceeded",
            BookingError::SlotExpired { .. } => "slot_expired",
            BookingError::DuplicateBooking => "duplicate_booking",
            BookingError::CapacityExhausted => "capacity_exhausted",
            BookingError::DuplicateKey(_) => "duplicate_key",
            BookingError::FacilityNotFound(_) => "facility_not_found",
            BookingError::ParkUnavailable(_) => "park_unavailable",
            BookingError::Store(_) => "store_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twelve_hour_labels() {
        assert_eq!(to_12h(0), "12am");
        assert_eq!(to_12h(7), "7am");
        assert_eq!(to_12h(12), "12pm");
        assert_eq!(to_12h(15), "3pm");
    }

    #[test]
    fn slot_expired_names_the_window() {
        let r = BookingError::SlotExpired {
            opening_hour: 7,
            closing_hour: 12,
        }
        .rejection();
        assert_eq!(r.title, "AM time slot has expired");
        assert!(r.msg.contains("from 7am to 12pm"));
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let r = BookingError::Store(StoreError::Wal("disk full".into())).rejection();
        assert_eq!(r, Rejection::operation_failed());
        assert!(!r.msg.contains("disk"));
    }
}
