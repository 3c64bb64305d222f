use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::captcha::TokenVerifier;
use crate::limits::{MAX_FIELD_LEN, MAX_GUESTS_PER_PASS, MAX_TRAIL_GUESTS};
use crate::model::{FacilityType, PassType};

use super::window::parse_requested_date;
use super::ValidationError;

/// Booking request as received. Every field is optional so a missing one
/// surfaces as a validation error instead of a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub park_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub facility_name: Option<String>,
    pub facility_type: Option<FacilityType>,
    pub email: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub pass_type: Option<PassType>,
    pub number_of_guests: Option<u32>,
    pub phone_number: Option<String>,
    pub captcha_jwt: Option<String>,
}

/// A request that passed every input check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidBooking {
    pub park_name: String,
    pub first_name: String,
    pub last_name: String,
    pub facility_name: String,
    pub facility_type: FacilityType,
    pub email: String,
    pub date: NaiveDate,
    pub pass_type: PassType,
    pub number_of_guests: u32,
    pub phone_number: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingField(field))?;
    if value.len() > MAX_FIELD_LEN {
        return Err(ValidationError::FieldTooLong(field));
    }
    Ok(value)
}

impl BookingRequest {
    /// Bot check first, then guest rules, then the remaining fields.
    pub fn validate(self, verifier: &dyn TokenVerifier) -> Result<ValidBooking, ValidationError> {
        let token = self
            .captcha_jwt
            .filter(|t| !t.is_empty())
            .ok_or(ValidationError::MissingCaptcha)?;
        if !verifier.verify(&token) {
            return Err(ValidationError::CaptchaFailed);
        }

        let facility_type = self
            .facility_type
            .ok_or(ValidationError::MissingField("facilityType"))?;
        let number_of_guests = match facility_type {
            FacilityType::Parking => 1,
            FacilityType::Trail => guests(self.number_of_guests, MAX_TRAIL_GUESTS, true)?,
            FacilityType::Other(_) => guests(self.number_of_guests, MAX_GUESTS_PER_PASS, false)?,
        };

        let phone_number = self
            .phone_number
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        if phone_number.as_ref().is_some_and(|p| p.len() > MAX_FIELD_LEN) {
            return Err(ValidationError::FieldTooLong("phoneNumber"));
        }

        Ok(ValidBooking {
            park_name: required(self.park_name, "parkName")?,
            first_name: required(self.first_name, "firstName")?,
            last_name: required(self.last_name, "lastName")?,
            facility_name: required(self.facility_name, "facilityName")?,
            email: required(self.email, "email")?,
            date: parse_requested_date(&required(self.date, "date")?)?,
            pass_type: self.pass_type.ok_or(ValidationError::MissingField("type"))?,
            facility_type,
            number_of_guests,
            phone_number,
        })
    }
}

fn guests(requested: Option<u32>, max: u32, on_trail: bool) -> Result<u32, ValidationError> {
    match requested {
        None | Some(0) => Err(ValidationError::NoGuests),
        Some(n) if n > max => Err(ValidationError::TooManyGuests {
            requested: n,
            max,
            on_trail,
        }),
        Some(n) => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::{SharedToken, UpstreamVerified};

    fn request() -> BookingRequest {
        BookingRequest {
            park_name: Some("Mount Seymour".into()),
            first_name: Some("Alan".into()),
            last_name: Some("Turing".into()),
            facility_name: Some("Trailhead".into()),
            facility_type: Some(FacilityType::Trail),
            email: Some("alan@example.com".into()),
            date: Some("2026-10-20".into()),
            pass_type: Some(PassType::AM),
            number_of_guests: Some(2),
            phone_number: None,
            captcha_jwt: Some("token".into()),
        }
    }

    #[test]
    fn parses_wire_format() {
        let json = r#"{
            "parkName": "Mount Seymour", "firstName": "Alan", "lastName": "Turing",
            "facilityName": "Trailhead", "facilityType": "Trail", "email": "alan@example.com",
            "date": "2026-10-20", "type": "DAY", "numberOfGuests": 3, "captchaJwt": "t"
        }"#;
        let req: BookingRequest = serde_json::from_str(json).unwrap();
        let valid = req.validate(&UpstreamVerified).unwrap();
        assert_eq!(valid.pass_type, PassType::DAY);
        assert_eq!(valid.number_of_guests, 3);
        assert_eq!(valid.date, NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
    }

    #[test]
    fn captcha_checked_first() {
        let mut req = request();
        req.captcha_jwt = None;
        req.email = None;
        assert_eq!(req.validate(&UpstreamVerified), Err(ValidationError::MissingCaptcha));

        assert_eq!(
            request().validate(&SharedToken("other".into())),
            Err(ValidationError::CaptchaFailed)
        );
    }

    #[test]
    fn trail_caps_guests_at_four() {
        let mut req = request();
        req.number_of_guests = Some(5);
        assert_eq!(
            req.validate(&UpstreamVerified),
            Err(ValidationError::TooManyGuests {
                requested: 5,
                max: 4,
                on_trail: true
            })
        );
    }

    #[test]
    fn parking_is_always_one_guest() {
        let mut req = request();
        req.facility_type = Some(FacilityType::Parking);
        req.number_of_guests = Some(9);
        assert_eq!(req.validate(&UpstreamVerified).unwrap().number_of_guests, 1);

        let mut req = request();
        req.facility_type = Some(FacilityType::Parking);
        req.number_of_guests = None;
        assert_eq!(req.validate(&UpstreamVerified).unwrap().number_of_guests, 1);
    }

    #[test]
    fn other_facility_types_cap_at_fifty() {
        let mut req = request();
        req.facility_type = Some(FacilityType::Other("Campground".into()));
        req.number_of_guests = Some(MAX_GUESTS_PER_PASS);
        assert_eq!(req.clone().validate(&UpstreamVerified).unwrap().number_of_guests, 50);

        req.number_of_guests = Some(MAX_GUESTS_PER_PASS + 1);
        assert_eq!(
            req.validate(&UpstreamVerified),
            Err(ValidationError::TooManyGuests {
                requested: 51,
                max: 50,
                on_trail: false
            })
        );
    }

    #[test]
    fn zero_guests_rejected() {
        let mut req = request();
        req.number_of_guests = Some(0);
        assert_eq!(req.validate(&UpstreamVerified), Err(ValidationError::NoGuests));
    }

    #[test]
    fn blank_fields_are_missing() {
        let mut req = request();
        req.last_name = Some("   ".into());
        assert_eq!(
            req.validate(&UpstreamVerified),
            Err(ValidationError::MissingField("lastName"))
        );
    }

    #[test]
    fn oversized_fields_rejected() {
        let mut req = request();
        req.first_name = Some("x".repeat(MAX_FIELD_LEN + 1));
        assert_eq!(
            req.validate(&UpstreamVerified),
            Err(ValidationError::FieldTooLong("firstName"))
        );
    }

    #[test]
    fn bad_date_rejected() {
        let mut req = request();
        req.date = Some("20/10/2026".into());
        assert!(matches!(
            req.validate(&UpstreamVerified),
            Err(ValidationError::InvalidDate(_))
        ));
    }
}
