mod duplicate;
mod error;
mod ledger;
mod request;
mod status;
mod window;
mod writer;

pub use duplicate::check_duplicate;
pub use error::{BookingError, Rejection, ValidationError};
pub use ledger::{release, reserve, SlotKey};
pub use request::{BookingRequest, ValidBooking};
pub use status::resolve_status;
pub use window::{check_horizon, check_not_past, check_window, normalize, parse_requested_date, today, SlotDate};
pub use writer::{registration_number, write_pass};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::captcha::TokenVerifier;
use crate::config::{BookingConfig, NotifyConfig};
use crate::model::{FacilityKey, Park, Pass};
use crate::notify::{build_receipt, Notifier};
use crate::store::Table;

/// Annotation on a success response whose receipt could not be delivered.
pub const NOTIFY_FAILED: &str = "Email Failed to Send";

/// A created pass and whether its receipt went out.
#[derive(Debug, Clone)]
pub struct Booked {
    pub pass: Pass,
    pub notified: bool,
}

/// Status code + JSON body, the shape every request is answered with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub body: serde_json::Value,
}

impl Response {
    pub fn ok(body: serde_json::Value) -> Self {
        Self { status_code: 200, body }
    }

    pub fn rejected(rejection: &Rejection) -> Self {
        Self {
            status_code: 400,
            body: json!({ "title": rejection.title, "msg": rejection.msg }),
        }
    }
}

/// Pass row as returned to the caller: table keys plus attributes. The
/// park lives in `pk` only.
#[derive(Serialize)]
struct PassItem<'a> {
    pk: String,
    sk: &'a str,
    #[serde(flatten)]
    pass: &'a Pass,
    #[serde(skip_serializing_if = "Option::is_none")]
    err: Option<&'static str>,
}

impl Booked {
    pub fn to_body(&self) -> serde_json::Value {
        let item = PassItem {
            pk: self.pass.pk(),
            sk: self.pass.sk(),
            pass: &self.pass,
            err: (!self.notified).then_some(NOTIFY_FAILED),
        };
        let mut body = serde_json::to_value(item).unwrap_or_else(|_| json!({}));
        if let Some(fields) = body.as_object_mut() {
            fields.remove("parkName");
        }
        body
    }
}

/// Runs the admission pipeline. Holds no booking state of its own: all
/// coordination between concurrent requests happens in the `Table`.
pub struct BookingService {
    table: Arc<dyn Table>,
    notifier: Arc<dyn Notifier>,
    verifier: Arc<dyn TokenVerifier>,
    config: BookingConfig,
    notify_config: NotifyConfig,
}

impl BookingService {
    pub fn new(
        table: Arc<dyn Table>,
        notifier: Arc<dyn Notifier>,
        verifier: Arc<dyn TokenVerifier>,
        config: BookingConfig,
        notify_config: NotifyConfig,
    ) -> Self {
        Self {
            table,
            notifier,
            verifier,
            config,
            notify_config,
        }
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    /// Answer one raw request body.
    pub async fn handle(&self, body: &str, now: DateTime<Utc>) -> Response {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
            return self.reject(BookingError::Validation(ValidationError::BadRequest));
        };
        if value.get("warmup").and_then(|w| w.as_bool()) == Some(true) {
            return Response::ok(json!({}));
        }
        let Ok(request) = serde_json::from_value::<BookingRequest>(value) else {
            return self.reject(BookingError::Validation(ValidationError::BadRequest));
        };

        match self.book(request, now).await {
            Ok(booked) => Response::ok(booked.to_body()),
            Err(e) => Response::rejected(&e.rejection()),
        }
    }

    fn reject(&self, e: BookingError) -> Response {
        metrics::counter!(crate::observability::BOOKINGS_TOTAL, "outcome" => e.kind()).increment(1);
        Response::rejected(&e.rejection())
    }

    /// Book a pass, stopping at the first failing step.
    pub async fn book(&self, request: BookingRequest, now: DateTime<Utc>) -> Result<Booked, BookingError> {
        let start = Instant::now();
        let result = self.run(request, now).await;
        metrics::histogram!(crate::observability::BOOKING_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());
        let outcome = match &result {
            Ok(_) => "created",
            Err(e) => e.kind(),
        };
        metrics::counter!(crate::observability::BOOKINGS_TOTAL, "outcome" => outcome).increment(1);
        match &result {
            Err(BookingError::Store(e)) => error!("booking failed: {e}"),
            Err(e @ (BookingError::DuplicateKey(_) | BookingError::FacilityNotFound(_) | BookingError::ParkUnavailable(_))) => {
                warn!("booking failed: {e}")
            }
            Err(BookingError::DuplicateBooking) => warn!("booking rejected: duplicate for this slot"),
            Err(e) => info!(reason = e.kind(), "booking rejected"),
            Ok(_) => {}
        }
        result
    }

    async fn run(&self, request: BookingRequest, now: DateTime<Utc>) -> Result<Booked, BookingError> {
        let booking = request.validate(self.verifier.as_ref())?;
        let table = self.table.as_ref();
        let slot = check_not_past(booking.date, now, &self.config)?;

        let key = FacilityKey::new(&booking.park_name, &booking.facility_name);
        let facility = table
            .facility(&key)
            .await?
            .ok_or_else(|| BookingError::FacilityNotFound(key.to_string()))?;
        check_horizon(slot.date, now, facility.booking_days_ahead, &self.config)?;
        let pass_status = resolve_status(
            booking.pass_type,
            slot.date,
            now,
            facility.booking_opening_hour,
            &self.config,
        )?;

        let park = table
            .park(&booking.park_name)
            .await?
            .filter(|p| p.visible)
            .ok_or_else(|| BookingError::ParkUnavailable(booking.park_name.clone()))?;

        check_duplicate(
            table,
            &booking.park_name,
            &booking.facility_name,
            &booking.email,
            booking.pass_type,
            slot.date,
        )
        .await?;

        let slot_key = SlotKey {
            facility: key,
            date: slot.date,
            pass_type: booking.pass_type,
        };
        reserve(table, &slot_key, booking.number_of_guests).await?;

        let pass = Pass {
            park_name: booking.park_name,
            registration_number: registration_number(),
            search_first_name: booking.first_name.to_lowercase(),
            first_name: booking.first_name,
            search_last_name: booking.last_name.to_lowercase(),
            last_name: booking.last_name,
            facility_name: booking.facility_name,
            email: booking.email,
            date: slot.utc_iso(),
            short_pass_date: slot.date,
            pass_type: booking.pass_type,
            number_of_guests: booking.number_of_guests,
            pass_status,
            phone_number: booking.phone_number,
            facility_type: booking.facility_type,
            creation_date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        if let Err(e) = write_pass(table, &pass).await {
            self.compensate(&slot_key, pass.number_of_guests).await;
            return Err(e);
        }

        let notified = self.send_receipt(&pass, &park).await;
        Ok(Booked { pass, notified })
    }

    /// Hand back capacity reserved for a pass that was never written.
    async fn compensate(&self, slot: &SlotKey, guests: u32) {
        match release(self.table.as_ref(), slot, guests).await {
            Ok(count) => warn!(
                facility = %slot.facility,
                date = %slot.date,
                pass_type = %slot.pass_type,
                guests,
                count,
                "pass write failed, capacity released"
            ),
            Err(e) => error!(
                facility = %slot.facility,
                date = %slot.date,
                pass_type = %slot.pass_type,
                guests,
                "pass write failed and capacity release failed: {e}"
            ),
        }
    }

    async fn send_receipt(&self, pass: &Pass, park: &Park) -> bool {
        let result = match build_receipt(pass, park, &self.notify_config) {
            Ok(receipt) => self.notifier.send_receipt(&receipt).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(registration_number = %pass.registration_number, "receipt not sent: {e}");
                metrics::counter!(crate::observability::NOTIFY_FAILURES_TOTAL).increment(1);
                false
            }
        }
    }
}
