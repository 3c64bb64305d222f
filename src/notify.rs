use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::NotifyConfig;
use crate::model::{FacilityType, Park, Pass};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notify request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bad cancellation link: {0}")]
    Link(#[from] url::ParseError),
}

/// Template variables of the booking receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Personalisation {
    pub first_name: String,
    pub last_name: String,
    pub date: String,
    #[serde(rename = "type")]
    pub pass_type: String,
    pub facility_name: String,
    pub number_of_guests: String,
    pub registration_number: String,
    pub cancellation_link: String,
    pub park_name: String,
    pub map_link: Option<String>,
    pub parks_link: Option<String>,
}

/// GC Notify email request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub email_address: String,
    pub template_id: String,
    pub personalisation: Personalisation,
}

/// Link that lets the holder cancel their pass.
pub fn cancellation_link(pass: &Pass, config: &NotifyConfig) -> Result<Url, url::ParseError> {
    let base = format!("{}{}", config.public_frontend, config.cancellation_route);
    let date = pass.short_pass_date.to_string();
    Url::parse_with_params(
        &base,
        [
            ("passId", pass.registration_number.as_str()),
            ("email", pass.email.as_str()),
            ("park", pass.park_name.as_str()),
            ("date", date.as_str()),
            ("type", pass.pass_type.as_str()),
        ],
    )
}

/// Receipt for `pass`. With delivery disabled the cancellation link is
/// left empty when no frontend is configured.
pub fn build_receipt(pass: &Pass, park: &Park, config: &NotifyConfig) -> Result<Receipt, NotifyError> {
    let link = match cancellation_link(pass, config) {
        Ok(url) => url.to_string(),
        Err(_) if config.api_path.is_none() => String::new(),
        Err(e) => return Err(e.into()),
    };
    let template_id = match pass.facility_type {
        FacilityType::Parking => config.parking_template.clone(),
        _ => config.trail_template.clone(),
    };
    Ok(Receipt {
        email_address: pass.email.clone(),
        template_id,
        personalisation: Personalisation {
            first_name: pass.first_name.clone(),
            last_name: pass.last_name.clone(),
            date: pass.short_pass_date.format("%B %-d, %Y").to_string(),
            pass_type: pass.pass_type.display_label().to_string(),
            facility_name: pass.facility_name.clone(),
            number_of_guests: pass.number_of_guests.to_string(),
            registration_number: pass.registration_number.clone(),
            cancellation_link: link,
            park_name: pass.park_name.clone(),
            map_link: park.map_link.clone(),
            parks_link: park.bc_parks_link.clone(),
        },
    })
}

/// Delivers booking receipts. Failure never undoes a booking.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), NotifyError>;
}

/// GC Notify email API client.
pub struct GcNotify {
    client: reqwest::Client,
    api_path: String,
    api_key: String,
}

impl GcNotify {
    pub fn new(api_path: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_path,
            api_key,
        }
    }
}

#[async_trait]
impl Notifier for GcNotify {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), NotifyError> {
        self.client
            .post(&self.api_path)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .json(receipt)
            .send()
            .await?
            .error_for_status()?;
        debug!(template = %receipt.template_id, "receipt sent");
        Ok(())
    }
}

/// Logs receipts instead of sending them; used when no API is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), NotifyError> {
        info!(
            registration_number = %receipt.personalisation.registration_number,
            template = %receipt.template_id,
            "notify disabled, receipt not sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PassStatus, PassType};
    use chrono::NaiveDate;

    fn config() -> NotifyConfig {
        NotifyConfig {
            api_path: None,
            api_key: String::new(),
            trail_template: "trail-tpl".into(),
            parking_template: "parking-tpl".into(),
            public_frontend: "https://reserve.example.ca".into(),
            cancellation_route: "/cancel".into(),
        }
    }

    fn pass(facility_type: FacilityType) -> Pass {
        Pass {
            park_name: "Mount Robson".into(),
            registration_number: "7ZK3QW9D2M".into(),
            first_name: "Katherine".into(),
            search_first_name: "katherine".into(),
            last_name: "Johnson".into(),
            search_last_name: "johnson".into(),
            facility_name: "Berg Lake".into(),
            email: "kj+parks@example.com".into(),
            date: "2026-10-20T19:00:00.000Z".into(),
            short_pass_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            pass_type: PassType::DAY,
            number_of_guests: 3,
            pass_status: PassStatus::Reserved,
            phone_number: None,
            facility_type,
            creation_date: "2026-10-19T17:00:00.000Z".into(),
        }
    }

    fn park() -> Park {
        Park {
            name: "Mount Robson".into(),
            visible: true,
            map_link: Some("https://maps.example/robson".into()),
            bc_parks_link: Some("https://bcparks.ca/robson".into()),
        }
    }

    #[test]
    fn cancellation_link_encodes_query() {
        let link = cancellation_link(&pass(FacilityType::Trail), &config()).unwrap();
        assert_eq!(link.path(), "/cancel");
        let pairs: Vec<(String, String)> = link.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("passId".into(), "7ZK3QW9D2M".into()));
        assert_eq!(pairs[1], ("email".into(), "kj+parks@example.com".into()));
        assert_eq!(pairs[2], ("park".into(), "Mount Robson".into()));
        assert_eq!(pairs[3], ("date".into(), "2026-10-20".into()));
        assert_eq!(pairs[4], ("type".into(), "DAY".into()));
    }

    #[test]
    fn receipt_uses_facility_template_and_labels() {
        let receipt = build_receipt(&pass(FacilityType::Trail), &park(), &config()).unwrap();
        assert_eq!(receipt.template_id, "trail-tpl");
        assert_eq!(receipt.personalisation.pass_type, "ALL DAY");
        assert_eq!(receipt.personalisation.date, "October 20, 2026");
        assert_eq!(receipt.personalisation.number_of_guests, "3");

        let receipt = build_receipt(&pass(FacilityType::Parking), &park(), &config()).unwrap();
        assert_eq!(receipt.template_id, "parking-tpl");
    }

    #[test]
    fn missing_frontend_is_a_link_error_when_delivering() {
        let delivering = NotifyConfig {
            api_path: Some("https://notify.example/v2/email".into()),
            ..NotifyConfig::default()
        };
        let result = build_receipt(&pass(FacilityType::Trail), &park(), &delivering);
        assert!(matches!(result, Err(NotifyError::Link(_))));
    }

    #[test]
    fn disabled_delivery_builds_receipt_without_link() {
        let receipt = build_receipt(&pass(FacilityType::Trail), &park(), &NotifyConfig::default()).unwrap();
        assert!(receipt.personalisation.cancellation_link.is_empty());
        assert_eq!(receipt.personalisation.registration_number, "7ZK3QW9D2M");
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let receipt = build_receipt(&pass(FacilityType::Trail), &park(), &config()).unwrap();
        tokio_test::assert_ok!(LogNotifier.send_receipt(&receipt).await);
    }
}
