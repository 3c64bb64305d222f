use std::path::PathBuf;
use std::str::FromStr;

use chrono_tz::Tz;
use thiserror::Error;

use crate::limits::MAX_BOOKING_DAYS_AHEAD;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Vancouver;
pub const DEFAULT_BOOKING_DAYS_AHEAD: u32 = 3;
pub const DEFAULT_AM_OPENING_HOUR: u32 = 7;
pub const DEFAULT_PM_OPENING_HOUR: u32 = 12;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("{var} out of range: {value}")]
    OutOfRange { var: &'static str, value: u32 },
    #[error("{var} must be set when {required_by} is set")]
    Missing {
        var: &'static str,
        required_by: &'static str,
    },
}

/// Settings the booking pipeline consults on every request.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Timezone that defines "today", date boundaries and opening hours.
    pub timezone: Tz,
    pub default_booking_days_ahead: u32,
    pub default_am_opening_hour: u32,
    /// Opening hour of PM passes. Also the hour the AM slot closes.
    pub pm_opening_hour: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            default_booking_days_ahead: DEFAULT_BOOKING_DAYS_AHEAD,
            default_am_opening_hour: DEFAULT_AM_OPENING_HOUR,
            pm_opening_hour: DEFAULT_PM_OPENING_HOUR,
        }
    }
}

/// GC Notify delivery and receipt link settings. Delivery is disabled
/// when `api_path` is unset.
#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    pub api_path: Option<String>,
    pub api_key: String,
    pub trail_template: String,
    pub parking_template: String,
    pub public_frontend: String,
    pub cancellation_route: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub seed_path: Option<PathBuf>,
    /// Shared bot-check token; unset means the check is enforced upstream.
    pub captcha_token: Option<String>,
    pub booking: BookingConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Load from `PARKPASS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let timezone = match get("PARKPASS_TIMEZONE") {
            Some(name) => Tz::from_str(&name).map_err(|_| ConfigError::Invalid {
                var: "PARKPASS_TIMEZONE",
                value: name,
            })?,
            None => DEFAULT_TIMEZONE,
        };
        let booking = BookingConfig {
            timezone,
            default_booking_days_ahead: parse_or(&get, "PARKPASS_BOOKING_DAYS_AHEAD", DEFAULT_BOOKING_DAYS_AHEAD)?,
            default_am_opening_hour: hour_or(&get, "PARKPASS_AM_OPENING_HOUR", DEFAULT_AM_OPENING_HOUR)?,
            pm_opening_hour: hour_or(&get, "PARKPASS_PM_OPENING_HOUR", DEFAULT_PM_OPENING_HOUR)?,
        };
        if booking.default_booking_days_ahead > MAX_BOOKING_DAYS_AHEAD {
            return Err(ConfigError::OutOfRange {
                var: "PARKPASS_BOOKING_DAYS_AHEAD",
                value: booking.default_booking_days_ahead,
            });
        }

        let notify = NotifyConfig {
            api_path: get("PARKPASS_NOTIFY_API_PATH"),
            api_key: get("PARKPASS_NOTIFY_API_KEY").unwrap_or_default(),
            trail_template: get("PARKPASS_NOTIFY_TRAIL_TEMPLATE").unwrap_or_default(),
            parking_template: get("PARKPASS_NOTIFY_PARKING_TEMPLATE").unwrap_or_default(),
            public_frontend: get("PARKPASS_PUBLIC_FRONTEND").unwrap_or_default(),
            cancellation_route: get("PARKPASS_CANCELLATION_ROUTE").unwrap_or_default(),
        };
        if notify.api_path.is_some() {
            for (var, value) in [
                ("PARKPASS_PUBLIC_FRONTEND", &notify.public_frontend),
                ("PARKPASS_CANCELLATION_ROUTE", &notify.cancellation_route),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Missing {
                        var,
                        required_by: "PARKPASS_NOTIFY_API_PATH",
                    });
                }
            }
        }

        Ok(Self {
            bind: get("PARKPASS_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "PARKPASS_PORT", 7878)?,
            data_dir: PathBuf::from(get("PARKPASS_DATA_DIR").unwrap_or_else(|| "./data".into())),
            max_connections: parse_or(&get, "PARKPASS_MAX_CONNECTIONS", 256)?,
            compact_threshold: parse_or(&get, "PARKPASS_COMPACT_THRESHOLD", 1000)?,
            metrics_port: get("PARKPASS_METRICS_PORT")
                .map(|v| parse_value("PARKPASS_METRICS_PORT", v))
                .transpose()?,
            seed_path: get("PARKPASS_SEED").map(PathBuf::from),
            captcha_token: get("PARKPASS_CAPTCHA_TOKEN").filter(|t| !t.is_empty()),
            booking,
            notify,
        })
    }
}

fn parse_value<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value })
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        Some(value) => parse_value(var, value),
        None => Ok(default),
    }
}

fn hour_or(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    let hour = parse_or(get, var, default)?;
    if hour > 23 {
        return Err(ConfigError::OutOfRange { var, value: hour });
    }
    Ok(hour)
}
