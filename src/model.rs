use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Bookable time slot within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PassType {
    AM,
    PM,
    DAY,
}

impl PassType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassType::AM => "AM",
            PassType::PM => "PM",
            PassType::DAY => "DAY",
        }
    }

    /// Label used in receipts.
    pub fn display_label(&self) -> &'static str {
        match self {
            PassType::DAY => "ALL DAY",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for PassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status shared with the scheduled status updater.
///
/// Booking only ever writes the initial value (`Reserved` or `Active`).
/// `Reserved -> Active -> Expired` transitions of existing passes belong to
/// the external scheduler and are never performed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    Reserved,
    Active,
    Expired,
}

impl PassStatus {
    /// Statuses that still hold a slot for their owner.
    pub fn is_live(&self) -> bool {
        matches!(self, PassStatus::Reserved | PassStatus::Active)
    }
}

/// Kind of facility a pass is booked against. Unknown names are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FacilityType {
    Trail,
    Parking,
    Other(String),
}

impl From<String> for FacilityType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Trail" => FacilityType::Trail,
            "Parking" => FacilityType::Parking,
            _ => FacilityType::Other(s),
        }
    }
}

impl From<FacilityType> for String {
    fn from(t: FacilityType) -> Self {
        match t {
            FacilityType::Trail => "Trail".into(),
            FacilityType::Parking => "Parking".into(),
            FacilityType::Other(s) => s,
        }
    }
}

impl fmt::Display for FacilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacilityType::Trail => f.write_str("Trail"),
            FacilityType::Parking => f.write_str("Parking"),
            FacilityType::Other(s) => f.write_str(s),
        }
    }
}

/// Capacity configuration of one pass type at a facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCapacity {
    pub max: u32,
}

/// Facility configuration. Read-only to the booking pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub park_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub facility_type: FacilityType,
    /// Per-type daily maxima. A type without an entry is not offered.
    pub booking_times: BTreeMap<PassType, SlotCapacity>,
    pub booking_days_ahead: Option<u32>,
    pub booking_opening_hour: Option<u32>,
}

impl Facility {
    pub fn key(&self) -> FacilityKey {
        FacilityKey::new(&self.park_name, &self.name)
    }

    pub fn max_for(&self, pass_type: PassType) -> Option<u32> {
        self.booking_times.get(&pass_type).map(|slot| slot.max)
    }
}

/// Park row: visibility and informational links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Park {
    pub name: String,
    pub visible: bool,
    pub map_link: Option<String>,
    pub bc_parks_link: Option<String>,
}

/// `(park, facility)`: partition + sort key of a facility row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacilityKey {
    pub park: String,
    pub facility: String,
}

impl FacilityKey {
    pub fn new(park: &str, facility: &str) -> Self {
        Self {
            park: park.to_string(),
            facility: facility.to_string(),
        }
    }

    pub fn pk(&self) -> String {
        format!("facility::{}", self.park)
    }
}

impl fmt::Display for FacilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk(), self.facility)
    }
}

/// Nested `reservations` attribute of a facility row: date → type → guests.
pub type Reservations = BTreeMap<NaiveDate, BTreeMap<PassType, u32>>;

/// An issued pass. Immutable once written, except for `pass_status`,
/// which only the external scheduler advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pass {
    pub park_name: String,
    pub registration_number: String,
    pub first_name: String,
    pub search_first_name: String,
    pub last_name: String,
    pub search_last_name: String,
    pub facility_name: String,
    pub email: String,
    /// UTC ISO-8601 instant of the slot's canonical mid-day time.
    pub date: String,
    /// Calendar date of the slot in the operating timezone.
    pub short_pass_date: NaiveDate,
    #[serde(rename = "type")]
    pub pass_type: PassType,
    pub number_of_guests: u32,
    pub pass_status: PassStatus,
    pub phone_number: Option<String>,
    pub facility_type: FacilityType,
    pub creation_date: String,
}

impl Pass {
    pub fn pk(&self) -> String {
        format!("pass::{}", self.park_name)
    }

    pub fn sk(&self) -> &str {
        &self.registration_number
    }
}

/// Filter evaluated over one park's pass partition.
#[derive(Debug, Clone, Default)]
pub struct PassFilter {
    pub facility_name: Option<String>,
    pub email: Option<String>,
    pub pass_type: Option<PassType>,
    pub date: Option<NaiveDate>,
    /// Empty means any status.
    pub statuses: Vec<PassStatus>,
}

impl PassFilter {
    pub fn matches(&self, pass: &Pass) -> bool {
        self.facility_name.as_ref().is_none_or(|f| *f == pass.facility_name)
            && self.email.as_ref().is_none_or(|e| *e == pass.email)
            && self.pass_type.is_none_or(|t| t == pass.pass_type)
            && self.date.is_none_or(|d| d == pass.short_pass_date)
            && (self.statuses.is_empty() || self.statuses.contains(&pass.pass_status))
    }
}

/// WAL record: one event per committed conditional write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ParkPut {
        park: Park,
    },
    FacilityPut {
        facility: Facility,
    },
    DateEntryInitialized {
        key: FacilityKey,
        date: NaiveDate,
    },
    TypeEntryInitialized {
        key: FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
    },
    CounterIncremented {
        key: FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
        by: u32,
    },
    CounterReleased {
        key: FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
        by: u32,
    },
    PassCreated {
        pass: Pass,
    },
}
