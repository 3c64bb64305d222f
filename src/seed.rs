use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::model::{Facility, Park};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("reading seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing seed file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Park and facility rows to upsert at startup.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub parks: Vec<Park>,
    #[serde(default)]
    pub facilities: Vec<Facility>,
}

impl Seed {
    pub fn from_file(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Upsert every row. Existing reservation counters are untouched.
    pub async fn apply(self, store: &Store) -> Result<(usize, usize), SeedError> {
        let counts = (self.parks.len(), self.facilities.len());
        for park in self.parks {
            store.put_park(park).await?;
        }
        for facility in self.facilities {
            store.put_facility(facility).await?;
        }
        Ok(counts)
    }
}
