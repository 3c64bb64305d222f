use thiserror::Error;

use crate::model::FacilityKey;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("facility not found: {0}")]
    FacilityNotFound(FacilityKey),
    #[error("WAL error: {0}")]
    Wal(String),
}
