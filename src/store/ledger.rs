use chrono::NaiveDate;
use tracing::debug;

use crate::model::*;

use super::{IncrementOutcome, InitOutcome, Store, StoreError};

impl Store {
    pub(super) async fn ensure_date_entry(
        &self,
        key: &FacilityKey,
        date: NaiveDate,
    ) -> Result<InitOutcome, StoreError> {
        let _gate = self.compaction_gate.read().await;
        let row = self.facility_row(key)?;
        let mut guard = row.write().await;
        if guard.reservations.contains_key(&date) {
            return Ok(InitOutcome::AlreadyExists);
        }
        let event = Event::DateEntryInitialized { key: key.clone(), date };
        self.persist_and_apply(&mut guard, &event).await?;
        debug!(facility = %key, %date, "date entry initialized");
        Ok(InitOutcome::Created)
    }

    pub(super) async fn ensure_type_entry(
        &self,
        key: &FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
    ) -> Result<InitOutcome, StoreError> {
        let _gate = self.compaction_gate.read().await;
        let row = self.facility_row(key)?;
        let mut guard = row.write().await;
        if guard
            .reservations
            .get(&date)
            .is_some_and(|types| types.contains_key(&pass_type))
        {
            return Ok(InitOutcome::AlreadyExists);
        }
        let event = Event::TypeEntryInitialized {
            key: key.clone(),
            date,
            pass_type,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        debug!(facility = %key, %date, %pass_type, "type entry initialized");
        Ok(InitOutcome::Created)
    }

    /// The admission check. The maximum is read from the same row under the
    /// same lock as the counter, so evaluate and increment cannot interleave
    /// with another writer. A type with no configured maximum never admits.
    pub(super) async fn bounded_increment(
        &self,
        key: &FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
        by: u32,
    ) -> Result<IncrementOutcome, StoreError> {
        let _gate = self.compaction_gate.read().await;
        let row = self.facility_row(key)?;
        let mut guard = row.write().await;
        let max = guard.facility.max_for(pass_type);
        let count = guard
            .reservations
            .get(&date)
            .and_then(|types| types.get(&pass_type))
            .copied()
            .unwrap_or(0);

        let admitted = max.is_some_and(|max| count.checked_add(by).is_some_and(|next| next <= max));
        if !admitted {
            return Ok(IncrementOutcome::Rejected { count, max });
        }

        let event = Event::CounterIncremented {
            key: key.clone(),
            date,
            pass_type,
            by,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(IncrementOutcome::Admitted { count: count + by })
    }

    pub(super) async fn release_units(
        &self,
        key: &FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
        by: u32,
    ) -> Result<u32, StoreError> {
        let _gate = self.compaction_gate.read().await;
        let row = self.facility_row(key)?;
        let mut guard = row.write().await;
        let event = Event::CounterReleased {
            key: key.clone(),
            date,
            pass_type,
            by,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(guard
            .reservations
            .get(&date)
            .and_then(|types| types.get(&pass_type))
            .copied()
            .unwrap_or(0))
    }
}
