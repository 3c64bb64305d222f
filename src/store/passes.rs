use crate::model::*;

use super::{PutOutcome, Store, StoreError};

impl Store {
    pub(super) async fn query_partition(&self, park: &str, filter: &PassFilter) -> Result<Vec<Pass>, StoreError> {
        let Some(partition) = self.passes.get(park).map(|e| e.value().clone()) else {
            return Ok(Vec::new());
        };
        let guard = partition.read().await;
        Ok(guard.values().filter(|p| filter.matches(p)).cloned().collect())
    }

    pub(super) async fn insert_pass(&self, pass: &Pass) -> Result<PutOutcome, StoreError> {
        let _gate = self.compaction_gate.read().await;
        let partition = self.partition(&pass.park_name);
        let mut guard = partition.write().await;
        if guard.contains_key(&pass.registration_number) {
            return Ok(PutOutcome::KeyExists);
        }
        self.wal_append(&Event::PassCreated { pass: pass.clone() }).await?;
        guard.insert(pass.registration_number.clone(), pass.clone());
        Ok(PutOutcome::Inserted)
    }

    /// Number of passes stored for a park.
    pub async fn pass_count(&self, park: &str) -> usize {
        match self.passes.get(park).map(|e| e.value().clone()) {
            Some(partition) => partition.read().await.len(),
            None => 0,
        }
    }
}
