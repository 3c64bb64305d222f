mod error;
mod ledger;
mod passes;

pub use error::StoreError;

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::debug;

use crate::model::*;
use crate::wal::Wal;

/// Result of an initialize-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    AlreadyExists,
}

/// Result of the bounded increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// Counter advanced; `count` is the new value.
    Admitted { count: u32 },
    /// Condition failed; nothing was written.
    Rejected { count: u32, max: Option<u32> },
}

/// Result of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    KeyExists,
}

/// The single logical table the booking pipeline talks to.
///
/// Every write is a conditional write against exactly one row, evaluated
/// and applied atomically by the store. There is no multi-row transaction.
#[async_trait]
pub trait Table: Send + Sync {
    async fn park(&self, name: &str) -> Result<Option<Park>, StoreError>;

    async fn facility(&self, key: &FacilityKey) -> Result<Option<Facility>, StoreError>;

    /// Passes in one park partition matching `filter`.
    async fn query_passes(&self, park: &str, filter: &PassFilter) -> Result<Vec<Pass>, StoreError>;

    /// `SET reservations.<date> = {}` if the date entry does not exist.
    async fn init_date_entry(&self, key: &FacilityKey, date: NaiveDate) -> Result<InitOutcome, StoreError>;

    /// `SET reservations.<date>.<type> = 0` if the type entry does not exist.
    async fn init_type_entry(
        &self,
        key: &FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
    ) -> Result<InitOutcome, StoreError>;

    /// `SET reservations.<date>.<type> += by` if the result stays within the
    /// facility's configured maximum for `pass_type`.
    async fn increment_within_max(
        &self,
        key: &FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
        by: u32,
    ) -> Result<IncrementOutcome, StoreError>;

    /// Give back `by` units of a previous increment. Returns the new count.
    async fn release(
        &self,
        key: &FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
        by: u32,
    ) -> Result<u32, StoreError>;

    /// Insert a pass if no row exists at its `(pk, sk)`.
    async fn put_pass_if_absent(&self, pass: &Pass) -> Result<PutOutcome, StoreError>;
}

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the WAL. Waits for one append, drains whatever else is already
/// queued, then commits the whole batch with a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        for (_, tx) in batch {
            let _ = tx.send(match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            });
        }

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so partial bytes don't bleed into the next batch.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// A facility row: configuration plus the nested reservation counters.
#[derive(Debug, Clone)]
pub struct FacilityRow {
    pub facility: Facility,
    pub reservations: Reservations,
}

pub type SharedFacilityRow = Arc<RwLock<FacilityRow>>;

/// One park's pass partition, keyed by registration number.
pub type SharedPassPartition = Arc<RwLock<BTreeMap<String, Pass>>>;

/// In-memory table made durable by the WAL.
///
/// Each row sits behind its own lock; a conditional write holds that lock
/// across evaluate → WAL append → apply, which is what makes it atomic.
pub struct Store {
    parks: DashMap<String, Park>,
    facilities: DashMap<FacilityKey, SharedFacilityRow>,
    passes: DashMap<String, SharedPassPartition>,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Writers share it; compaction takes it exclusively so the snapshot
    /// and the log swap see no interleaved appends.
    compaction_gate: RwLock<()>,
}

/// Apply a counter event to a facility row (caller holds the row lock).
fn apply_to_row(row: &mut FacilityRow, event: &Event) {
    match event {
        Event::DateEntryInitialized { date, .. } => {
            row.reservations.entry(*date).or_default();
        }
        Event::TypeEntryInitialized { date, pass_type, .. } => {
            row.reservations
                .entry(*date)
                .or_default()
                .entry(*pass_type)
                .or_insert(0);
        }
        Event::CounterIncremented { date, pass_type, by, .. } => {
            *row.reservations
                .entry(*date)
                .or_default()
                .entry(*pass_type)
                .or_insert(0) += by;
        }
        Event::CounterReleased { date, pass_type, by, .. } => {
            if let Some(count) = row
                .reservations
                .get_mut(date)
                .and_then(|types| types.get_mut(pass_type))
            {
                *count = count.saturating_sub(*by);
            }
        }
        Event::FacilityPut { facility } => {
            row.facility = facility.clone();
        }
        Event::ParkPut { .. } | Event::PassCreated { .. } => {}
    }
}

impl Store {
    /// Open the store, replaying the WAL at `wal_path`. Must run inside a
    /// tokio runtime: the WAL writer is spawned as a task.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            parks: DashMap::new(),
            facilities: DashMap::new(),
            passes: DashMap::new(),
            wal_tx,
            compaction_gate: RwLock::new(()),
        };
        for event in &events {
            store.replay_event(event);
        }
        debug!(events = events.len(), path = %wal_path.display(), "store replayed");
        Ok(store)
    }

    /// Replay runs before the store is shared, so every try_write succeeds.
    fn replay_event(&self, event: &Event) {
        match event {
            Event::ParkPut { park } => {
                self.parks.insert(park.name.clone(), park.clone());
            }
            Event::FacilityPut { facility } => {
                let key = facility.key();
                match self.facilities.get(&key) {
                    Some(row) => {
                        if let Ok(mut guard) = row.try_write() {
                            apply_to_row(&mut guard, event);
                        }
                    }
                    None => {
                        self.facilities.insert(key, new_row(facility.clone()));
                    }
                }
            }
            Event::PassCreated { pass } => {
                let partition = self.partition(&pass.park_name);
                if let Ok(mut guard) = partition.try_write() {
                    guard.insert(pass.registration_number.clone(), pass.clone());
                }
            }
            Event::DateEntryInitialized { key, .. }
            | Event::TypeEntryInitialized { key, .. }
            | Event::CounterIncremented { key, .. }
            | Event::CounterReleased { key, .. } => {
                if let Some(row) = self.facilities.get(key)
                    && let Ok(mut guard) = row.try_write()
                {
                    apply_to_row(&mut guard, event);
                }
            }
        }
    }

    /// Send an event to the group-commit writer and wait until it is durable.
    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    /// WAL-append then apply, under the row lock the caller already holds.
    pub(super) async fn persist_and_apply(&self, row: &mut FacilityRow, event: &Event) -> Result<(), StoreError> {
        self.wal_append(event).await?;
        apply_to_row(row, event);
        Ok(())
    }

    pub(super) fn facility_row(&self, key: &FacilityKey) -> Result<SharedFacilityRow, StoreError> {
        self.facilities
            .get(key)
            .map(|e| e.value().clone())
            .ok_or_else(|| StoreError::FacilityNotFound(key.clone()))
    }

    pub(super) fn partition(&self, park: &str) -> SharedPassPartition {
        self.passes
            .entry(park.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Insert or replace a park row.
    pub async fn put_park(&self, park: Park) -> Result<(), StoreError> {
        let _gate = self.compaction_gate.read().await;
        self.wal_append(&Event::ParkPut { park: park.clone() }).await?;
        self.parks.insert(park.name.clone(), park);
        Ok(())
    }

    /// Insert a facility row, or replace the configuration of an existing
    /// one. Reservation counters are kept.
    pub async fn put_facility(&self, facility: Facility) -> Result<(), StoreError> {
        let _gate = self.compaction_gate.read().await;
        let key = facility.key();
        let event = Event::FacilityPut { facility: facility.clone() };
        let row = self
            .facilities
            .entry(key)
            .or_insert_with(|| new_row(facility))
            .value()
            .clone();
        let mut guard = row.write().await;
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Current counter for a slot, if it has been materialized.
    pub async fn reserved_count(&self, key: &FacilityKey, date: NaiveDate, pass_type: PassType) -> Option<u32> {
        let row = self.facilities.get(key)?.value().clone();
        let guard = row.read().await;
        guard.reservations.get(&date)?.get(&pass_type).copied()
    }

    /// Full copy of a facility's `reservations` map.
    pub async fn reservations(&self, key: &FacilityKey) -> Option<Reservations> {
        let row = self.facilities.get(key)?.value().clone();
        let guard = row.read().await;
        Some(guard.reservations.clone())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Rewrite the WAL as the minimal event list that rebuilds current state.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let _gate = self.compaction_gate.write().await;
        let mut events: Vec<Event> = self
            .parks
            .iter()
            .map(|e| Event::ParkPut { park: e.value().clone() })
            .collect();

        let rows: Vec<SharedFacilityRow> = self.facilities.iter().map(|e| e.value().clone()).collect();
        for row in rows {
            let guard = row.read().await;
            let key = guard.facility.key();
            events.push(Event::FacilityPut { facility: guard.facility.clone() });
            for (date, types) in &guard.reservations {
                events.push(Event::DateEntryInitialized { key: key.clone(), date: *date });
                for (pass_type, count) in types {
                    events.push(Event::TypeEntryInitialized {
                        key: key.clone(),
                        date: *date,
                        pass_type: *pass_type,
                    });
                    if *count > 0 {
                        events.push(Event::CounterIncremented {
                            key: key.clone(),
                            date: *date,
                            pass_type: *pass_type,
                            by: *count,
                        });
                    }
                }
            }
        }

        let partitions: Vec<SharedPassPartition> = self.passes.iter().map(|e| e.value().clone()).collect();
        for partition in partitions {
            let guard = partition.read().await;
            events.extend(guard.values().map(|pass| Event::PassCreated { pass: pass.clone() }));
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }
}

fn new_row(facility: Facility) -> SharedFacilityRow {
    Arc::new(RwLock::new(FacilityRow {
        facility,
        reservations: Reservations::new(),
    }))
}

#[async_trait]
impl Table for Store {
    async fn park(&self, name: &str) -> Result<Option<Park>, StoreError> {
        Ok(self.parks.get(name).map(|e| e.value().clone()))
    }

    async fn facility(&self, key: &FacilityKey) -> Result<Option<Facility>, StoreError> {
        let Some(row) = self.facilities.get(key).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let guard = row.read().await;
        Ok(Some(guard.facility.clone()))
    }

    async fn query_passes(&self, park: &str, filter: &PassFilter) -> Result<Vec<Pass>, StoreError> {
        self.query_partition(park, filter).await
    }

    async fn init_date_entry(&self, key: &FacilityKey, date: NaiveDate) -> Result<InitOutcome, StoreError> {
        self.ensure_date_entry(key, date).await
    }

    async fn init_type_entry(
        &self,
        key: &FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
    ) -> Result<InitOutcome, StoreError> {
        self.ensure_type_entry(key, date, pass_type).await
    }

    async fn increment_within_max(
        &self,
        key: &FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
        by: u32,
    ) -> Result<IncrementOutcome, StoreError> {
        self.bounded_increment(key, date, pass_type, by).await
    }

    async fn release(
        &self,
        key: &FacilityKey,
        date: NaiveDate,
        pass_type: PassType,
        by: u32,
    ) -> Result<u32, StoreError> {
        self.release_units(key, date, pass_type, by).await
    }

    async fn put_pass_if_absent(&self, pass: &Pass) -> Result<PutOutcome, StoreError> {
        self.insert_pass(pass).await
    }
}
