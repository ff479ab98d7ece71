//! Record store contract and the in-memory implementation.
//!
//! # Invariants
//! - Identifiers come from a monotonic key generator and are never reused, not even after
//!   [`RecordStore::clear`].
//! - Writing a record with an explicit identifier at or above the generator's next value
//!   advances the generator past it.
//! - Deleting an absent identifier is a no-op.
//! - Every operation touches at most one record, except `clear`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use thiserror::Error;

use crate::record::{records_to_json, Record, RecordId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Single-table record store keyed by an auto-assigned identifier.
///
/// Implementations are used from one thread; futures need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    type Error: From<StoreError>;

    /// Snapshot of every record, in no particular order.
    async fn get_all(&self) -> Result<Vec<Record>, Self::Error>;

    /// Inserts `record` under a fresh identifier and returns it.
    ///
    /// `record.id` is ignored.
    async fn add(&self, record: Record) -> Result<RecordId, Self::Error>;

    /// Inserts or replaces the record stored under `record.id`.
    ///
    /// Fails with [`StoreError::Malformed`] when `record.id` is `None`.
    async fn put(&self, record: Record) -> Result<RecordId, Self::Error>;

    async fn delete(&self, id: RecordId) -> Result<(), Self::Error>;

    async fn clear(&self) -> Result<(), Self::Error>;
}

/// Returns every record as a JSON array string.
pub async fn get_all_json<S: RecordStore>(store: &S) -> Result<String, S::Error> {
    let records = store.get_all().await?;
    Ok(records_to_json(&records)?)
}

/// Parses `json` as a new record and inserts it, discarding any `id` it carries.
pub async fn add_json<S: RecordStore>(store: &S, json: &str) -> Result<RecordId, S::Error> {
    let record = Record::parse_for_insert(json)?;
    store.add(record).await
}

/// Parses `json` as an existing record (with `id`) and upserts it.
pub async fn put_json<S: RecordStore>(store: &S, json: &str) -> Result<RecordId, S::Error> {
    let record = Record::parse_for_put(json)?;
    store.put(record).await
}

/// In-memory [`RecordStore`] with the same key-generator rules as the IndexedDB store.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug)]
struct MemoryState {
    records: BTreeMap<RecordId, Record>,
    next_id: u64,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records. Fails like every other operation once the lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.state()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store mutex poisoned".to_string()))
    }
}

impl RecordStore for MemoryRecordStore {
    type Error = StoreError;

    async fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        let state = self.state()?;
        Ok(state.records.values().cloned().collect())
    }

    async fn add(&self, mut record: Record) -> Result<RecordId, StoreError> {
        let mut state = self.state()?;
        let id = RecordId::new(state.next_id)
            .ok_or_else(|| StoreError::Backend("key generator exhausted".to_string()))?;
        state.next_id = state
            .next_id
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend("key generator exhausted".to_string()))?;
        record.id = Some(id);
        state.records.insert(id, record);
        debug!("event=record_add store=memory id={id}");
        Ok(id)
    }

    async fn put(&self, record: Record) -> Result<RecordId, StoreError> {
        let id = record
            .id
            .ok_or_else(|| StoreError::Malformed("record has no `id` field".to_string()))?;
        let mut state = self.state()?;
        if id.get() >= state.next_id {
            state.next_id = id.get().saturating_add(1);
        }
        state.records.insert(id, record);
        debug!("event=record_put store=memory id={id}");
        Ok(id)
    }

    async fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.records.remove(&id);
        debug!("event=record_delete store=memory id={id}");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.records.clear();
        debug!("event=record_clear store=memory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn poisoned_lock_is_reported_not_hidden() {
        let store = MemoryRecordStore::new();
        block_on(store.add(Record::new().with_field("name", "A"))).unwrap();
        assert_eq!(store.len().unwrap(), 1);

        let shared = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.state.lock().unwrap();
            panic!("poison the store");
        })
        .join();

        assert!(matches!(store.len(), Err(StoreError::Backend(_))));
        assert!(matches!(store.is_empty(), Err(StoreError::Backend(_))));
        assert!(matches!(block_on(store.get_all()), Err(StoreError::Backend(_))));
    }
}
