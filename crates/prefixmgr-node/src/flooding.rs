//! Flooding-store collaborator.
//!
//! The prefix manager owns nothing in the store beyond its own keys. It puts
//! records, subscribes to change notifications for the `prefix:` key space and
//! reacts when someone else overwrites or expires one of its keys.
//!
//! [`MemoryFloodingStore`] is a single-process implementation used by the
//! binary and the tests. Values are kept in their encoded form, a higher
//! version always wins and records expire once their TTL runs out unless
//! refreshed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use prefixmgr_core::{AreaId, CoreError, PrefixRecord};

/// Errors reported by a flooding store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("flooding store unavailable")]
    Unavailable,
    #[error("codec error: {0}")]
    Codec(#[from] CoreError),
}

/// A change notification from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A key was written or removed. `value` is `None` on expiry or removal.
    Changed {
        area: AreaId,
        key: String,
        value: Option<Vec<u8>>,
    },
    /// The store has finished its initial synchronisation with peers.
    Synced,
}

/// Area-scoped key/value store with change notifications.
pub trait FloodingStore: Send + Sync + 'static {
    fn put(
        &self,
        area: &AreaId,
        key: &str,
        record: &PrefixRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get(
        &self,
        area: &AreaId,
        key: &str,
    ) -> impl Future<Output = Result<Option<PrefixRecord>, StoreError>> + Send;

    /// Receive notifications for every key starting with `key_prefix`.
    fn subscribe(
        &self,
        key_prefix: &str,
    ) -> impl Future<Output = mpsc::UnboundedReceiver<StoreEvent>> + Send;
}

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    version: u64,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct StoreState {
    values: HashMap<(AreaId, String), StoredValue>,
    subscribers: Vec<(String, mpsc::UnboundedSender<StoreEvent>)>,
    unavailable: bool,
}

impl StoreState {
    fn notify(&mut self, area: &AreaId, key: &str, value: Option<&[u8]>) {
        self.subscribers.retain(|(prefix, tx)| {
            if !key.starts_with(prefix.as_str()) {
                return !tx.is_closed();
            }
            tx.send(StoreEvent::Changed {
                area: area.clone(),
                key: key.to_string(),
                value: value.map(<[u8]>::to_vec),
            })
            .is_ok()
        });
    }
}

/// In-process flooding store.
#[derive(Debug, Clone, Default)]
pub struct MemoryFloodingStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryFloodingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail until cleared.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Write raw bytes as another writer would, bypassing version merge.
    /// `None` removes the key. Subscribers are notified either way.
    pub async fn inject_raw(&self, area: &AreaId, key: &str, value: Option<Vec<u8>>, version: u64) {
        let mut state = self.state.lock().await;
        let map_key = (area.clone(), key.to_string());
        match value {
            Some(bytes) => {
                state.values.insert(
                    map_key,
                    StoredValue {
                        bytes: bytes.clone(),
                        version,
                        expires_at: Instant::now() + Duration::from_secs(3600),
                    },
                );
                state.notify(area, key, Some(&bytes));
            }
            None => {
                if state.values.remove(&map_key).is_some() {
                    state.notify(area, key, None);
                }
            }
        }
    }

    /// Overwrite a key with `record` regardless of the stored version.
    pub async fn inject(&self, area: &AreaId, key: &str, record: &PrefixRecord) -> Result<(), StoreError> {
        let bytes = record.encode()?;
        self.inject_raw(area, key, Some(bytes), record.version).await;
        Ok(())
    }

    /// Drop every value whose TTL has run out and notify subscribers.
    /// Returns the number of expired keys.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let expired: Vec<(AreaId, String)> = state
            .values
            .iter()
            .filter(|(_, v)| v.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for (area, key) in &expired {
            state.values.remove(&(area.clone(), key.clone()));
            tracing::debug!(%area, key = %key, "record expired");
            state.notify(area, key, None);
        }
        expired.len()
    }

    /// Periodically purge expired records until `shutdown` fires.
    pub fn spawn_expiry(&self, period: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = interval.tick() => {
                        store.purge_expired().await;
                    }
                }
            }
        })
    }

    /// Decoded records currently stored in `area`, sorted by key.
    pub async fn records_in_area(&self, area: &AreaId) -> Vec<(String, PrefixRecord)> {
        let state = self.state.lock().await;
        let mut records: Vec<(String, PrefixRecord)> = state
            .values
            .iter()
            .filter(|((a, _), _)| a == area)
            .filter_map(|((_, key), v)| PrefixRecord::decode(&v.bytes).ok().map(|r| (key.clone(), r)))
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        records
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.values.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.values.is_empty()
    }
}

impl FloodingStore for MemoryFloodingStore {
    async fn put(&self, area: &AreaId, key: &str, record: &PrefixRecord) -> Result<(), StoreError> {
        let bytes = record.encode()?;
        let mut state = self.state.lock().await;
        if state.unavailable {
            return Err(StoreError::Unavailable);
        }

        let expires_at = Instant::now() + Duration::from_millis(record.ttl_ms);
        let map_key = (area.clone(), key.to_string());
        match state.values.get_mut(&map_key) {
            Some(existing) if existing.version > record.version => {
                // older write loses
                return Ok(());
            }
            Some(existing) if existing.version == record.version && existing.bytes == bytes => {
                existing.expires_at = expires_at;
                return Ok(());
            }
            _ => {}
        }

        state.values.insert(
            map_key,
            StoredValue {
                bytes: bytes.clone(),
                version: record.version,
                expires_at,
            },
        );
        state.notify(area, key, Some(&bytes));
        Ok(())
    }

    async fn get(&self, area: &AreaId, key: &str) -> Result<Option<PrefixRecord>, StoreError> {
        let state = self.state.lock().await;
        match state.values.get(&(area.clone(), key.to_string())) {
            Some(v) => Ok(Some(PrefixRecord::decode(&v.bytes)?)),
            None => Ok(None),
        }
    }

    async fn subscribe(&self, key_prefix: &str) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Nothing to pull from peers: the initial sync is complete at once.
        let _ = tx.send(StoreEvent::Synced);
        self.state
            .lock()
            .await
            .subscribers
            .push((key_prefix.to_string(), tx));
        rx
    }
}
