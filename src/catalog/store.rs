//! Storage collaborator contract
//!
//! [`AppStore`] is what the catalog needs from a document store: ordered
//! listing, an atomic create that assigns id and timestamp, delete by id, and
//! a change stream of ordered snapshots. [`MemoryStore`] implements it for
//! guest/local mode and tests. [`CatalogView`] is the local list a presenter
//! keeps, with optimistic delete.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::record::{now_millis, NewWebApp, RawTimestamp, WebApp};
use crate::error::PersistenceError;

/// Buffered snapshots per subscriber before it starts skipping
const CHANGE_BUFFER: usize = 16;

/// What a successful create hands back
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRef {
    /// Store-assigned identifier
    pub id: String,
    /// Server timestamp, in whatever shape the store uses
    pub created_at: RawTimestamp,
}

/// Document store operations used by the catalog
#[async_trait]
pub trait AppStore: Send + Sync {
    /// All records, newest `createdAt` first
    async fn list(&self) -> Result<Vec<WebApp>, PersistenceError>;

    /// Persist a record; the store assigns `id` and `createdAt`
    async fn create(&self, app: NewWebApp) -> Result<StoredRef, PersistenceError>;

    /// Remove a record by id
    async fn delete(&self, id: &str) -> Result<(), PersistenceError>;

    /// Ordered snapshots: the current list first, then one per change
    fn subscribe(&self) -> BoxStream<'static, Vec<WebApp>>;
}

/// In-process [`AppStore`]
#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<Vec<WebApp>>,
    changes: broadcast::Sender<Vec<WebApp>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            records: RwLock::new(Vec::new()),
            changes,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going down (or coming back)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn ensure_available(&self) -> Result<(), PersistenceError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PersistenceError::Unavailable("memory store offline".to_string()))
        }
    }

    fn snapshot(&self) -> Vec<WebApp> {
        self.records.read().clone()
    }

    fn publish(&self) {
        // No subscribers is fine
        let _ = self.changes.send(self.snapshot());
    }
}

#[async_trait]
impl AppStore for MemoryStore {
    async fn list(&self) -> Result<Vec<WebApp>, PersistenceError> {
        self.ensure_available()?;
        Ok(self.snapshot())
    }

    async fn create(&self, app: NewWebApp) -> Result<StoredRef, PersistenceError> {
        self.ensure_available()?;
        if app.url.trim().is_empty() {
            return Err(PersistenceError::Rejected("url is required".to_string()));
        }

        let id = Uuid::new_v4().simple().to_string();
        let created_at = {
            let mut records = self.records.write();
            // Keep createdAt strictly increasing so newest-first order is total
            let latest = records.first().map(|r| r.created_at).unwrap_or(i64::MIN);
            let created_at = now_millis().max(latest.saturating_add(1));
            records.insert(0, app.into_record(id.clone(), created_at));
            created_at
        };
        debug!(id = %id, "Record stored");
        self.publish();

        Ok(StoredRef {
            id,
            created_at: RawTimestamp::Seconds {
                seconds: created_at.div_euclid(1000),
                nanoseconds: created_at.rem_euclid(1000) * 1_000_000,
            },
        })
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.ensure_available()?;
        let removed = {
            let mut records = self.records.write();
            let before = records.len();
            records.retain(|r| r.id != id);
            records.len() != before
        };
        if !removed {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        debug!(id = %id, "Record deleted");
        self.publish();
        Ok(())
    }

    fn subscribe(&self) -> BoxStream<'static, Vec<WebApp>> {
        let rx = self.changes.subscribe();
        let initial = self.snapshot();

        let updates = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(snapshot) => return Some((snapshot, rx)),
                    // Every message is a full snapshot, so skipping ahead is safe
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        stream::once(future::ready(initial)).chain(updates).boxed()
    }
}

/// A presenter's local, ordered copy of the catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    items: Vec<WebApp>,
}

impl CatalogView {
    /// Empty view
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in display order
    pub fn items(&self) -> &[WebApp] {
        &self.items
    }

    /// Replace contents with a store snapshot
    pub fn apply_snapshot(&mut self, snapshot: Vec<WebApp>) {
        self.items = snapshot;
    }

    /// Show a record that is not (yet) persisted, e.g. in guest mode
    pub fn insert_local(&mut self, app: WebApp) {
        self.items.insert(0, app);
    }

    /// Find a record by id
    pub fn get(&self, id: &str) -> Option<&WebApp> {
        self.items.iter().find(|a| a.id == id)
    }

    /// Remove a record right away, then delete it from the store
    ///
    /// If the store refuses, the record goes back to its original position and
    /// the error is returned.
    pub async fn delete(
        &mut self,
        store: &dyn AppStore,
        id: &str,
    ) -> Result<(), PersistenceError> {
        let removed = self
            .items
            .iter()
            .position(|a| a.id == id)
            .map(|idx| (idx, self.items.remove(idx)));

        match store.delete(id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Some((idx, app)) = removed {
                    warn!(id = %id, "Delete failed, restoring record: {}", e);
                    let idx = idx.min(self.items.len());
                    self.items.insert(idx, app);
                }
                Err(e)
            }
        }
    }
}
