//! services/gallery/src/adapters/memory_store.rs
//!
//! An in-process implementation of the `PhotoStore` port. It behaves like the
//! remote document store (server-assigned ids and timestamps, a record-size
//! ceiling, live feeds keyed by filter) and backs local runs and tests.

use async_stream::stream;
use async_trait::async_trait;
use chrono::Utc;
use lecture_gallery_core::domain::{NewPhoto, PhotoFilter, PhotoRecord};
use lecture_gallery_core::ports::{PhotoFeed, PhotoStore, PortError, PortResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Default record-size ceiling, matching a typical document store limit.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1_048_576;

const CHANGE_BUFFER: usize = 64;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A document store held in memory. Clones share the same data.
#[derive(Clone)]
pub struct InMemoryPhotoStore {
    inner: Arc<Inner>,
}

struct Inner {
    records: RwLock<Records>,
    changes: broadcast::Sender<u64>,
    max_record_bytes: usize,
}

#[derive(Default)]
struct Records {
    photos: Vec<PhotoRecord>,
    by_request: HashMap<Uuid, Uuid>,
    version: u64,
}

impl Default for InMemoryPhotoStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPhotoStore {
    pub fn new() -> Self {
        Self::with_record_limit(DEFAULT_MAX_RECORD_BYTES)
    }

    /// Creates a store that rejects records whose image data exceeds `max_record_bytes`.
    pub fn with_record_limit(max_record_bytes: usize) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Arc::new(Inner {
                records: RwLock::new(Records::default()),
                changes,
                max_record_bytes,
            }),
        }
    }

    /// Total number of records across all subjects.
    pub async fn len(&self) -> usize {
        self.inner.records.read().await.photos.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of live feeds currently attached.
    pub fn watcher_count(&self) -> usize {
        self.inner.changes.receiver_count()
    }
}

impl Inner {
    async fn snapshot(&self, filter: &PhotoFilter) -> Vec<PhotoRecord> {
        self.records
            .read()
            .await
            .photos
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect()
    }

    fn notify(&self, version: u64) {
        // No receivers simply means nobody is watching.
        let _ = self.changes.send(version);
    }
}

//=========================================================================================
// `PhotoStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl PhotoStore for InMemoryPhotoStore {
    async fn insert_photo(&self, photo: NewPhoto) -> PortResult<PhotoRecord> {
        if photo.subject.trim().is_empty() || photo.owner_id.trim().is_empty() {
            return Err(PortError::StoreWriteError(
                "subject and owner are required".to_string(),
            ));
        }
        if photo.image_data.len() > self.inner.max_record_bytes {
            return Err(PortError::StoreWriteError(format!(
                "record of {} bytes exceeds the {} byte limit",
                photo.image_data.len(),
                self.inner.max_record_bytes
            )));
        }

        let mut records = self.inner.records.write().await;
        if let Some(existing_id) = records.by_request.get(&photo.request_id).copied() {
            if let Some(existing) = records.photos.iter().find(|p| p.id == existing_id) {
                if existing.subject != photo.subject || existing.owner_id != photo.owner_id {
                    return Err(PortError::StoreWriteError(format!(
                        "request {} was already used for a different record",
                        photo.request_id
                    )));
                }
                return Ok(existing.clone());
            }
        }

        let record = PhotoRecord {
            id: Uuid::new_v4(),
            subject: photo.subject,
            owner_id: photo.owner_id,
            image_data: photo.image_data,
            created_at: Utc::now(),
        };
        records.by_request.insert(photo.request_id, record.id);
        records.photos.push(record.clone());
        records.version += 1;
        let version = records.version;
        drop(records);

        self.inner.notify(version);
        Ok(record)
    }

    async fn find_photos(&self, filter: &PhotoFilter) -> PortResult<Vec<PhotoRecord>> {
        Ok(self.inner.snapshot(filter).await)
    }

    async fn watch_photos(&self, filter: &PhotoFilter) -> PortResult<PhotoFeed> {
        // Subscribe before the first snapshot so no change can slip between them.
        let mut changes = self.inner.changes.subscribe();
        let inner = self.inner.clone();
        let filter = filter.clone();

        let feed = stream! {
            let mut last = inner.snapshot(&filter).await;
            yield Ok(last.clone());
            loop {
                match changes.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        let next = inner.snapshot(&filter).await;
                        if next != last {
                            last = next.clone();
                            yield Ok(next);
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        };
        Ok(Box::pin(feed))
    }

    async fn delete_photo(&self, photo_id: Uuid, owner_id: &str) -> PortResult<()> {
        let mut records = self.inner.records.write().await;
        let position = records
            .photos
            .iter()
            .position(|p| p.id == photo_id)
            .ok_or_else(|| PortError::StoreWriteError(format!("photo {} not found", photo_id)))?;
        if records.photos[position].owner_id != owner_id {
            return Err(PortError::StoreWriteError(format!(
                "permission denied: photo {} belongs to another user",
                photo_id
            )));
        }
        records.photos.remove(position);
        records.by_request.retain(|_, id| *id != photo_id);
        records.version += 1;
        let version = records.version;
        drop(records);

        self.inner.notify(version);
        Ok(())
    }
}
