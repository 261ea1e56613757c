//! services/gallery/src/gallery/store_client.rs
//!
//! The photo record store client: subject-scoped create, query, subscribe and
//! delete on top of the `PhotoStore` port.

use futures::StreamExt;
use lecture_gallery_core::domain::{NewPhoto, PhotoFilter, PhotoRecord};
use lecture_gallery_core::ports::{PhotoStore, PortError, PortResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A long-lived handle on the document store, shared by every view.
#[derive(Clone)]
pub struct PhotoStoreClient {
    store: Arc<dyn PhotoStore>,
}

impl PhotoStoreClient {
    pub fn new(store: Arc<dyn PhotoStore>) -> Self {
        Self { store }
    }

    /// Creates a record with a fresh idempotency key.
    pub async fn create(
        &self,
        subject: &str,
        owner_id: &str,
        image_data: String,
    ) -> PortResult<PhotoRecord> {
        self.create_with_request_id(Uuid::new_v4(), subject, owner_id, image_data)
            .await
    }

    /// Creates a record under a caller-chosen idempotency key. Re-sending the
    /// same key after a timeout cannot produce a duplicate.
    pub async fn create_with_request_id(
        &self,
        request_id: Uuid,
        subject: &str,
        owner_id: &str,
        image_data: String,
    ) -> PortResult<PhotoRecord> {
        let record = self
            .store
            .insert_photo(NewPhoto {
                request_id,
                subject: subject.to_string(),
                owner_id: owner_id.to_string(),
                image_data,
            })
            .await?;
        info!(
            "Created photo {} for subject '{}' (request {}).",
            record.id, subject, request_id
        );
        Ok(record)
    }

    /// One-shot fetch of every record for `subject`, narrowed to `owner_id` when given.
    pub async fn query_by_subject(
        &self,
        subject: &str,
        owner_id: Option<&str>,
    ) -> PortResult<Vec<PhotoRecord>> {
        let filter = PhotoFilter::new(subject, owner_id.map(str::to_string));
        let photos = self.store.find_photos(&filter).await?;
        debug!("Fetched {} photos for subject '{}'.", photos.len(), subject);
        Ok(photos)
    }

    /// Opens a live channel for `subject`.
    ///
    /// `on_change` receives the full matching set each time it changes, until
    /// the returned subscription is cancelled or dropped. Errors from the feed
    /// go to `on_error` and do not end the subscription. A feed the store
    /// closes on its own is reported to `on_error` as a read error.
    pub async fn subscribe<C, E>(
        &self,
        subject: &str,
        owner_id: Option<&str>,
        on_change: C,
        on_error: E,
    ) -> PortResult<Subscription>
    where
        C: Fn(Vec<PhotoRecord>) + Send + 'static,
        E: Fn(PortError) + Send + 'static,
    {
        let filter = PhotoFilter::new(subject, owner_id.map(str::to_string));
        let mut feed = self.store.watch_photos(&filter).await?;
        let token = CancellationToken::new();
        let task_token = token.clone();
        let ended = Arc::new(AtomicBool::new(false));
        let task_ended = ended.clone();
        let subject = filter.subject.clone();

        let task = tokio::spawn(async move {
            info!("Subscription for subject '{}' started.", subject);
            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    item = feed.next() => match item {
                        Some(Ok(photos)) if !task_token.is_cancelled() => on_change(photos),
                        Some(Err(e)) if !task_token.is_cancelled() => {
                            warn!("Subscription for subject '{}' reported: {}", subject, e);
                            on_error(e);
                        }
                        Some(_) => break,
                        None => {
                            task_ended.store(true, Ordering::SeqCst);
                            if !task_token.is_cancelled() {
                                warn!("Feed for subject '{}' ended unexpectedly.", subject);
                                on_error(PortError::StoreReadError(
                                    "live feed ended".to_string(),
                                ));
                            }
                            break;
                        }
                    },
                }
            }
            info!("Subscription for subject '{}' stopped.", subject);
        });

        Ok(Subscription {
            subject: filter.subject,
            token,
            ended,
            task: Some(task),
        })
    }

    /// Deletes one record. Only its owner may do so.
    pub async fn remove(&self, photo_id: Uuid, requester_id: &str) -> PortResult<()> {
        self.store.delete_photo(photo_id, requester_id).await?;
        info!("Deleted photo {}.", photo_id);
        Ok(())
    }
}

/// A running live subscription. Dropping it cancels it.
pub struct Subscription {
    subject: String,
    token: CancellationToken,
    ended: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Stops delivery. No callback runs after this returns, except one that
    /// was already executing.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// False once cancelled or once the store closed the feed.
    pub fn is_live(&self) -> bool {
        !self.is_cancelled() && !self.ended.load(Ordering::SeqCst)
    }

    /// Cancels and waits for the delivery task to finish.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Subscription task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
