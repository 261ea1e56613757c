//! Shared fakes for the gallery integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use futures::{stream, StreamExt};
use gallery_lib::adapters::{InMemoryPhotoStore, LocalIdentity, StillFrameCamera};
use gallery_lib::config::{GalleryScope, StrategyKind};
use gallery_lib::gallery::{strategy, Encoder, GallerySynchronizer, PhotoStoreClient};
use image::{DynamicImage, ImageFormat, RgbImage};
use lecture_gallery_core::domain::{
    CurrentUser, Frame, NewPhoto, PhotoFilter, PhotoRecord, StreamConstraints,
};
use lecture_gallery_core::ports::{
    CaptureDevice, ConfirmationPrompt, IdentityService, MediaStream, PhotoFeed, PhotoStore,
    PortError, PortResult,
};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

//=========================================================================================
// Store
//=========================================================================================

/// An in-memory store whose reads and writes can be made to fail or stall.
#[derive(Clone)]
pub struct FlakyStore {
    pub inner: InMemoryPhotoStore,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    fail_watch: Arc<AtomicBool>,
    hold_next_read: Arc<AtomicBool>,
    read_held: Arc<Notify>,
    release_read: Arc<Notify>,
    hold_next_write: Arc<AtomicBool>,
    write_held: Arc<Notify>,
    release_write: Arc<Notify>,
    hold_next_watch: Arc<AtomicBool>,
    watch_held: Arc<Notify>,
    release_watch: Arc<Notify>,
    break_next_watch: Arc<AtomicBool>,
    inserts: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryPhotoStore::new(),
            fail_reads: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_watch: Arc::new(AtomicBool::new(false)),
            hold_next_read: Arc::new(AtomicBool::new(false)),
            read_held: Arc::new(Notify::new()),
            release_read: Arc::new(Notify::new()),
            hold_next_write: Arc::new(AtomicBool::new(false)),
            write_held: Arc::new(Notify::new()),
            release_write: Arc::new(Notify::new()),
            hold_next_watch: Arc::new(AtomicBool::new(false)),
            watch_held: Arc::new(Notify::new()),
            release_watch: Arc::new(Notify::new()),
            break_next_watch: Arc::new(AtomicBool::new(false)),
            inserts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_watch(&self, on: bool) {
        self.fail_watch.store(on, Ordering::SeqCst);
    }

    /// The next read snapshots the store, then waits for `release_read`.
    pub fn hold_next_read(&self) {
        self.hold_next_read.store(true, Ordering::SeqCst);
    }

    pub async fn read_is_held(&self) {
        self.read_held.notified().await;
    }

    pub fn release_read(&self) {
        self.release_read.notify_one();
    }

    /// The next insert waits for `release_write` before reaching the store.
    pub fn hold_next_write(&self) {
        self.hold_next_write.store(true, Ordering::SeqCst);
    }

    pub async fn write_is_held(&self) {
        self.write_held.notified().await;
    }

    pub fn release_write(&self) {
        self.release_write.notify_one();
    }

    /// The next subscription handshake waits for `release_watch`.
    pub fn hold_next_watch(&self) {
        self.hold_next_watch.store(true, Ordering::SeqCst);
    }

    pub async fn watch_is_held(&self) {
        self.watch_held.notified().await;
    }

    pub fn release_watch(&self) {
        self.release_watch.notify_one();
    }

    /// The next feed delivers its initial set, one error, then closes.
    pub fn break_next_watch(&self) {
        self.break_next_watch.store(true, Ordering::SeqCst);
    }

    /// How many inserts reached this store, held or failed ones included.
    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhotoStore for FlakyStore {
    async fn insert_photo(&self, photo: NewPhoto) -> PortResult<PhotoRecord> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.hold_next_write.swap(false, Ordering::SeqCst) {
            self.write_held.notify_one();
            self.release_write.notified().await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::StoreWriteError("connection reset".to_string()));
        }
        self.inner.insert_photo(photo).await
    }

    async fn find_photos(&self, filter: &PhotoFilter) -> PortResult<Vec<PhotoRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PortError::StoreReadError("connection reset".to_string()));
        }
        let result = self.inner.find_photos(filter).await;
        if self.hold_next_read.swap(false, Ordering::SeqCst) {
            self.read_held.notify_one();
            self.release_read.notified().await;
        }
        result
    }

    async fn watch_photos(&self, filter: &PhotoFilter) -> PortResult<PhotoFeed> {
        if self.fail_watch.load(Ordering::SeqCst) {
            return Err(PortError::StoreReadError("subscription refused".to_string()));
        }
        if self.hold_next_watch.swap(false, Ordering::SeqCst) {
            self.watch_held.notify_one();
            self.release_watch.notified().await;
        }
        let mut feed = self.inner.watch_photos(filter).await?;
        if !self.break_next_watch.swap(false, Ordering::SeqCst) {
            return Ok(feed);
        }
        let initial = feed.next().await;
        let lost = Err(PortError::StoreReadError("listener lost".to_string()));
        Ok(Box::pin(stream::iter(initial.into_iter().chain([lost]))))
    }

    async fn delete_photo(&self, photo_id: Uuid, owner_id: &str) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::StoreWriteError("connection reset".to_string()));
        }
        self.inner.delete_photo(photo_id, owner_id).await
    }
}

//=========================================================================================
// Cameras
//=========================================================================================

pub fn test_frame(width: u32, height: u32) -> Frame {
    Frame {
        width,
        height,
        rgba: vec![128; (width * height * 4) as usize],
    }
}

pub fn still_camera() -> Arc<StillFrameCamera> {
    Arc::new(StillFrameCamera::new("rear", test_frame(1600, 1200)))
}

/// A camera whose acquisition blocks until `release` is called.
pub struct GatedCamera {
    pub inner: Arc<StillFrameCamera>,
    entered: Notify,
    release: Notify,
}

impl GatedCamera {
    pub fn new() -> Self {
        Self {
            inner: still_camera(),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    pub async fn acquisition_started(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl CaptureDevice for GatedCamera {
    fn is_supported(&self) -> bool {
        true
    }

    async fn acquire(&self, constraints: StreamConstraints) -> PortResult<Box<dyn MediaStream>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.acquire(constraints).await
    }
}

/// A camera the user refuses access to.
pub struct DenyingCamera;

#[async_trait]
impl CaptureDevice for DenyingCamera {
    fn is_supported(&self) -> bool {
        true
    }

    async fn acquire(&self, _constraints: StreamConstraints) -> PortResult<Box<dyn MediaStream>> {
        Err(PortError::PermissionDenied("user dismissed the prompt".to_string()))
    }
}

//=========================================================================================
// Prompt, Images and Harness
//=========================================================================================

/// Answers every confirmation with a fixed response and records the questions.
pub struct ScriptedPrompt {
    answer: bool,
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ConfirmationPrompt for ScriptedPrompt {
    async fn confirm(&self, message: &str) -> bool {
        self.asked.lock().push(message.to_string());
        self.answer
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn user(id: &str) -> CurrentUser {
    CurrentUser::new(id)
}

pub struct Harness {
    pub store: FlakyStore,
    pub identity: Arc<LocalIdentity>,
    pub sync: Arc<GallerySynchronizer>,
}

pub fn harness(kind: StrategyKind) -> Harness {
    harness_with(kind, GalleryScope::Owner, true)
}

pub fn harness_with(kind: StrategyKind, scope: GalleryScope, reconcile_on_enter: bool) -> Harness {
    let store = FlakyStore::new();
    let identity = Arc::new(LocalIdentity::signed_in(user("u1")));
    let sync = Arc::new(GallerySynchronizer::new(
        PhotoStoreClient::new(Arc::new(store.clone())),
        identity.clone() as Arc<dyn IdentityService>,
        strategy::for_kind(kind),
        scope,
        reconcile_on_enter,
        Encoder::default(),
    ));
    Harness {
        store,
        identity,
        sync,
    }
}

/// Polls `check` until it holds, failing the test after a second.
pub async fn eventually<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
