//! services/gallery/src/gallery/sync.rs
//!
//! The gallery synchronizer. It owns the photo collection of the subject view
//! currently on screen and keeps it consistent with the document store through
//! whichever `ReconciliationStrategy` the deployment selected.
//!
//! Every view gets an epoch; every reconciliation result gets a ticket. A
//! result is applied only if its epoch is still current and its ticket is
//! newer than the last one applied, so a slow fetch for an old subject (or an
//! old submit) can never overwrite newer state.

use crate::config::GalleryScope;
use crate::gallery::capture::CaptureController;
use crate::gallery::encoder::Encoder;
use crate::gallery::preview::PreviewClick;
use crate::gallery::state::{GalleryViewState, ViewPhase};
use crate::gallery::store_client::PhotoStoreClient;
use crate::gallery::strategy::ReconciliationStrategy;
use lecture_gallery_core::domain::{EncodedImage, PhotoRecord};
use lecture_gallery_core::ports::{ConfirmationPrompt, IdentityService, PortError, PortResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DELETE_PROMPT: &str = "Delete this photo?";

/// How a delete request ended.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The user did not confirm; nothing was sent to the store.
    Declined,
}

//=========================================================================================
// Shared View State and Per-View Context
//=========================================================================================

struct SyncState {
    epoch: u64,
    view: GalleryViewState,
    issued: u64,
    applied: u64,
    pending_pulls: usize,
}

/// A handle on one entered subject view, tagged with its epoch.
///
/// Strategies receive this and write results back through it; writes from a
/// context whose epoch is no longer current are dropped.
#[derive(Clone)]
pub struct ViewContext {
    client: PhotoStoreClient,
    subject: String,
    owner_id: String,
    read_owner: Option<String>,
    epoch: u64,
    shared: Arc<Mutex<SyncState>>,
}

impl ViewContext {
    pub fn client(&self) -> &PhotoStoreClient {
        &self.client
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The signed-in user the view was entered for.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// The owner filter applied to reads (`None` when the view is subject-wide).
    pub fn read_owner(&self) -> Option<&str> {
        self.read_owner.as_deref()
    }

    pub fn is_current(&self) -> bool {
        self.shared.lock().epoch == self.epoch
    }

    /// Reserves a ticket for a pull and flags the view as loading.
    pub fn begin_pull(&self) -> Option<u64> {
        let mut state = self.shared.lock();
        if state.epoch != self.epoch {
            return None;
        }
        state.issued += 1;
        state.pending_pulls += 1;
        state.view.loading = true;
        state.view.error = None;
        if state.view.phase == ViewPhase::Empty {
            state.view.phase = ViewPhase::Loading;
        }
        Some(state.issued)
    }

    /// Applies the outcome of the pull holding `ticket`, unless something newer
    /// has already been applied.
    pub fn finish_pull(&self, ticket: u64, result: PortResult<Vec<PhotoRecord>>) {
        let mut state = self.shared.lock();
        if state.epoch != self.epoch {
            debug!("Dropping pull result for stale view '{}'.", self.subject);
            return;
        }
        state.pending_pulls = state.pending_pulls.saturating_sub(1);
        state.view.loading = state.pending_pulls > 0;
        if ticket <= state.applied {
            debug!(
                "Discarding pull #{} for '{}'; #{} is already applied.",
                ticket, self.subject, state.applied
            );
            return;
        }
        state.applied = ticket;
        state.view.phase = ViewPhase::Ready;
        match result {
            Ok(photos) => {
                state.view.preview.retain_in(&photos);
                state.view.photos = photos;
            }
            Err(e) => {
                warn!("Fetching photos for '{}' failed: {}", self.subject, e);
                state.view.error = Some(e.to_string());
            }
        }
    }

    /// Marks the subscription handshake as outstanding.
    pub fn begin_push(&self) {
        let mut state = self.shared.lock();
        if state.epoch != self.epoch {
            return;
        }
        state.view.loading = true;
        state.view.error = None;
        if state.view.phase == ViewPhase::Empty {
            state.view.phase = ViewPhase::Loading;
        }
    }

    /// Applies a full result set delivered by a live subscription.
    pub fn apply_push(&self, photos: Vec<PhotoRecord>) {
        let mut state = self.shared.lock();
        if state.epoch != self.epoch {
            debug!("Dropping pushed snapshot for stale view '{}'.", self.subject);
            return;
        }
        state.issued += 1;
        state.applied = state.issued;
        state.view.loading = false;
        state.view.phase = ViewPhase::Ready;
        state.view.preview.retain_in(&photos);
        state.view.photos = photos;
    }

    /// Records a failure as the view's error banner. The collection is untouched.
    pub fn fail(&self, error: &PortError) {
        let mut state = self.shared.lock();
        if state.epoch != self.epoch {
            return;
        }
        state.view.error = Some(error.to_string());
    }

    /// Records a subscription failure, ending the loading state.
    pub fn fail_push(&self, error: &PortError) {
        let mut state = self.shared.lock();
        if state.epoch != self.epoch {
            return;
        }
        state.view.loading = false;
        state.view.phase = ViewPhase::Ready;
        state.view.error = Some(error.to_string());
    }

    fn begin_upload(&self) -> PortResult<UploadGuard> {
        let mut state = self.shared.lock();
        if state.epoch != self.epoch {
            return Err(PortError::NotSignedIn);
        }
        if state.view.uploading {
            return Err(PortError::UploadInProgress);
        }
        state.view.uploading = true;
        state.view.error = None;
        Ok(UploadGuard { view: self.clone() })
    }
}

/// Clears `uploading` however the submission ends, including cancellation.
struct UploadGuard {
    view: ViewContext,
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        let mut state = self.view.shared.lock();
        if state.epoch == self.view.epoch {
            state.view.uploading = false;
        }
    }
}

struct FailedUpload {
    request_id: Uuid,
    subject: String,
    owner_id: String,
    image_data: String,
}

//=========================================================================================
// The Synchronizer
//=========================================================================================

pub struct GallerySynchronizer {
    client: PhotoStoreClient,
    identity: Arc<dyn IdentityService>,
    strategy: Box<dyn ReconciliationStrategy>,
    scope: GalleryScope,
    reconcile_on_enter: bool,
    encoder: Encoder,
    shared: Arc<Mutex<SyncState>>,
    active: Mutex<Option<ViewContext>>,
    failed_upload: Mutex<Option<FailedUpload>>,
}

impl GallerySynchronizer {
    pub fn new(
        client: PhotoStoreClient,
        identity: Arc<dyn IdentityService>,
        strategy: Box<dyn ReconciliationStrategy>,
        scope: GalleryScope,
        reconcile_on_enter: bool,
        encoder: Encoder,
    ) -> Self {
        Self {
            client,
            identity,
            strategy,
            scope,
            reconcile_on_enter,
            encoder,
            shared: Arc::new(Mutex::new(SyncState {
                epoch: 0,
                view: GalleryViewState::new(""),
                issued: 0,
                applied: 0,
                pending_pulls: 0,
            })),
            active: Mutex::new(None),
            failed_upload: Mutex::new(None),
        }
    }

    /// A copy of the current view state, for rendering.
    pub fn snapshot(&self) -> GalleryViewState {
        self.shared.lock().view.clone()
    }

    pub fn strategy(&self) -> &dyn ReconciliationStrategy {
        self.strategy.as_ref()
    }

    /// Enters the view for `subject` as the signed-in user.
    ///
    /// Re-entering with the same subject and user keeps the view as it is,
    /// restarting reconciliation only if it has died.
    /// Any other change tears the old view down first, cancelling its
    /// subscription, so nothing from the old subject can leak in.
    pub async fn enter(&self, subject: &str) -> PortResult<()> {
        let Some(user) = self.identity.current_user() else {
            self.leave().await;
            return Err(PortError::NotSignedIn);
        };

        let same_view = self
            .active
            .lock()
            .clone()
            .filter(|v| v.subject == subject && v.owner_id == user.id && v.is_current());
        if let Some(current) = same_view {
            if !self.strategy.needs_restart() {
                return Ok(());
            }
            info!("Reconciliation for '{}' had stopped; restarting it.", subject);
            return self.strategy.start(&current).await;
        }

        let view = {
            let mut state = self.shared.lock();
            state.epoch += 1;
            state.view = GalleryViewState::new(subject);
            state.issued = 0;
            state.applied = 0;
            state.pending_pulls = 0;
            ViewContext {
                client: self.client.clone(),
                subject: subject.to_string(),
                owner_id: user.id.clone(),
                read_owner: match self.scope {
                    GalleryScope::Owner => Some(user.id.clone()),
                    GalleryScope::Subject => None,
                },
                epoch: state.epoch,
                shared: self.shared.clone(),
            }
        };
        self.strategy.stop().await;
        *self.active.lock() = Some(view.clone());
        self.failed_upload.lock().take();
        info!(
            "Entered subject '{}' for user {} ({:?}).",
            subject,
            user.id,
            self.strategy.kind()
        );

        if self.reconcile_on_enter {
            self.strategy.start(&view).await
        } else {
            Ok(())
        }
    }

    /// Starts reconciliation for a view entered without it ("show photos").
    pub async fn show_photos(&self) -> PortResult<()> {
        let view = self.current_view()?;
        if self.snapshot().phase != ViewPhase::Empty && !self.strategy.needs_restart() {
            return Ok(());
        }
        self.strategy.start(&view).await
    }

    /// Follows an identity change: signed out leaves the view, a different
    /// user re-enters the same subject.
    pub async fn on_identity_changed(&self) -> PortResult<()> {
        let subject = self.active.lock().as_ref().map(|v| v.subject.clone());
        match (self.identity.current_user(), subject) {
            (None, _) => {
                self.leave().await;
                Ok(())
            }
            (Some(_), Some(subject)) => self.enter(&subject).await,
            (Some(_), None) => Ok(()),
        }
    }

    /// Tears the view down and cancels any live subscription.
    pub async fn leave(&self) {
        {
            let mut state = self.shared.lock();
            state.epoch += 1;
            state.view = GalleryViewState::new("");
            state.pending_pulls = 0;
        }
        self.strategy.stop().await;
        if let Some(view) = self.active.lock().take() {
            info!("Left subject '{}'.", view.subject);
        }
        self.failed_upload.lock().take();
    }

    /// Re-runs the pull reconciliation. Under live subscription it only
    /// resubscribes when the feed has gone away.
    pub async fn refresh(&self) -> PortResult<()> {
        let view = self.current_view()?;
        self.strategy.refresh(&view).await
    }

    /// Stores an encoded image as a new record for the current subject.
    ///
    /// On failure the error banner is set and the collection is left as it
    /// was; the upload can be re-sent with `retry_upload`.
    pub async fn submit_capture(&self, image: EncodedImage) -> PortResult<PhotoRecord> {
        self.submit(Uuid::new_v4(), image.data_url).await
    }

    /// Encodes a picked file and submits it.
    pub async fn upload_file(&self, bytes: &[u8]) -> PortResult<PhotoRecord> {
        let image = self.encoder.encode_file(bytes)?;
        self.submit_capture(image).await
    }

    /// Captures a still from a live session, closes the session, then submits.
    pub async fn capture_and_submit(&self, camera: &CaptureController) -> PortResult<PhotoRecord> {
        if !self.snapshot().can_upload() {
            return Err(PortError::UploadInProgress);
        }
        let image = camera.capture_and_close()?;
        self.submit_capture(image).await
    }

    /// Re-sends the last failed upload under its original idempotency key.
    pub async fn retry_upload(&self) -> PortResult<Option<PhotoRecord>> {
        let view = self.current_view()?;
        let pending = {
            let mut slot = self.failed_upload.lock();
            let same_view = matches!(
                slot.as_ref(),
                Some(p) if p.subject == view.subject && p.owner_id == view.owner_id
            );
            if same_view {
                slot.take()
            } else {
                None
            }
        };
        let Some(pending) = pending else {
            return Ok(None);
        };
        info!("Retrying upload {}.", pending.request_id);
        self.submit(pending.request_id, pending.image_data).await.map(Some)
    }

    pub fn has_failed_upload(&self) -> bool {
        self.failed_upload.lock().is_some()
    }

    async fn submit(&self, request_id: Uuid, image_data: String) -> PortResult<PhotoRecord> {
        let view = self.current_view()?;
        let _uploading = view.begin_upload()?;

        let created = self
            .client
            .create_with_request_id(request_id, &view.subject, &view.owner_id, image_data.clone())
            .await;
        match created {
            Ok(record) => {
                self.failed_upload.lock().take();
                self.strategy.after_write(&view).await;
                Ok(record)
            }
            Err(e) => {
                warn!("Upload to '{}' failed: {}", view.subject, e);
                view.fail(&e);
                *self.failed_upload.lock() = Some(FailedUpload {
                    request_id,
                    subject: view.subject.clone(),
                    owner_id: view.owner_id.clone(),
                    image_data,
                });
                Err(e)
            }
        }
    }

    /// Deletes a photo after the user confirms.
    ///
    /// A failed delete sets the error banner and leaves the photo visible.
    pub async fn request_delete(
        &self,
        photo_id: Uuid,
        prompt: &dyn ConfirmationPrompt,
    ) -> PortResult<DeleteOutcome> {
        let view = self.current_view()?;
        if !prompt.confirm(DELETE_PROMPT).await {
            debug!("Delete of {} declined.", photo_id);
            return Ok(DeleteOutcome::Declined);
        }
        match self.client.remove(photo_id, &view.owner_id).await {
            Ok(()) => {
                self.strategy.after_write(&view).await;
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) => {
                warn!("Deleting {} failed: {}", photo_id, e);
                view.fail(&e);
                Err(e)
            }
        }
    }

    /// Enlarges the photo with `photo_id`. Returns false if it is not in the collection.
    pub fn open_preview(&self, photo_id: Uuid) -> bool {
        let mut state = self.shared.lock();
        let Some(photo) = state.view.photos.iter().find(|p| p.id == photo_id).cloned() else {
            return false;
        };
        state.view.preview.open(photo);
        true
    }

    pub fn preview_click(&self, click: PreviewClick) -> bool {
        self.shared.lock().view.preview.handle_click(click)
    }

    pub fn close_preview(&self) {
        self.shared.lock().view.preview.close();
    }

    pub fn dismiss_error(&self) {
        self.shared.lock().view.error = None;
    }

    fn current_view(&self) -> PortResult<ViewContext> {
        let view = self.active.lock().clone().ok_or(PortError::NotSignedIn)?;
        match self.identity.current_user() {
            Some(user) if user.id == view.owner_id => Ok(view),
            _ => Err(PortError::NotSignedIn),
        }
    }
}
