//! services/gallery/src/gallery/state.rs
//!
//! The per-subject view state owned by the synchronizer.

use crate::gallery::preview::PreviewController;
use lecture_gallery_core::domain::PhotoRecord;

/// Coarse lifecycle of a subject view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    /// No reconciliation has been started yet.
    Empty,
    /// The first fetch or subscription handshake is outstanding.
    Loading,
    /// At least one reconciliation has finished (check `error` for failures).
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryViewState {
    pub subject: String,
    pub phase: ViewPhase,
    pub photos: Vec<PhotoRecord>,
    pub loading: bool,
    /// True while an encode-and-create round-trip is outstanding. Capture and
    /// upload controls must stay disabled while it is set.
    pub uploading: bool,
    pub error: Option<String>,
    pub preview: PreviewController,
}

impl GalleryViewState {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            phase: ViewPhase::Empty,
            photos: Vec::new(),
            loading: false,
            uploading: false,
            error: None,
            preview: PreviewController::default(),
        }
    }

    /// "No photos yet for this subject."
    pub fn is_empty_state(&self) -> bool {
        self.phase == ViewPhase::Ready
            && !self.loading
            && self.error.is_none()
            && self.photos.is_empty()
    }

    pub fn can_upload(&self) -> bool {
        !self.uploading
    }

    pub fn can_refresh(&self) -> bool {
        !self.loading
    }
}
