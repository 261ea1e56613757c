//! services/gallery/src/gallery/preview.rs
//!
//! Tracks which photo, if any, is enlarged in the preview modal.

use lecture_gallery_core::domain::PhotoRecord;

/// Where a click inside the open preview landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewClick {
    /// The dimmed area around the modal.
    Backdrop,
    /// The enlarged image itself. Never closes the modal.
    Image,
    CloseButton,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewController {
    target: Option<PhotoRecord>,
}

impl PreviewController {
    /// Enlarges `photo`, replacing whatever was shown before.
    pub fn open(&mut self, photo: PhotoRecord) {
        self.target = Some(photo);
    }

    pub fn close(&mut self) {
        self.target = None;
    }

    pub fn target(&self) -> Option<&PhotoRecord> {
        self.target.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.target.is_some()
    }

    /// Routes a click. Returns true if the preview closed.
    pub fn handle_click(&mut self, click: PreviewClick) -> bool {
        match click {
            PreviewClick::Image => false,
            PreviewClick::Backdrop | PreviewClick::CloseButton => {
                let was_open = self.is_open();
                self.close();
                was_open
            }
        }
    }

    /// Closes the preview if its photo is no longer in `photos`.
    pub fn retain_in(&mut self, photos: &[PhotoRecord]) {
        if let Some(target) = &self.target {
            if !photos.iter().any(|p| p.id == target.id) {
                self.target = None;
            }
        }
    }
}
