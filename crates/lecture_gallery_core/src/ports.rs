//! crates/lecture_gallery_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of a specific document store, camera backend or identity provider.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{CurrentUser, Frame, NewPhoto, PhotoFilter, PhotoRecord, StreamConstraints};

//=========================================================================================
// Port Error and Result Types
//=========================================================================================

/// The error taxonomy shared by every port and component.
///
/// Every variant is recoverable by the user re-triggering the action; none is
/// fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Camera is not supported on this device")]
    DeviceUnavailable,
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("Camera is already in use")]
    DeviceBusy,
    #[error("Camera error: {0}")]
    DeviceError(String),
    #[error("Could not encode image: {0}")]
    EncodingError(String),
    #[error("Failed to read photos: {0}")]
    StoreReadError(String),
    #[error("Failed to write photo: {0}")]
    StoreWriteError(String),
    #[error("No user is signed in")]
    NotSignedIn,
    #[error("An upload is already in progress")]
    UploadInProgress,
}

impl PortError {
    /// Errors raised on the capture path (shown next to the capture control
    /// rather than in the gallery banner).
    pub fn is_capture_error(&self) -> bool {
        matches!(
            self,
            PortError::DeviceUnavailable
                | PortError::PermissionDenied(_)
                | PortError::DeviceBusy
                | PortError::DeviceError(_)
                | PortError::EncodingError(_)
        )
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A live feed of result sets. Each item is the full current matching set.
pub type PhotoFeed = Pin<Box<dyn Stream<Item = PortResult<Vec<PhotoRecord>>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote document store holding photo records.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Persists a new record, assigning `id` and `createdAt`.
    /// Re-using a `request_id` returns the previously created record.
    async fn insert_photo(&self, photo: NewPhoto) -> PortResult<PhotoRecord>;

    /// One-shot query of every record matching `filter`, oldest first.
    async fn find_photos(&self, filter: &PhotoFilter) -> PortResult<Vec<PhotoRecord>>;

    /// Opens a live feed. The first item is the matching set at subscription
    /// time; later items arrive whenever that set changes.
    async fn watch_photos(&self, filter: &PhotoFilter) -> PortResult<PhotoFeed>;

    /// Deletes one record. Only the owner may delete it.
    async fn delete_photo(&self, photo_id: Uuid, owner_id: &str) -> PortResult<()>;
}

/// A platform camera that can hand out exclusive video streams.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Whether the platform has any capture capability at all.
    fn is_supported(&self) -> bool;

    /// Acquires a stream matching `constraints`.
    async fn acquire(&self, constraints: StreamConstraints) -> PortResult<Box<dyn MediaStream>>;
}

/// An acquired hardware stream. Owning one means owning the camera.
pub trait MediaStream: Send {
    /// Human-readable device label, for logs.
    fn label(&self) -> &str;

    /// Reads the current preview frame at its natural size.
    fn frame(&mut self) -> PortResult<Frame>;

    /// Stops every track. Calling it again is a no-op.
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// The identity provider, as far as the gallery cares about it.
pub trait IdentityService: Send + Sync {
    fn current_user(&self) -> Option<CurrentUser>;
}

/// Asks the user to confirm a destructive action.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}
