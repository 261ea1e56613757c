//! services/gallery/src/gallery/mod.rs
//!
//! The capture-and-synchronization pipeline: encoding, the camera session,
//! the store client, reconciliation and the preview modal.

pub mod capture;
pub mod encoder;
pub mod preview;
pub mod state;
pub mod store_client;
pub mod strategy;
pub mod sync;

pub use capture::{CaptureController, CaptureState, OpenOutcome};
pub use encoder::{Encoder, ImageSource};
pub use preview::{PreviewClick, PreviewController};
pub use state::{GalleryViewState, ViewPhase};
pub use store_client::{PhotoStoreClient, Subscription};
pub use strategy::{LiveSubscribe, PollOnAction, ReconciliationStrategy};
pub use sync::{DeleteOutcome, GallerySynchronizer, ViewContext};
