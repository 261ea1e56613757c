//! services/gallery/src/app.rs
//!
//! The composition root. Everything the gallery needs is built here once and
//! passed down explicitly.

use crate::adapters::{InMemoryPhotoStore, LocalIdentity, PgPhotoStore, StillFrameCamera};
use crate::config::Config;
use crate::error::GalleryError;
use crate::gallery::{strategy, CaptureController, Encoder, GallerySynchronizer, PhotoStoreClient};
use lecture_gallery_core::domain::CurrentUser;
use lecture_gallery_core::ports::{CaptureDevice, IdentityService, PhotoStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

/// The wired-up application.
pub struct Gallery {
    pub config: Arc<Config>,
    pub identity: Arc<LocalIdentity>,
    pub client: PhotoStoreClient,
    pub synchronizer: Arc<GallerySynchronizer>,
    pub camera: CaptureController,
}

impl Gallery {
    /// Connects the configured store and camera, then wires the components.
    pub async fn bootstrap(config: Arc<Config>) -> Result<Self, GalleryError> {
        let store: Arc<dyn PhotoStore> = match &config.database_url {
            Some(url) => {
                info!("Connecting to database...");
                let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
                let store = PgPhotoStore::new(pool, config.max_record_bytes);
                info!("Running database migrations...");
                store.run_migrations().await?;
                info!("Database migrations complete.");
                Arc::new(store)
            }
            None => {
                info!("DATABASE_URL not set; using the in-memory photo store.");
                Arc::new(InMemoryPhotoStore::with_record_limit(config.max_record_bytes))
            }
        };

        let device: Arc<dyn CaptureDevice> = match &config.camera_source {
            Some(path) => Arc::new(StillFrameCamera::from_file(path)?),
            None => {
                info!("CAMERA_SOURCE not set; capture is unavailable.");
                Arc::new(StillFrameCamera::unavailable())
            }
        };

        Ok(Self::assemble(config, store, device))
    }

    /// Wires the components around already-built adapters.
    pub fn assemble(
        config: Arc<Config>,
        store: Arc<dyn PhotoStore>,
        device: Arc<dyn CaptureDevice>,
    ) -> Self {
        let encoder = Encoder::new(config.capture_max_width, config.jpeg_quality);
        let identity = Arc::new(LocalIdentity::new());
        let client = PhotoStoreClient::new(store);
        let synchronizer = Arc::new(GallerySynchronizer::new(
            client.clone(),
            identity.clone() as Arc<dyn IdentityService>,
            strategy::for_kind(config.strategy),
            config.scope,
            config.reconcile_on_enter,
            encoder,
        ));
        let camera = CaptureController::new(device, encoder);
        info!(
            "Gallery assembled ({:?}, {:?} scope).",
            config.strategy, config.scope
        );

        Self {
            config,
            identity,
            client,
            synchronizer,
            camera,
        }
    }

    /// The user named by `GALLERY_USER_*`, if any.
    pub fn configured_user(&self) -> Option<CurrentUser> {
        let id = self.config.user_id.clone()?;
        Some(CurrentUser {
            id,
            display_name: self.config.user_display_name.clone(),
            email: self.config.user_email.clone(),
        })
    }
}
