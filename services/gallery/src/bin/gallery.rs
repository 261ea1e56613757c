//! services/gallery/src/bin/gallery.rs

use gallery_lib::{
    app::Gallery,
    config::{Config, StrategyKind},
    error::GalleryError,
    gallery::OpenOutcome,
    guard::{guard, Route},
};
use lecture_gallery_core::domain::Subject;
use lecture_gallery_core::ports::IdentityService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), GalleryError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting gallery...");

    // --- 2. Connect the Store & Camera, Wire the Components ---
    let gallery = Gallery::bootstrap(config.clone()).await?;

    // --- 3. Sign In ---
    if let Some(user) = gallery.configured_user() {
        info!("Welcome, {}.", user.display_name());
        gallery.identity.sign_in(user);
    }

    // --- 4. Resolve the Requested Subject Through the Route Guard ---
    let requested = Route::Subject(config.subject.clone());
    let subject = match guard(requested, gallery.identity.current_user().as_ref()) {
        Route::Subject(id) => id,
        other => {
            warn!("Redirected to {}. Set GALLERY_USER_ID to sign in.", other.path());
            return Ok(());
        }
    };
    info!("Opening the {} gallery.", Subject::heading_for(&subject));

    // --- 5. Enter the View ---
    let sync = gallery.synchronizer.clone();
    if let Err(e) = sync.enter(&subject).await {
        warn!("Could not load photos: {}", e);
    }
    if !config.reconcile_on_enter {
        if let Err(e) = sync.show_photos().await {
            warn!("Could not load photos: {}", e);
        }
    }

    // --- 6. Optional Import & Capture ---
    if let Some(path) = &config.import_path {
        let bytes = tokio::fs::read(path).await?;
        match sync.upload_file(&bytes).await {
            Ok(record) => info!("Imported {} as photo {}.", path.display(), record.id),
            Err(e) => warn!("Import of {} failed: {}", path.display(), e),
        }
    }

    if config.capture_on_start {
        match gallery.camera.open().await {
            Ok(OpenOutcome::Live) => match sync.capture_and_submit(&gallery.camera).await {
                Ok(record) => info!("Captured photo {}.", record.id),
                Err(e) => warn!("Capture failed: {}", e),
            },
            Ok(OpenOutcome::Abandoned) => warn!("Camera session closed before it went live."),
            Err(e) => warn!("Could not open the camera: {}", e),
        }
    }

    let view = sync.snapshot();
    if view.is_empty_state() {
        info!("No photos yet for this subject.");
    } else {
        info!("{} photo(s) in '{}'.", view.photos.len(), view.subject);
    }
    if let Some(error) = &view.error {
        warn!("{}", error);
    }

    // --- 7. Follow Live Changes Until Shutdown ---
    if config.strategy == StrategyKind::LiveSubscribe {
        info!("Watching '{}' for changes. Press Ctrl-C to stop.", subject);
        let mut identity_changes = gallery.identity.changes();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut seen = view.photos.len();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = ticker.tick() => {
                    let count = sync.snapshot().photos.len();
                    if count != seen {
                        info!("'{}' now has {} photo(s).", subject, count);
                        seen = count;
                    }
                }
                changed = identity_changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Err(e) = sync.on_identity_changed().await {
                        warn!("Re-entering after sign-in change failed: {}", e);
                    }
                }
            }
        }
    }

    // --- 8. Tear Down ---
    sync.leave().await;
    gallery.camera.close();
    info!("Gallery stopped.");
    Ok(())
}
