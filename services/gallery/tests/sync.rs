//! The synchronizer end to end, under both reconciliation strategies.

mod common;

use common::{eventually, harness, harness_with, png_bytes, still_camera, user, ScriptedPrompt};
use gallery_lib::config::{GalleryScope, StrategyKind};
use gallery_lib::gallery::sync::DELETE_PROMPT;
use gallery_lib::gallery::{
    CaptureController, CaptureState, DeleteOutcome, Encoder, PreviewClick, ViewPhase,
};
use lecture_gallery_core::domain::NewPhoto;
use lecture_gallery_core::ports::{PhotoStore, PortError};
use std::time::Duration;
use uuid::Uuid;

fn new_photo(subject: &str, owner: &str) -> NewPhoto {
    NewPhoto {
        request_id: Uuid::new_v4(),
        subject: subject.to_string(),
        owner_id: owner.to_string(),
        image_data: "data:image/jpeg;base64,AA".to_string(),
    }
}

//=========================================================================================
// Pull-on-action
//=========================================================================================

#[tokio::test]
async fn entering_an_empty_subject_shows_the_empty_state() {
    let h = harness(StrategyKind::PollOnAction);
    h.sync.enter("analyse").await.unwrap();

    let view = h.sync.snapshot();
    assert_eq!(view.subject, "analyse");
    assert_eq!(view.phase, ViewPhase::Ready);
    assert!(view.photos.is_empty());
    assert!(view.is_empty_state());
}

#[tokio::test]
async fn entering_shows_only_the_users_photos_for_that_subject() {
    let h = harness(StrategyKind::PollOnAction);
    let mine = h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    h.store.inner.insert_photo(new_photo("analyse", "u2")).await.unwrap();
    h.store.inner.insert_photo(new_photo("proba", "u1")).await.unwrap();

    h.sync.enter("analyse").await.unwrap();

    assert_eq!(h.sync.snapshot().photos, vec![mine]);
}

#[tokio::test]
async fn subject_scope_shows_every_owner() {
    let h = harness_with(StrategyKind::PollOnAction, GalleryScope::Subject, true);
    h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    h.store.inner.insert_photo(new_photo("analyse", "u2")).await.unwrap();

    h.sync.enter("analyse").await.unwrap();

    assert_eq!(h.sync.snapshot().photos.len(), 2);
}

#[tokio::test]
async fn uploaded_file_appears_after_reconciliation() {
    let h = harness(StrategyKind::PollOnAction);
    h.sync.enter("sfsd").await.unwrap();

    let record = h.sync.upload_file(&png_bytes(8, 8)).await.unwrap();

    let view = h.sync.snapshot();
    assert!(!view.uploading);
    assert_eq!(view.photos.len(), 1);
    assert_eq!(view.photos[0].id, record.id);
    assert!(record.image_data.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn captured_photo_is_submitted_and_the_camera_released() {
    let h = harness(StrategyKind::PollOnAction);
    let camera = still_camera();
    let controller = CaptureController::new(camera.clone(), Encoder::default());
    h.sync.enter("algebre").await.unwrap();

    controller.open().await.unwrap();
    let record = h.sync.capture_and_submit(&controller).await.unwrap();

    assert_eq!(controller.state(), CaptureState::Idle);
    assert!(!camera.is_streaming());
    assert_eq!(record.subject, "algebre");
    assert_eq!(h.sync.snapshot().photos.len(), 1);
}

#[tokio::test]
async fn failed_submit_keeps_the_collection_and_can_be_retried() {
    let h = harness(StrategyKind::PollOnAction);
    h.store.inner.insert_photo(new_photo("archi", "u1")).await.unwrap();
    h.sync.enter("archi").await.unwrap();

    h.store.fail_writes(true);
    let err = h.sync.upload_file(&png_bytes(4, 4)).await.unwrap_err();
    assert!(matches!(err, PortError::StoreWriteError(_)));

    let view = h.sync.snapshot();
    assert_eq!(view.photos.len(), 1);
    assert!(!view.uploading);
    assert!(view.error.is_some());
    assert!(h.sync.has_failed_upload());

    h.store.fail_writes(false);
    let retried = h.sync.retry_upload().await.unwrap();
    assert!(retried.is_some());
    assert!(!h.sync.has_failed_upload());
    assert_eq!(h.sync.snapshot().photos.len(), 2);
    assert!(h.sync.snapshot().error.is_none());

    // Nothing left to retry.
    assert!(h.sync.retry_upload().await.unwrap().is_none());
    assert_eq!(h.store.inner.len().await, 2);
}

#[tokio::test]
async fn second_submit_is_refused_while_one_is_in_flight() {
    let h = harness(StrategyKind::PollOnAction);
    h.sync.enter("analyse").await.unwrap();
    let camera = still_camera();
    let controller = CaptureController::new(camera.clone(), Encoder::default());
    controller.open().await.unwrap();

    h.store.hold_next_write();
    let first = {
        let sync = h.sync.clone();
        tokio::spawn(async move { sync.upload_file(&png_bytes(4, 4)).await })
    };
    h.store.write_is_held().await;

    let view = h.sync.snapshot();
    assert!(view.uploading);
    assert!(!view.can_upload());

    assert_eq!(
        h.sync.upload_file(&png_bytes(4, 4)).await.unwrap_err(),
        PortError::UploadInProgress
    );
    assert_eq!(
        h.sync.capture_and_submit(&controller).await.unwrap_err(),
        PortError::UploadInProgress
    );
    // The refused capture leaves the session open.
    assert_eq!(controller.state(), CaptureState::Live);
    assert_eq!(h.store.inserts(), 1);

    h.store.release_write();
    first.await.unwrap().unwrap();

    let view = h.sync.snapshot();
    assert!(!view.uploading);
    assert!(view.can_upload());
    assert_eq!(view.photos.len(), 1);
    assert_eq!(h.store.inserts(), 1);
}

#[tokio::test]
async fn failed_read_sets_the_banner_until_dismissed() {
    let h = harness(StrategyKind::PollOnAction);
    h.store.fail_reads(true);

    let err = h.sync.enter("proba").await.unwrap_err();
    assert!(matches!(err, PortError::StoreReadError(_)));
    let view = h.sync.snapshot();
    assert!(view.error.is_some());
    assert!(!view.loading);
    assert!(!view.is_empty_state());

    h.sync.dismiss_error();
    assert!(h.sync.snapshot().error.is_none());

    h.store.fail_reads(false);
    h.sync.refresh().await.unwrap();
    assert!(h.sync.snapshot().is_empty_state());
}

#[tokio::test]
async fn declined_delete_sends_nothing() {
    let h = harness(StrategyKind::PollOnAction);
    let photo = h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    h.sync.enter("analyse").await.unwrap();
    let prompt = ScriptedPrompt::answering(false);

    let outcome = h.sync.request_delete(photo.id, &prompt).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Declined);
    assert_eq!(prompt.asked.lock().as_slice(), [DELETE_PROMPT.to_string()]);
    assert_eq!(h.sync.snapshot().photos.len(), 1);
    assert_eq!(h.store.inner.len().await, 1);
}

#[tokio::test]
async fn confirmed_delete_removes_the_photo_and_closes_its_preview() {
    let h = harness(StrategyKind::PollOnAction);
    let photo = h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    h.sync.enter("analyse").await.unwrap();
    assert!(h.sync.open_preview(photo.id));

    let outcome = h
        .sync
        .request_delete(photo.id, &ScriptedPrompt::answering(true))
        .await
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
    let view = h.sync.snapshot();
    assert!(view.photos.is_empty());
    assert!(!view.preview.is_open());
}

#[tokio::test]
async fn failed_delete_leaves_the_photo_visible() {
    let h = harness(StrategyKind::PollOnAction);
    let photo = h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    h.sync.enter("analyse").await.unwrap();
    h.store.fail_writes(true);

    let err = h
        .sync
        .request_delete(photo.id, &ScriptedPrompt::answering(true))
        .await
        .unwrap_err();

    assert!(matches!(err, PortError::StoreWriteError(_)));
    let view = h.sync.snapshot();
    assert_eq!(view.photos, vec![photo]);
    assert!(view.error.is_some());
}

#[tokio::test]
async fn deleting_another_owners_photo_is_refused() {
    let h = harness_with(StrategyKind::PollOnAction, GalleryScope::Subject, true);
    let theirs = h.store.inner.insert_photo(new_photo("analyse", "u2")).await.unwrap();
    h.sync.enter("analyse").await.unwrap();

    let err = h
        .sync
        .request_delete(theirs.id, &ScriptedPrompt::answering(true))
        .await
        .unwrap_err();

    assert!(matches!(err, PortError::StoreWriteError(_)));
    assert_eq!(h.store.inner.len().await, 1);
}

#[tokio::test]
async fn stale_pull_cannot_overwrite_a_newer_one() {
    let h = harness(StrategyKind::PollOnAction);
    h.sync.enter("analyse").await.unwrap();

    h.store.hold_next_read();
    let slow = {
        let sync = h.sync.clone();
        tokio::spawn(async move { sync.refresh().await })
    };
    h.store.read_is_held().await;

    h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    h.sync.refresh().await.unwrap();
    assert_eq!(h.sync.snapshot().photos.len(), 1);

    h.store.release_read();
    slow.await.unwrap().unwrap();

    let view = h.sync.snapshot();
    assert_eq!(view.photos.len(), 1);
    assert!(!view.loading);
}

#[tokio::test]
async fn pull_for_a_previous_subject_is_dropped() {
    let h = harness(StrategyKind::PollOnAction);
    h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    h.sync.enter("analyse").await.unwrap();

    h.store.hold_next_read();
    let slow = {
        let sync = h.sync.clone();
        tokio::spawn(async move { sync.refresh().await })
    };
    h.store.read_is_held().await;

    h.sync.enter("proba").await.unwrap();
    h.store.release_read();
    slow.await.unwrap().unwrap();

    let view = h.sync.snapshot();
    assert_eq!(view.subject, "proba");
    assert!(view.photos.is_empty());
}

#[tokio::test]
async fn show_photos_gate_defers_the_first_fetch() {
    let h = harness_with(StrategyKind::PollOnAction, GalleryScope::Owner, false);
    h.store.inner.insert_photo(new_photo("electronic", "u1")).await.unwrap();

    h.sync.enter("electronic").await.unwrap();
    let view = h.sync.snapshot();
    assert_eq!(view.phase, ViewPhase::Empty);
    assert!(!view.is_empty_state());

    h.sync.show_photos().await.unwrap();
    assert_eq!(h.sync.snapshot().photos.len(), 1);
}

#[tokio::test]
async fn preview_opens_only_for_known_photos() {
    let h = harness(StrategyKind::PollOnAction);
    let photo = h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    h.sync.enter("analyse").await.unwrap();

    assert!(!h.sync.open_preview(Uuid::new_v4()));
    assert!(h.sync.open_preview(photo.id));
    assert!(!h.sync.preview_click(PreviewClick::Image));
    assert_eq!(h.sync.snapshot().preview.target(), Some(&photo));
    assert!(h.sync.preview_click(PreviewClick::Backdrop));
    assert!(!h.sync.snapshot().preview.is_open());
}

//=========================================================================================
// Identity
//=========================================================================================

#[tokio::test]
async fn signing_out_tears_the_view_down() {
    let h = harness(StrategyKind::PollOnAction);
    h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    h.sync.enter("analyse").await.unwrap();

    h.identity.sign_out();
    h.sync.on_identity_changed().await.unwrap();

    assert!(h.sync.snapshot().photos.is_empty());
    assert_eq!(h.sync.enter("analyse").await, Err(PortError::NotSignedIn));
    assert_eq!(
        h.sync.upload_file(&png_bytes(2, 2)).await.unwrap_err(),
        PortError::NotSignedIn
    );
}

#[tokio::test]
async fn switching_users_reloads_the_same_subject() {
    let h = harness(StrategyKind::PollOnAction);
    h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    let theirs = h.store.inner.insert_photo(new_photo("analyse", "u2")).await.unwrap();
    h.sync.enter("analyse").await.unwrap();

    h.identity.sign_in(user("u2"));
    h.sync.on_identity_changed().await.unwrap();

    let view = h.sync.snapshot();
    assert_eq!(view.subject, "analyse");
    assert_eq!(view.photos, vec![theirs]);
}

//=========================================================================================
// Live subscription
//=========================================================================================

#[tokio::test]
async fn live_view_follows_writes_from_elsewhere() {
    let h = harness(StrategyKind::LiveSubscribe);
    h.sync.enter("analyse").await.unwrap();
    let sync = h.sync.clone();
    eventually(|| sync.snapshot().phase == ViewPhase::Ready).await;
    assert!(h.sync.snapshot().is_empty_state());

    h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    eventually(|| sync.snapshot().photos.len() == 1).await;

    let uploaded = h.sync.upload_file(&png_bytes(4, 4)).await.unwrap();
    eventually(|| sync.snapshot().photos.iter().any(|p| p.id == uploaded.id)).await;

    h.sync
        .request_delete(uploaded.id, &ScriptedPrompt::answering(true))
        .await
        .unwrap();
    eventually(|| sync.snapshot().photos.len() == 1).await;
}

#[tokio::test]
async fn changing_subject_cancels_the_old_subscription() {
    let h = harness(StrategyKind::LiveSubscribe);
    h.sync.enter("analyse").await.unwrap();
    h.sync.enter("proba").await.unwrap();
    let sync = h.sync.clone();
    eventually(|| sync.snapshot().phase == ViewPhase::Ready).await;

    h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let view = h.sync.snapshot();
    assert_eq!(view.subject, "proba");
    assert!(view.photos.is_empty());

    h.store.inner.insert_photo(new_photo("proba", "u1")).await.unwrap();
    eventually(|| sync.snapshot().photos.len() == 1).await;
    assert!(sync.snapshot().photos.iter().all(|p| p.subject == "proba"));
}

#[tokio::test]
async fn leaving_stops_live_updates() {
    let h = harness(StrategyKind::LiveSubscribe);
    h.sync.enter("sfsd").await.unwrap();
    h.sync.leave().await;

    h.store.inner.insert_photo(new_photo("sfsd", "u1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(h.sync.snapshot().photos.is_empty());
}

#[tokio::test]
async fn refused_subscription_surfaces_an_error() {
    let h = harness(StrategyKind::LiveSubscribe);
    h.store.fail_watch(true);

    assert!(h.sync.enter("archi").await.is_err());

    let view = h.sync.snapshot();
    assert!(!view.loading);
    assert!(view.error.is_some());
    // Refresh retries the handshake.
    assert!(h.sync.refresh().await.is_err());
    h.store.fail_watch(false);
    h.sync.refresh().await.unwrap();
    let sync = h.sync.clone();
    eventually(|| sync.snapshot().is_empty_state()).await;
}

#[tokio::test]
async fn subject_change_during_handshake_drops_the_late_subscription() {
    let h = harness(StrategyKind::LiveSubscribe);
    h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();

    h.store.hold_next_watch();
    let first = {
        let sync = h.sync.clone();
        tokio::spawn(async move { sync.enter("analyse").await })
    };
    h.store.watch_is_held().await;

    h.sync.enter("proba").await.unwrap();
    h.store.release_watch();
    first.await.unwrap().unwrap();

    let store = h.store.inner.clone();
    eventually(|| store.watcher_count() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let view = h.sync.snapshot();
    assert_eq!(view.subject, "proba");
    assert_eq!(view.phase, ViewPhase::Ready);
    assert!(view.photos.is_empty());
    assert!(!h.sync.strategy().needs_restart());
}

#[tokio::test]
async fn refresh_resubscribes_after_the_feed_closes() {
    let h = harness(StrategyKind::LiveSubscribe);
    h.store.break_next_watch();
    h.sync.enter("analyse").await.unwrap();

    let sync = h.sync.clone();
    eventually(|| sync.strategy().needs_restart()).await;
    let view = h.sync.snapshot();
    assert_eq!(view.phase, ViewPhase::Ready);
    assert!(view.error.is_some());

    h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    h.sync.refresh().await.unwrap();
    eventually(|| sync.snapshot().photos.len() == 1).await;
    assert!(h.sync.snapshot().error.is_none());
    assert!(!h.sync.strategy().needs_restart());

    // The replacement feed keeps delivering.
    h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    eventually(|| sync.snapshot().photos.len() == 2).await;
}

#[tokio::test]
async fn re_entering_restarts_a_closed_feed() {
    let h = harness(StrategyKind::LiveSubscribe);
    h.store.break_next_watch();
    h.sync.enter("analyse").await.unwrap();
    let sync = h.sync.clone();
    eventually(|| sync.strategy().needs_restart()).await;

    h.store.inner.insert_photo(new_photo("analyse", "u1")).await.unwrap();
    h.sync.enter("analyse").await.unwrap();

    eventually(|| sync.snapshot().photos.len() == 1).await;
    assert!(!h.sync.strategy().needs_restart());
}

#[tokio::test]
async fn healthy_live_refresh_keeps_the_subscription() {
    let h = harness(StrategyKind::LiveSubscribe);
    h.sync.enter("archi").await.unwrap();
    let store = h.store.inner.clone();
    eventually(|| store.watcher_count() == 1).await;

    h.sync.refresh().await.unwrap();
    h.sync.enter("archi").await.unwrap();

    assert_eq!(h.store.inner.watcher_count(), 1);
}
