//! services/gallery/src/gallery/strategy.rs
//!
//! The two reconciliation policies. A deployment picks exactly one; the
//! synchronizer's contract is the same under either.

use crate::config::StrategyKind;
use crate::gallery::store_client::Subscription;
use crate::gallery::sync::ViewContext;
use async_trait::async_trait;
use lecture_gallery_core::ports::PortResult;
use parking_lot::Mutex;
use tracing::{debug, info};

/// Keeps a view's collection in line with the document store.
#[async_trait]
pub trait ReconciliationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Begins reconciling a freshly entered view.
    async fn start(&self, view: &ViewContext) -> PortResult<()>;

    /// Runs after a successful create or delete.
    async fn after_write(&self, view: &ViewContext);

    /// A user-requested refresh.
    async fn refresh(&self, view: &ViewContext) -> PortResult<()>;

    /// Releases whatever the strategy holds for the previous view.
    async fn stop(&self);

    /// True when reconciliation was running for the view but has since died.
    fn needs_restart(&self) -> bool {
        false
    }
}

/// Build the configured strategy.
pub fn for_kind(kind: StrategyKind) -> Box<dyn ReconciliationStrategy> {
    match kind {
        StrategyKind::PollOnAction => Box::new(PollOnAction),
        StrategyKind::LiveSubscribe => Box::new(LiveSubscribe::default()),
    }
}

//=========================================================================================
// Pull: fetch on entry, after writes and on refresh
//=========================================================================================

pub struct PollOnAction;

impl PollOnAction {
    async fn pull(&self, view: &ViewContext) -> PortResult<()> {
        let Some(ticket) = view.begin_pull() else {
            return Ok(());
        };
        let result = view
            .client()
            .query_by_subject(view.subject(), view.read_owner())
            .await;
        let outcome = match &result {
            Ok(_) => Ok(()),
            Err(e) => Err(e.clone()),
        };
        view.finish_pull(ticket, result);
        outcome
    }
}

#[async_trait]
impl ReconciliationStrategy for PollOnAction {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PollOnAction
    }

    async fn start(&self, view: &ViewContext) -> PortResult<()> {
        self.pull(view).await
    }

    async fn after_write(&self, view: &ViewContext) {
        // Failures land in the view's error banner.
        let _ = self.pull(view).await;
    }

    async fn refresh(&self, view: &ViewContext) -> PortResult<()> {
        self.pull(view).await
    }

    async fn stop(&self) {}
}

//=========================================================================================
// Push: one live subscription per entered view
//=========================================================================================

#[derive(Default)]
pub struct LiveSubscribe {
    subscription: Mutex<Option<Subscription>>,
}

impl LiveSubscribe {
    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().as_ref().is_some_and(Subscription::is_live)
    }
}

#[async_trait]
impl ReconciliationStrategy for LiveSubscribe {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LiveSubscribe
    }

    async fn start(&self, view: &ViewContext) -> PortResult<()> {
        self.stop().await;
        view.begin_push();

        let on_change = view.clone();
        let on_error = view.clone();
        let subscribed = view
            .client()
            .subscribe(
                view.subject(),
                view.read_owner(),
                move |photos| on_change.apply_push(photos),
                move |e| on_error.fail_push(&e),
            )
            .await;

        let subscription = match subscribed {
            Ok(subscription) => subscription,
            Err(e) => {
                view.fail_push(&e);
                return Err(e);
            }
        };

        let mut slot = self.subscription.lock();
        if !view.is_current() {
            // The view changed while the handshake was in flight.
            subscription.cancel();
            return Ok(());
        }
        if let Some(previous) = slot.replace(subscription) {
            previous.cancel();
        }
        info!("Live subscription attached to '{}'.", view.subject());
        Ok(())
    }

    async fn after_write(&self, view: &ViewContext) {
        debug!(
            "Waiting for the subscription to deliver the change to '{}'.",
            view.subject()
        );
    }

    /// Resubscribes if the feed is gone; a healthy subscription is left alone.
    async fn refresh(&self, view: &ViewContext) -> PortResult<()> {
        if self.is_subscribed() {
            return Ok(());
        }
        info!("No live feed for '{}'; resubscribing.", view.subject());
        self.start(view).await
    }

    async fn stop(&self) {
        let previous = self.subscription.lock().take();
        if let Some(subscription) = previous {
            info!("Cancelling subscription for '{}'.", subscription.subject());
            subscription.shutdown().await;
        }
    }

    fn needs_restart(&self) -> bool {
        self.subscription.lock().as_ref().is_some_and(|s| !s.is_live())
    }
}
