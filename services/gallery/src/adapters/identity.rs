//! services/gallery/src/adapters/identity.rs
//!
//! A local identity session implementing the `IdentityService` port. Sign-in
//! and sign-out are published on a watch channel so views can re-enter when
//! the user changes.

use lecture_gallery_core::domain::CurrentUser;
use lecture_gallery_core::ports::IdentityService;
use tokio::sync::watch;
use tracing::info;

pub struct LocalIdentity {
    current: watch::Sender<Option<CurrentUser>>,
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentity {
    /// Starts signed out.
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    pub fn signed_in(user: CurrentUser) -> Self {
        let identity = Self::new();
        identity.sign_in(user);
        identity
    }

    pub fn sign_in(&self, user: CurrentUser) {
        info!("User {} signed in.", user.id);
        self.current.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.current.send_replace(None) {
            info!("User {} signed out.", previous.id);
        }
    }

    /// A receiver that observes every sign-in and sign-out.
    pub fn changes(&self) -> watch::Receiver<Option<CurrentUser>> {
        self.current.subscribe()
    }
}

impl IdentityService for LocalIdentity {
    fn current_user(&self) -> Option<CurrentUser> {
        self.current.borrow().clone()
    }
}
