//! Session context.
//!
//! The identity provider is external. All this crate needs from it is the
//! answer to "who is signed in right now", read synchronously.

use filedeck_store::PrincipalId;
use std::sync::Arc;
use tokio::sync::watch;

/// Current-principal lookup, injected into every component at construction.
pub trait Session: Send + Sync {
    /// The signed-in principal, or `None`.
    fn principal(&self) -> Option<PrincipalId>;
}

pub type SessionRef = Arc<dyn Session>;

/// A session that can be signed in and out programmatically.
///
/// Clones share the same state. Interested parties can
/// [`subscribe()`](Self::subscribe) to sign-in changes.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    current: Arc<watch::Sender<Option<PrincipalId>>>,
}

impl SessionHandle {
    /// A session with nobody signed in.
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current: Arc::new(current) }
    }

    pub fn signed_in(principal: impl Into<PrincipalId>) -> Self {
        let session = Self::new();
        session.sign_in(principal);
        session
    }

    pub fn sign_in(&self, principal: impl Into<PrincipalId>) {
        let principal = principal.into();
        tracing::debug!(principal = %principal, "Signed in");
        self.current.send_replace(Some(principal));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.current.send_replace(None) {
            tracing::debug!(principal = %previous, "Signed out");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PrincipalId>> {
        self.current.subscribe()
    }

    pub fn into_ref(self) -> SessionRef {
        Arc::new(self)
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for SessionHandle {
    fn principal(&self) -> Option<PrincipalId> {
        self.current.borrow().clone()
    }
}
