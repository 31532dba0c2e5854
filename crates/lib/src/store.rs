//! Publish/subscribe boundary for session snapshots.
//!
//! The controller is the only writer. Everyone else holds a
//! [`SessionSubscription`], which can read the latest snapshot and wait for
//! the next one but has no way to publish.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::watch;

use crate::session::Session;

/// Latest-value channel carrying [`Session`] snapshots.
///
/// Cloning shares the underlying channel.
#[derive(Clone, Debug)]
pub struct SessionStore {
    sender: Arc<watch::Sender<Arc<Session>>>,
    publications: Arc<AtomicU64>,
}

impl SessionStore {
    /// Create a store holding an unauthenticated session.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(Session::default()));
        Self {
            sender: Arc::new(sender),
            publications: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the current session and notify subscribers.
    pub(crate) fn publish(&self, session: Arc<Session>) {
        self.publications.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(status = %session.status(), "Publishing session");
        self.sender.send_replace(session);
    }

    /// The most recently published session.
    pub fn current(&self) -> Arc<Session> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of sessions published so far.
    pub fn publications(&self) -> u64 {
        self.publications.load(Ordering::SeqCst)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`SessionStore`].
#[derive(Debug, Clone)]
pub struct SessionSubscription {
    receiver: watch::Receiver<Arc<Session>>,
}

impl SessionSubscription {
    /// The latest session, marking it as seen.
    pub fn current(&mut self) -> Arc<Session> {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for a session published after the last one seen.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Session>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
