//! Observable session snapshot.
//!
//! DESIGN
//! ======
//! The snapshot lives in a `tokio::sync::watch` channel. The session store
//! and the interceptor's teardown path write through [`SessionHandle`]; the
//! route guard and screens only read or subscribe. Writes that do not change
//! the snapshot are not broadcast.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::net::types::User;

/// Where the session is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Process start; persisted credentials not yet verified.
    #[default]
    Restoring,
    Authenticated,
    Anonymous,
}

/// Authenticated context for the running client.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub identity: Option<User>,
    pub token: Option<String>,
    pub status: SessionStatus,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    #[must_use]
    pub fn is_restoring(&self) -> bool {
        self.status == SessionStatus::Restoring
    }

    fn anonymous() -> Self {
        Self { identity: None, token: None, status: SessionStatus::Anonymous }
    }
}

/// Shared writer/reader for the session snapshot.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<Session>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    /// A fresh handle in [`SessionStatus::Restoring`].
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::default());
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.tx.borrow().status
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Resolve once the status has left [`SessionStatus::Restoring`].
    pub async fn wait_ready(&self) -> SessionStatus {
        let mut rx = self.subscribe();
        match rx.wait_for(|session| !session.is_restoring()).await {
            Ok(session) => session.status,
            // Sender lives in `self`, so the channel cannot close here.
            Err(_) => self.status(),
        }
    }

    /// Optimistic restore: hold persisted values while still `Restoring`.
    pub(crate) fn set_restoring(&self, token: &str, identity: Option<User>) {
        self.replace(Session {
            identity,
            token: Some(token.to_owned()),
            status: SessionStatus::Restoring,
        });
    }

    pub(crate) fn set_authenticated(&self, token: &str, identity: User) {
        self.replace(Session {
            identity: Some(identity),
            token: Some(token.to_owned()),
            status: SessionStatus::Authenticated,
        });
    }

    pub(crate) fn reset_anonymous(&self) {
        self.replace(Session::anonymous());
    }

    fn replace(&self, next: Session) {
        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
