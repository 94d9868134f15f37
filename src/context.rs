//! Explicit application context passed to every collaborator.
//!
//! The upstream app kept the session in a global store; here the gateway,
//! socket session, and storage all borrow one [`Context`] instead of reaching
//! into ambient state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::api::models::User;

/// The slice of state that survives restarts (see [`crate::storage`]).
/// The chat cache is deliberately excluded from persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub first_launch: bool,
    pub selected_workspace: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            first_launch: true,
            ..Self::default()
        }
    }
}

/// Shared handle over the session slice plus the host-reported online flag.
#[derive(Clone)]
pub struct Context {
    session: Arc<RwLock<SessionState>>,
    online: Arc<AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Self::with_session(SessionState::new())
    }

    pub fn with_session(session: SessionState) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Snapshot of the current session slice.
    pub fn session(&self) -> SessionState {
        self.session.read().expect("session lock poisoned").clone()
    }

    pub fn update_session(&self, f: impl FnOnce(&mut SessionState)) {
        let mut guard = self.session.write().expect("session lock poisoned");
        f(&mut guard);
    }

    pub fn set_credentials(&self, user: Option<User>, token: String) {
        self.update_session(|s| {
            s.user = user;
            s.token = Some(token);
        });
    }

    /// Clears user and token, keeping the first-launch flag and workspace.
    pub fn clear_credentials(&self) {
        self.update_session(|s| {
            s.user = None;
            s.token = None;
        });
    }

    pub fn token(&self) -> Option<String> {
        self.session.read().expect("session lock poisoned").token.clone()
    }

    pub fn selected_workspace(&self) -> Option<String> {
        self.session
            .read()
            .expect("session lock poisoned")
            .selected_workspace
            .clone()
    }

    /// Host apps feed their platform reachability monitor into this flag;
    /// the gateway aborts outgoing calls while it is false.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
