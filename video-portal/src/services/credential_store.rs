//! Process-wide session slot.
//!
//! Holds at most one credential. Reads are synchronous; writes replace the
//! whole value at once. Sign-in and sign-out transitions are published to
//! subscribers, a `SignedOut` event being the signal to go back to login.

use crate::models::Identity;
use secrecy::{ExposeSecret, Secret};
use tokio::sync::{broadcast, watch};

/// Bearer token plus the identity it was issued for.
#[derive(Debug, Clone)]
pub struct Credential {
    token: Secret<String>,
    identity: Identity,
}

impl Credential {
    pub fn new(token: impl Into<String>, identity: Identity) -> Self {
        Self {
            token: Secret::new(token.into()),
            identity,
        }
    }

    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user asked to sign out.
    Logout,
    /// The API answered 401 for the stored credential.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: String },
    SignedOut { reason: SignOutReason },
}

pub struct CredentialStore {
    slot: watch::Sender<Option<Credential>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        let (events, _) = broadcast::channel(16);
        Self { slot, events }
    }

    /// Replace the stored credential (login, register, token rotation).
    pub fn set(&self, credential: Credential) {
        let user_id = credential.identity.id.clone();
        self.slot.send_replace(Some(credential));

        tracing::info!(user_id = %user_id, "Session credential stored");
        let _ = self.events.send(SessionEvent::SignedIn { user_id });
    }

    pub fn current(&self) -> Option<Credential> {
        self.slot.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.slot.borrow().as_ref().map(|c| c.identity.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Explicit logout. Returns whether a credential was actually removed.
    pub fn clear(&self) -> bool {
        self.clear_if(SignOutReason::Logout, |_| true)
    }

    /// Unauthorized-response hook.
    ///
    /// Clears the slot only while it still holds `token`, so a late 401 for
    /// an old token cannot sign out a newer session. Concurrent failures for
    /// the same token produce a single `SignedOut` event.
    pub fn invalidate(&self, token: &str) -> bool {
        let cleared = self.clear_if(SignOutReason::Rejected, |c| c.token() == token);
        if cleared {
            crate::services::metrics::record_session_invalidated();
        }
        cleared
    }

    /// Refresh the cached identity (e.g. after `GET /auth/profile`).
    ///
    /// Ignored when the slot is empty or belongs to another identity.
    pub fn update_identity(&self, identity: Identity) -> bool {
        self.slot.send_if_modified(|slot| match slot {
            Some(credential) if credential.identity.id == identity.id => {
                if credential.identity == identity {
                    false
                } else {
                    credential.identity = identity;
                    true
                }
            }
            _ => false,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn clear_if(&self, reason: SignOutReason, predicate: impl Fn(&Credential) -> bool) -> bool {
        let cleared = self.slot.send_if_modified(|slot| {
            let matches = slot.as_ref().is_some_and(&predicate);
            if matches {
                *slot = None;
            }
            matches
        });

        if cleared {
            tracing::info!(reason = ?reason, "Session credential cleared");
            let _ = self.events.send(SessionEvent::SignedOut { reason });
        }
        cleared
    }
}
