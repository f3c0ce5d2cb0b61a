//! Admin roster: list identities, change roles, remove identities.
//!
//! Rows change only after the identity provider confirms. Removal is
//! two-step: a ticket is issued first and the delete runs only when that
//! ticket is confirmed.

use crate::error::{PortalError, ValidationError};
use crate::models::{Identity, Role};
use crate::services::credential_store::CredentialStore;
use crate::services::policy::{can_perform, Action};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Admin surface of the identity provider.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn list_identities(&self) -> Result<Vec<Identity>, PortalError>;
    async fn change_role(&self, identity_id: &str, role: Role) -> Result<Identity, PortalError>;
    async fn remove_identity(&self, identity_id: &str) -> Result<(), PortalError>;
}

/// Pending removal awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalTicket {
    pub id: Uuid,
    pub identity_id: String,
    pub email: Option<String>,
}

pub struct RosterController {
    directory: Arc<dyn IdentityDirectory>,
    credentials: Arc<CredentialStore>,
    rows: RwLock<Vec<Identity>>,
    pending: Mutex<Option<RemovalTicket>>,
}

impl RosterController {
    pub fn new(directory: Arc<dyn IdentityDirectory>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            directory,
            credentials,
            rows: RwLock::new(Vec::new()),
            pending: Mutex::new(None),
        }
    }

    /// Everyone but the acting admin, optionally narrowed by an email
    /// substring. Registry order is kept.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Identity>, PortalError> {
        let actor = self.authorize(Action::ViewAdminRoster, None)?;

        let identities = self.directory.list_identities().await?;
        let others: Vec<Identity> = identities
            .into_iter()
            .filter(|identity| identity.id != actor.id)
            .collect();
        tracing::debug!(count = others.len(), "Loaded roster");

        *self.rows.write().await = others.clone();
        Ok(filter_by_email(others, search))
    }

    /// Last loaded rows, filtered locally.
    pub async fn cached(&self, search: Option<&str>) -> Vec<Identity> {
        filter_by_email(self.rows.read().await.clone(), search)
    }

    pub async fn change_role(&self, target_id: &str, role: Role) -> Result<Identity, PortalError> {
        let target_id = require_target(target_id)?;
        let actor = self.authorize(Action::ChangeRole(role), Some(target_id))?;

        match self.directory.change_role(target_id, role).await {
            Ok(updated) => {
                tracing::info!(
                    admin_id = %actor.id,
                    target_id = %target_id,
                    role = %role,
                    "Role changed"
                );
                let mut rows = self.rows.write().await;
                if let Some(row) = rows.iter_mut().find(|row| row.id == updated.id) {
                    *row = updated.clone();
                }
                Ok(updated)
            }
            Err(e) => Err(self.reconcile_failure(target_id, e).await),
        }
    }

    /// First step of removal. Replaces any earlier unconfirmed ticket.
    pub async fn request_removal(&self, target_id: &str) -> Result<RemovalTicket, PortalError> {
        let target_id = require_target(target_id)?;
        self.authorize(Action::RemoveIdentity, Some(target_id))?;

        let email = self
            .rows
            .read()
            .await
            .iter()
            .find(|row| row.id == target_id)
            .map(|row| row.email.clone());
        let ticket = RemovalTicket {
            id: Uuid::new_v4(),
            identity_id: target_id.to_string(),
            email,
        };

        *self.ticket() = Some(ticket.clone());
        Ok(ticket)
    }

    pub fn pending_removal(&self) -> Option<RemovalTicket> {
        self.ticket().clone()
    }

    /// Returns whether a ticket was discarded.
    pub fn cancel_removal(&self) -> bool {
        self.ticket().take().is_some()
    }

    /// Second step of removal. The ticket is consumed whatever the outcome.
    pub async fn confirm_removal(&self, ticket_id: Uuid) -> Result<RemovalTicket, PortalError> {
        let ticket = {
            let mut pending = self.ticket();
            match pending.take() {
                Some(ticket) if ticket.id == ticket_id => ticket,
                other => {
                    *pending = other;
                    return Err(PortalError::ConflictOrNotFound(Some(
                        "No pending removal matches this confirmation".to_string(),
                    )));
                }
            }
        };

        let actor = self.authorize(Action::RemoveIdentity, Some(&ticket.identity_id))?;

        match self.directory.remove_identity(&ticket.identity_id).await {
            Ok(()) => {
                tracing::info!(admin_id = %actor.id, target_id = %ticket.identity_id, "Identity removed");
                self.drop_row(&ticket.identity_id).await;
                Ok(ticket)
            }
            Err(e) => Err(self.reconcile_failure(&ticket.identity_id, e).await),
        }
    }

    fn authorize(&self, action: Action, target_id: Option<&str>) -> Result<Identity, PortalError> {
        let actor = self
            .credentials
            .identity()
            .ok_or(PortalError::NotAuthenticated)?;
        let is_self = target_id.is_some_and(|id| id == actor.id);

        if can_perform(actor.role, action, is_self) {
            Ok(actor)
        } else {
            tracing::debug!(user_id = %actor.id, action = ?action, "Roster action denied");
            Err(PortalError::NotPermitted(action))
        }
    }

    /// Forget the loaded rows and any pending removal.
    pub async fn reset(&self) {
        self.cancel_removal();
        self.rows.write().await.clear();
    }

    fn ticket(&self) -> MutexGuard<'_, Option<RemovalTicket>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drop_row(&self, identity_id: &str) {
        self.rows.write().await.retain(|row| row.id != identity_id);
    }

    async fn reconcile_failure(&self, identity_id: &str, err: PortalError) -> PortalError {
        if matches!(err, PortalError::ConflictOrNotFound(_)) {
            self.drop_row(identity_id).await;
        }
        err
    }
}

fn require_target(target_id: &str) -> Result<&str, ValidationError> {
    let target_id = target_id.trim();
    if target_id.is_empty() {
        Err(ValidationError::MissingRoleTarget)
    } else {
        Ok(target_id)
    }
}

fn filter_by_email(identities: Vec<Identity>, search: Option<&str>) -> Vec<Identity> {
    let needle = match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(needle) => needle.to_lowercase(),
        None => return identities,
    };

    identities
        .into_iter()
        .filter(|identity| identity.email.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity, signed_in};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeDirectory {
        identities: Mutex<Vec<Identity>>,
        failures: Mutex<VecDeque<PortalError>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeDirectory {
        fn with(identities: Vec<Identity>) -> Self {
            let directory = Self::default();
            *directory.identities.lock().unwrap() = identities;
            directory
        }

        fn fail_next(&self, err: PortalError) {
            self.failures.lock().unwrap().push_back(err);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> Result<(), PortalError> {
            self.calls.lock().unwrap().push(call);
            match self.failures.lock().unwrap().pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl IdentityDirectory for FakeDirectory {
        async fn list_identities(&self) -> Result<Vec<Identity>, PortalError> {
            self.record("list".to_string())?;
            Ok(self.identities.lock().unwrap().clone())
        }

        async fn change_role(&self, identity_id: &str, role: Role) -> Result<Identity, PortalError> {
            self.record(format!("role {} {}", identity_id, role))?;
            let mut identities = self.identities.lock().unwrap();
            let identity = identities
                .iter_mut()
                .find(|identity| identity.id == identity_id)
                .ok_or(PortalError::ConflictOrNotFound(None))?;
            identity.role = role;
            Ok(identity.clone())
        }

        async fn remove_identity(&self, identity_id: &str) -> Result<(), PortalError> {
            self.record(format!("remove {}", identity_id))?;
            self.identities
                .lock()
                .unwrap()
                .retain(|identity| identity.id != identity_id);
            Ok(())
        }
    }

    fn everyone() -> Vec<Identity> {
        vec![
            identity("zed", Role::Viewer),
            identity("admin", Role::Admin),
            identity("amy", Role::Editor),
        ]
    }

    fn roster(directory: Arc<FakeDirectory>, actor: &str, role: Role) -> RosterController {
        RosterController::new(directory, Arc::new(signed_in(actor, role)))
    }

    fn ids(identities: &[Identity]) -> Vec<&str> {
        identities.iter().map(|i| i.id.as_str()).collect()
    }

    #[tokio::test]
    async fn list_excludes_actor_and_keeps_order() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory, "admin", Role::Admin);

        let rows = roster.list(None).await.unwrap();
        assert_eq!(ids(&rows), vec!["zed", "amy"]);
    }

    #[tokio::test]
    async fn list_filters_email_case_insensitively() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory, "admin", Role::Admin);

        let rows = roster.list(Some("AMY@")).await.unwrap();
        assert_eq!(ids(&rows), vec!["amy"]);
        assert_eq!(ids(&roster.cached(Some("zed")).await), vec!["zed"]);
    }

    #[tokio::test]
    async fn non_admin_cannot_list() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory.clone(), "amy", Role::Editor);

        let err = roster.list(None).await.unwrap_err();
        assert!(matches!(err, PortalError::NotPermitted(Action::ViewAdminRoster)));
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn change_role_updates_row_after_success() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory, "admin", Role::Admin);
        roster.list(None).await.unwrap();

        let updated = roster.change_role("zed", Role::Editor).await.unwrap();
        assert_eq!(updated.role, Role::Editor);
        assert_eq!(roster.cached(Some("zed")).await[0].role, Role::Editor);
    }

    #[tokio::test]
    async fn empty_target_is_rejected_locally() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory.clone(), "admin", Role::Admin);

        let err = roster.change_role(" ", Role::Editor).await.unwrap_err();
        assert!(matches!(
            err,
            PortalError::Validation(ValidationError::MissingRoleTarget)
        ));
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn admin_cannot_change_own_role() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory.clone(), "admin", Role::Admin);

        let err = roster.change_role("admin", Role::Viewer).await.unwrap_err();
        assert!(matches!(err, PortalError::NotPermitted(Action::ChangeRole(Role::Viewer))));
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn server_refusal_is_surfaced_verbatim() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory.clone(), "admin", Role::Admin);
        roster.list(None).await.unwrap();

        directory.fail_next(PortalError::Forbidden(Some(
            "Cannot demote the last admin".to_string(),
        )));
        let err = roster.change_role("zed", Role::Admin).await.unwrap_err();

        assert_eq!(err.user_message("Failed to update role"), "Cannot demote the last admin");
        assert_eq!(roster.cached(Some("zed")).await[0].role, Role::Viewer);
    }

    #[tokio::test]
    async fn removal_requires_confirmation() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory.clone(), "admin", Role::Admin);
        roster.list(None).await.unwrap();

        let ticket = roster.request_removal("zed").await.unwrap();
        assert_eq!(ticket.email.as_deref(), Some("zed@example.com"));
        assert!(!directory.calls().iter().any(|c| c.starts_with("remove")));
        assert_eq!(ids(&roster.cached(None).await), vec!["zed", "amy"]);

        roster.confirm_removal(ticket.id).await.unwrap();
        assert!(directory.calls().contains(&"remove zed".to_string()));
        assert_eq!(ids(&roster.cached(None).await), vec!["amy"]);
        assert!(roster.pending_removal().is_none());
    }

    #[tokio::test]
    async fn cancelled_removal_cannot_be_confirmed() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory.clone(), "admin", Role::Admin);

        let ticket = roster.request_removal("zed").await.unwrap();
        assert!(roster.cancel_removal());

        let err = roster.confirm_removal(ticket.id).await.unwrap_err();
        assert!(matches!(err, PortalError::ConflictOrNotFound(_)));
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn reset_forgets_rows_and_pending_ticket() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory, "admin", Role::Admin);
        roster.list(None).await.unwrap();
        roster.request_removal("zed").await.unwrap();

        roster.reset().await;

        assert!(roster.cached(None).await.is_empty());
        assert!(roster.pending_removal().is_none());
    }

    #[tokio::test]
    async fn failed_removal_keeps_row() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory.clone(), "admin", Role::Admin);
        roster.list(None).await.unwrap();

        directory.fail_next(PortalError::Server {
            status: 500,
            message: None,
        });
        let ticket = roster.request_removal("amy").await.unwrap();
        assert!(roster.confirm_removal(ticket.id).await.is_err());

        assert_eq!(ids(&roster.cached(None).await), vec!["zed", "amy"]);
    }

    #[tokio::test]
    async fn already_removed_identity_drops_row() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory.clone(), "admin", Role::Admin);
        roster.list(None).await.unwrap();

        directory.fail_next(PortalError::ConflictOrNotFound(Some("User not found".to_string())));
        let ticket = roster.request_removal("amy").await.unwrap();
        let err = roster.confirm_removal(ticket.id).await.unwrap_err();

        assert_eq!(err.user_message("Failed to delete user"), "User not found");
        assert_eq!(ids(&roster.cached(None).await), vec!["zed"]);
    }

    #[tokio::test]
    async fn admin_cannot_remove_self() {
        let directory = Arc::new(FakeDirectory::with(everyone()));
        let roster = roster(directory, "admin", Role::Admin);

        let err = roster.request_removal("admin").await.unwrap_err();
        assert!(matches!(err, PortalError::NotPermitted(Action::RemoveIdentity)));
    }
}
