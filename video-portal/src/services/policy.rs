//! Role-based access policy.
//!
//! Pure decision function with no I/O. The API remains the final authority;
//! this decides which actions the portal attempts at all.

use crate::models::{Identity, Role, VideoAsset};

/// Actions gated by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// See the user roster.
    ViewAdminRoster,
    /// Assign the given role to another identity.
    ChangeRole(Role),
    /// Delete another identity (and, server-side, its videos).
    RemoveIdentity,
    EditAnyTitle,
    EditOwnTitle,
    DeleteAnyVideo,
    DeleteOwnVideo,
}

/// Decide whether `role` may perform `action`.
///
/// `is_self` means the target is the actor: their own identity for roster
/// actions, or a video they own for the `*Own*` actions. Acting on oneself
/// through the roster is always denied, admin included.
pub fn can_perform(role: Role, action: Action, is_self: bool) -> bool {
    let is_admin = role == Role::Admin;

    match action {
        Action::ViewAdminRoster => is_admin,
        Action::ChangeRole(_) | Action::RemoveIdentity => is_admin && !is_self,
        Action::EditOwnTitle | Action::DeleteOwnVideo => is_self,
        Action::EditAnyTitle | Action::DeleteAnyVideo => is_admin,
    }
}

/// Whether `actor` may rename `video`, through ownership or admin rights.
pub fn can_rename(actor: &Identity, video: &VideoAsset) -> bool {
    can_perform(actor.role, Action::EditOwnTitle, video.is_owned_by(&actor.id))
        || can_perform(actor.role, Action::EditAnyTitle, false)
}

/// Whether `actor` may delete `video`, through ownership or admin rights.
pub fn can_delete(actor: &Identity, video: &VideoAsset) -> bool {
    can_perform(actor.role, Action::DeleteOwnVideo, video.is_owned_by(&actor.id))
        || can_perform(actor.role, Action::DeleteAnyVideo, false)
}
