use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform user as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "name", alias = "username", default)]
    pub display_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Display name, or the local part of the email when the name is blank.
    pub fn name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            self.email.split('@').next().unwrap_or("User")
        } else {
            &self.display_name
        }
    }

    pub fn initials(&self) -> String {
        let initials: String = self
            .name()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .take(2)
            .collect();
        if initials.is_empty() {
            "U".to_string()
        } else {
            initials.to_uppercase()
        }
    }
}

/// Body of `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(alias = "identity")]
    pub user: Identity,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdentityEnvelope {
    Wrapped { user: Identity },
    Bare(Identity),
}

impl IdentityEnvelope {
    pub(crate) fn into_inner(self) -> Identity {
        match self {
            IdentityEnvelope::Wrapped { user } => user,
            IdentityEnvelope::Bare(user) => user,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdentityListEnvelope {
    Wrapped { users: Vec<Identity> },
    Bare(Vec<Identity>),
}

impl IdentityListEnvelope {
    pub(crate) fn into_inner(self) -> Vec<Identity> {
        match self {
            IdentityListEnvelope::Wrapped { users } => users,
            IdentityListEnvelope::Bare(users) => users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mongo_style_identity() {
        let json = r#"{"_id":"u1","name":"Ada","email":"ada@example.com","role":"editor","createdAt":"2024-05-01T10:00:00Z"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.display_name, "Ada");
        assert_eq!(identity.role, Role::Editor);
        assert!(identity.created_at.is_some());
    }

    #[test]
    fn name_falls_back_to_email_local_part() {
        let identity = Identity {
            id: "u2".to_string(),
            display_name: String::new(),
            email: "grace@example.com".to_string(),
            role: Role::Viewer,
            created_at: None,
        };
        assert_eq!(identity.name(), "grace");
        assert_eq!(identity.initials(), "GR");
    }

    #[test]
    fn list_envelope_accepts_both_shapes() {
        let wrapped: IdentityListEnvelope = serde_json::from_str(
            r#"{"users":[{"id":"a","email":"a@x.io","role":"admin"}]}"#,
        )
        .unwrap();
        assert_eq!(wrapped.into_inner().len(), 1);

        let bare: IdentityListEnvelope =
            serde_json::from_str(r#"[{"id":"b","email":"b@x.io","role":"viewer"}]"#).unwrap();
        assert_eq!(bare.into_inner()[0].role, Role::Viewer);
    }
}
