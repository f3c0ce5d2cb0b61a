use crate::error::{PortalError, ValidationError};
use crate::models::identity::{IdentityEnvelope, IdentityListEnvelope};
use crate::models::{AuthResponse, Identity, Role};
use crate::services::api_client::ApiClient;
use crate::services::credential_store::Credential;
use crate::services::roster::IdentityDirectory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Session flows against the identity provider, plus the admin-only user
/// endpoints under `/auth/users`.
pub struct AuthClient {
    api: Arc<ApiClient>,
}

impl AuthClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<Identity, PortalError> {
        request.validate().map_err(ValidationError::from)?;

        let auth: AuthResponse = self.api.post_json("/auth/login", &request).await?;
        tracing::info!(user_id = %auth.user.id, role = %auth.user.role, "User logged in");

        Ok(self.store(auth))
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<Identity, PortalError> {
        request.validate().map_err(ValidationError::from)?;

        let auth: AuthResponse = self.api.post_json("/auth/register", &request).await?;
        tracing::info!(user_id = %auth.user.id, "User registered");

        Ok(self.store(auth))
    }

    /// Re-read the signed-in identity so role changes made elsewhere show up.
    pub async fn profile(&self) -> Result<Identity, PortalError> {
        if !self.api.credentials().is_authenticated() {
            return Err(PortalError::NotAuthenticated);
        }

        let envelope: IdentityEnvelope = self.api.get_json("/auth/profile").await?;
        let identity = envelope.into_inner();
        self.api.credentials().update_identity(identity.clone());

        Ok(identity)
    }

    /// Local sign-out. Returns whether a session was active.
    pub fn logout(&self) -> bool {
        self.api.credentials().clear()
    }

    fn store(&self, auth: AuthResponse) -> Identity {
        let identity = auth.user.clone();
        self.api
            .credentials()
            .set(Credential::new(auth.token, auth.user));
        identity
    }
}

#[derive(Serialize)]
struct RoleChange {
    role: Role,
}

#[async_trait]
impl IdentityDirectory for AuthClient {
    async fn list_identities(&self) -> Result<Vec<Identity>, PortalError> {
        let envelope: IdentityListEnvelope = self.api.get_json("/auth/users").await?;
        Ok(envelope.into_inner())
    }

    async fn change_role(&self, identity_id: &str, role: Role) -> Result<Identity, PortalError> {
        let path = format!("/auth/users/{}/role", urlencoding::encode(identity_id));
        let envelope: IdentityEnvelope = self.api.put_json(&path, &RoleChange { role }).await?;
        Ok(envelope.into_inner())
    }

    async fn remove_identity(&self, identity_id: &str) -> Result<(), PortalError> {
        let path = format!("/auth/users/{}", urlencoding::encode(identity_id));
        self.api.delete(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_requires_valid_email() {
        let request = LoginRequest {
            email: "not-an-email".to_string(),
            password: "secret".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn register_request_enforces_password_length() {
        let request = RegisterRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "123".to_string(),
        };
        let err = ValidationError::from(request.validate().unwrap_err());
        assert!(err.to_string().contains("at least 6"));
    }
}
