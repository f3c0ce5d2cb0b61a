use crate::services::policy::Action;
use service_core::error::AppError;
use thiserror::Error;

/// Local, pre-network validation failures. These never leave the component
/// that raised them and never reach the API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid file type '{media_type}'. Please upload MP4, MOV, AVI, or WebM files only.")]
    UnsupportedFormat { media_type: String },

    #[error("File size of {size} bytes exceeds the {limit} byte limit.")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Please enter a title for your video")]
    MissingTitle,

    #[error("Select a user before changing roles")]
    MissingRoleTarget,

    #[error("{0}")]
    InvalidForm(String),
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ValidationError::InvalidForm(errors.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PortalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Denied locally by the access policy; no request was sent.
    #[error("Not permitted: {0:?}")]
    NotPermitted(Action),

    /// No credential in the store.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The API rejected the credential; the store has been cleared.
    #[error("Session expired, please sign in again")]
    CredentialRejected,

    /// 401 for a request sent without a credential (e.g. a failed login).
    #[error("Unauthorized: {}", .0.as_deref().unwrap_or("invalid credentials"))]
    Unauthorized(Option<String>),

    /// Role or ownership rejection from the API.
    #[error("Forbidden: {}", .0.as_deref().unwrap_or("access denied"))]
    Forbidden(Option<String>),

    /// Target was deleted or changed by someone else.
    #[error("Not found or changed: {}", .0.as_deref().unwrap_or("resource is gone"))]
    ConflictOrNotFound(Option<String>),

    #[error("Server error {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Server { status: u16, message: Option<String> },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl PortalError {
    /// Transport failures and 5xx answers may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            PortalError::Transport(_) => true,
            PortalError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Message the API attached to the failure, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            PortalError::Unauthorized(message)
            | PortalError::Forbidden(message)
            | PortalError::ConflictOrNotFound(message)
            | PortalError::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Text to show inline: the server's message verbatim when present,
    /// local validation text as-is, otherwise the per-action fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            PortalError::Validation(err) => err.to_string(),
            PortalError::CredentialRejected | PortalError::NotAuthenticated => self.to_string(),
            _ => self
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string()),
        }
    }

    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            PortalError::CredentialRejected | PortalError::NotAuthenticated
        )
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PortalError::Decode(err.to_string())
        } else {
            PortalError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("An upload is already in progress")]
    AlreadyUploading,

    #[error("Cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("{message}")]
    UploadFailed {
        message: String,
        #[source]
        source: PortalError,
    },
}

pub const UPLOAD_FAILED_MESSAGE: &str = "Upload failed. Please try again.";

impl UploadError {
    pub fn failed(source: PortalError) -> Self {
        UploadError::UploadFailed {
            message: source.user_message(UPLOAD_FAILED_MESSAGE),
            source,
        }
    }
}

pub const LOGIN_REQUIRED: &str = "login_required";

impl From<PortalError> for AppError {
    fn from(err: PortalError) -> Self {
        match err {
            PortalError::Validation(e) => AppError::ValidationError(e.to_string()),
            PortalError::NotPermitted(action) => {
                AppError::Forbidden(anyhow::anyhow!("Action not permitted: {:?}", action))
            }
            PortalError::NotAuthenticated | PortalError::CredentialRejected => {
                AppError::Unauthorized {
                    message: err.to_string(),
                    details: Some(LOGIN_REQUIRED.to_string()),
                }
            }
            PortalError::Unauthorized(_) => AppError::Unauthorized {
                message: err.user_message("Invalid email or password"),
                details: Some(LOGIN_REQUIRED.to_string()),
            },
            PortalError::Forbidden(_) => {
                AppError::Forbidden(anyhow::anyhow!(err.user_message("Access denied")))
            }
            PortalError::ConflictOrNotFound(_) => {
                AppError::NotFound(anyhow::anyhow!(err.user_message("Resource not found")))
            }
            PortalError::Server { status, .. } if status < 500 => {
                AppError::BadRequest(anyhow::anyhow!(err.user_message("Request rejected")))
            }
            PortalError::Server { .. } | PortalError::Decode(_) => {
                AppError::BadGateway(err.to_string())
            }
            PortalError::Transport(e) => AppError::ServiceUnavailable(e),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Invalid(e) => AppError::ValidationError(e.to_string()),
            UploadError::AlreadyUploading => AppError::Conflict(anyhow::anyhow!(err.to_string())),
            UploadError::Unreadable { .. } => {
                AppError::BadRequest(anyhow::anyhow!(err.to_string()))
            }
            UploadError::UploadFailed { source, .. } if source.requires_login() => source.into(),
            UploadError::UploadFailed { message, .. } => AppError::BadGateway(message),
        }
    }
}
