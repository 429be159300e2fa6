//! Auth error taxonomy

use thiserror::Error;

use super::validation::ValidationErrors;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Session accessed through a context that was never wired up
    #[error("Auth session accessed outside of an initialized AuthContext")]
    ContextUnavailable,

    /// Non-2xx response; `message` is what the form shows
    #[error("{message} (HTTP {status})")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// 2xx response reporting `success: false`
    #[error("{0}")]
    Rejected(String),

    #[error("'{action}' is not available in the {current} step")]
    WrongStep {
        action: &'static str,
        current: &'static str,
    },

    #[error("Invalid endpoint '{path}': {source}")]
    Endpoint {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

impl AuthError {
    /// Message to show inline on the originating form
    pub fn inline_message(&self) -> String {
        match self {
            AuthError::Server { message, .. } | AuthError::Rejected(message) => message.clone(),
            AuthError::Validation(errors) => errors
                .errors()
                .first()
                .map(|e| e.message.to_string())
                .unwrap_or_default(),
            other => other.to_string(),
        }
    }

    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            AuthError::Validation(_) | AuthError::WrongStep { .. } | AuthError::ContextUnavailable
        )
    }
}

impl From<ValidationErrors> for AuthError {
    fn from(errors: ValidationErrors) -> Self {
        AuthError::Validation(errors)
    }
}
