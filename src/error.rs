//! Error types for the host shell
//!
//! Every failure the shell can surface is one of these `thiserror` enums.
//! Network-facing errors degrade a subtree (a remote mount, a form); only
//! `AuthError::ContextUnavailable` is a programming error.

use std::sync::Arc;

use thiserror::Error;

use crate::auth::AuthError;

/// Crate-level error type
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Routing error: {0}")]
    Route(#[from] RouteError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

/// Environment / configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL in {key} ('{value}'): {source}")]
    InvalidUrl {
        key: String,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid number in {key}: '{value}'")]
    InvalidNumber { key: String, value: String },

    #[error("Invalid boolean in {key}: '{value}'")]
    InvalidBool { key: String, value: String },
}

/// Remote registry and module loading errors
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Unknown remote '{0}'")]
    UnknownRemote(String),

    #[error("Remote '{0}' has not been registered with the loader")]
    NotRegistered(String),

    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid manifest at {url}: {reason}")]
    Manifest { url: String, reason: String },

    #[error("Manifest for remote '{remote}' is unavailable: {source}")]
    ManifestUnavailable {
        remote: String,
        source: Arc<RemoteError>,
    },

    #[error("Remote '{remote}' does not expose module '{module}'")]
    ExposeNotFound { remote: String, module: String },

    #[error("Module '{key}' is not a route table: {reason}")]
    InvalidModule { key: String, reason: String },

    #[error("Module '{0}' is not available")]
    NotFound(String),
}

/// Route resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Redirect loop while resolving '{path}' ({hops} hops)")]
    RedirectLoop { path: String, hops: usize },

    #[error("Route table is not available while the session is loading")]
    SessionLoading,
}

pub type Result<T> = std::result::Result<T, ShellError>;
