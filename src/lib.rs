//! Nexus Host - micro-frontend host shell
//!
//! Bootstraps a page that is assembled from independently deployed remotes:
//! resolves where each remote lives, loads their exposed route tables once
//! per session, and gates the whole route tree on a single session status
//! check.
//!
//! ## Flow
//! Page location -> Remote registry -> Remote loader (single-flight cache)
//! -> Route composer -> authenticated or public route set
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nexus_host::{HostConfig, Shell};
//!
//! # async fn run() -> nexus_host::Result<()> {
//! let shell = Shell::new(HostConfig::from_env()?)?;
//! shell.start().await;
//! let page = shell.navigate("/").await?;
//! println!("{} -> {:?}", page.path, page.view);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Environment and page location
pub mod config;

// Remote registry, fetch runtime and module cache
pub mod remotes;

// Route tables, composition and resolution
pub mod routes;

// Server-state cache backing the session status
pub mod query;

// Session, tokens, password reset
pub mod auth;

// Bootstrap facade
pub mod shell;

pub use auth::{AuthContext, AuthError, AuthSession, Navigation, PasswordResetFlow, SessionState};
pub use config::{HostConfig, HostVariant, PageLocation};
pub use error::{ConfigError, RemoteError, Result, RouteError, ShellError};
pub use remotes::{RemoteDescriptor, RemoteLoader, RemoteModule, RemoteRegistry};
pub use routes::{Rendered, RouteEntry, RouterTable, View};
pub use shell::{ActiveRoutes, Shell};
