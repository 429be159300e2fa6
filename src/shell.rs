//! Host Shell
//!
//! Wires the pieces together the way the page bootstraps: resolve the
//! remotes, register them with the loader, create the session and compose
//! both route sets. Exactly one set is active once the status check settles;
//! before that, every location renders the loading placeholder.

use std::sync::Arc;

use crate::auth::{AuthApi, AuthContext, AuthSession, HttpAuthClient, SessionPhase, SessionState, TokenStore};
use crate::config::{HostConfig, HostVariant};
use crate::error::{RouteError, ShellError};
use crate::query::QueryCache;
use crate::remotes::{ManifestFetcher, RemoteFetcher, RemoteLoader, RemoteRegistry};
use crate::routes::{self, Mode, Rendered, RouteComposer, RouterTable};

/// The route set currently mounted
#[derive(Debug, Clone, Copy)]
pub enum ActiveRoutes<'a> {
    /// Status check still in flight; no route set is mounted
    Loading,
    Authenticated(&'a RouterTable),
    Public(&'a RouterTable),
}

impl<'a> ActiveRoutes<'a> {
    pub fn table(&self) -> Option<&'a RouterTable> {
        match self {
            ActiveRoutes::Loading => None,
            ActiveRoutes::Authenticated(table) | ActiveRoutes::Public(table) => Some(table),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActiveRoutes::Loading => "loading",
            ActiveRoutes::Authenticated(_) => "authenticated",
            ActiveRoutes::Public(_) => "public",
        }
    }
}

pub struct Shell {
    config: HostConfig,
    registry: RemoteRegistry,
    loader: Arc<RemoteLoader>,
    session: Arc<AuthSession>,
    authenticated: RouterTable,
    public: RouterTable,
}

impl Shell {
    /// Production wiring: HTTP manifest fetcher and HTTP auth client
    pub fn new(config: HostConfig) -> Result<Self, ShellError> {
        let fetcher = Arc::new(ManifestFetcher::new(config.http_timeout)?);
        let tokens = TokenStore::new();
        let api = Arc::new(HttpAuthClient::new(&config, tokens.clone())?);
        Ok(Self::with_parts(config, fetcher, api, tokens))
    }

    /// Wiring with caller-supplied fetcher and auth backend. `tokens` must be
    /// the store `api` reads its bearer credential from.
    pub fn with_parts(
        config: HostConfig,
        fetcher: Arc<dyn RemoteFetcher>,
        api: Arc<dyn AuthApi>,
        tokens: TokenStore,
    ) -> Self {
        let registry = RemoteRegistry::from_config(&config);
        let loader = Arc::new(RemoteLoader::new(fetcher));
        loader.register_remotes(registry.iter());

        let session = Arc::new(AuthSession::new(
            api,
            tokens,
            Arc::new(QueryCache::new()),
            config.refresh_lead,
        ));

        let variant = config.variant();
        let composer = RouteComposer::new(Arc::clone(&loader), config.remote_min_display);
        let authenticated = composer.compose(&routes::tables::authenticated_routes(variant));
        let public = composer.compose(&routes::tables::public_routes(variant));
        tracing::info!(
            ?variant,
            origin = %config.page.origin(),
            remotes = registry.len(),
            "Shell composed"
        );

        Self {
            config,
            registry,
            loader,
            session,
            authenticated,
            public,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn variant(&self) -> HostVariant {
        self.config.variant()
    }

    pub fn registry(&self) -> &RemoteRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &Arc<RemoteLoader> {
        &self.loader
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn authenticated_routes(&self) -> &RouterTable {
        &self.authenticated
    }

    pub fn public_routes(&self) -> &RouterTable {
        &self.public
    }

    pub fn context(&self) -> AuthContext {
        AuthContext::new(Arc::clone(&self.session))
    }

    /// Run the one session status check
    pub async fn start(&self) -> SessionState {
        self.session.start().await
    }

    pub fn active_routes(&self) -> ActiveRoutes<'_> {
        match self.session.state().phase() {
            SessionPhase::Loading => ActiveRoutes::Loading,
            SessionPhase::Authenticated => ActiveRoutes::Authenticated(&self.authenticated),
            SessionPhase::Unauthenticated => ActiveRoutes::Public(&self.public),
        }
    }

    /// What the page shows at `path` right now, without waiting on anything
    pub fn render(&self, path: &str) -> Result<Rendered, RouteError> {
        match self.active_routes().table() {
            Some(table) => routes::render(table, path),
            None => Ok(Rendered::placeholder(path)),
        }
    }

    /// Settle the session and every remote on the way, then resolve `path`
    pub async fn navigate(&self, path: &str) -> Result<Rendered, RouteError> {
        self.start().await;
        let table = self.active_routes().table().ok_or(RouteError::SessionLoading)?;
        let rendered = routes::resolve(table, path, Mode::Settle).await?;
        tracing::debug!(path, resolved = %rendered.path, view = ?rendered.view, "Navigated");
        Ok(rendered)
    }
}
