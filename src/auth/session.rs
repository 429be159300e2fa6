//! Auth Session
//!
//! ```text
//! Loading --status ok, authenticated--> Authenticated
//!    \------status unauthenticated or failed--> Unauthenticated
//! ```
//!
//! The status endpoint is queried exactly once per session (through the
//! query cache with infinite stale time and no retry). There is no way back
//! to `Loading`; login, logout and password reset all end with a full reload
//! that builds a fresh session. A failed background refresh moves an
//! authenticated session to unauthenticated with `expired` set, so the
//! authenticated set is never shown without a credential.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, OnceCell};

use super::client::AuthApi;
use super::error::AuthError;
use super::reset::PasswordResetFlow;
use super::token::{RefreshEvent, RefreshScheduler, TokenKind, TokenStore};
use super::types::{AuthStatusResponse, LoginRequest, User};
use super::validation;
use crate::query::{QueryCache, QueryOptions};

/// Query key of the session status
pub const STATUS_QUERY: [&str; 2] = ["auth", "status"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Authenticated,
    Unauthenticated,
}

/// What the rest of the shell sees of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub is_loading: bool,
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub expires_in: Option<u64>,
    /// Status check or refresh failure, if any; the session is then unauthenticated
    pub error: Option<String>,
    /// The token could not be refreshed; only a reload recovers
    pub expired: bool,
}

impl SessionState {
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            is_authenticated: false,
            user: None,
            access_token: None,
            expires_in: None,
            error: None,
            expired: false,
        }
    }

    fn from_status(status: AuthStatusResponse) -> Self {
        Self {
            is_loading: false,
            is_authenticated: status.is_authenticated,
            user: status.user,
            access_token: status.access_token,
            expires_in: status.expires_in,
            error: None,
            expired: false,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            is_loading: false,
            error: Some(message),
            ..Self::loading()
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_loading {
            SessionPhase::Loading
        } else if self.is_authenticated {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        }
    }
}

fn apply_refresh(state: &watch::Sender<SessionState>, event: RefreshEvent) {
    match event {
        RefreshEvent::Refreshed {
            access_token,
            expires_in,
        } => state.send_modify(|s| {
            s.access_token = Some(access_token);
            s.expires_in = Some(expires_in);
        }),
        RefreshEvent::Expired { reason } => {
            tracing::warn!(reason = %reason, "Session expired, a full reload is required");
            state.send_modify(|s| {
                s.is_authenticated = false;
                s.access_token = None;
                s.expires_in = None;
                s.error = Some(reason);
                s.expired = true;
            });
        }
    }
}

/// Where the caller should go after a session-changing action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Discard all client state and start again at `to`
    FullReload { to: String },
}

impl Navigation {
    pub fn home() -> Self {
        Navigation::FullReload { to: "/".to_string() }
    }

    pub fn target(&self) -> &str {
        match self {
            Navigation::FullReload { to } => to,
        }
    }
}

pub struct AuthSession {
    api: Arc<dyn AuthApi>,
    tokens: TokenStore,
    queries: Arc<QueryCache>,
    refresh: RefreshScheduler,
    state: Arc<watch::Sender<SessionState>>,
    bootstrap: OnceCell<()>,
}

impl AuthSession {
    pub fn new(
        api: Arc<dyn AuthApi>,
        tokens: TokenStore,
        queries: Arc<QueryCache>,
        refresh_lead: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::loading());
        let state = Arc::new(state);
        let refresh = RefreshScheduler::new(Arc::clone(&api), tokens.clone(), refresh_lead)
            .with_listener(Arc::new({
                let state = Arc::clone(&state);
                move |event: RefreshEvent| apply_refresh(&state, event)
            }));
        Self {
            api,
            tokens,
            queries,
            refresh,
            state,
            bootstrap: OnceCell::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn queries(&self) -> &QueryCache {
        &self.queries
    }

    pub fn refresh(&self) -> &RefreshScheduler {
        &self.refresh
    }

    pub fn api(&self) -> Arc<dyn AuthApi> {
        Arc::clone(&self.api)
    }

    /// Run the status check once; later calls wait for the same check
    pub async fn start(&self) -> SessionState {
        self.bootstrap.get_or_init(|| self.check_status()).await;
        self.state()
    }

    async fn check_status(&self) {
        let api = &self.api;
        let result = self
            .queries
            .fetch(&STATUS_QUERY, QueryOptions::auth_status(), move || api.status())
            .await;

        let state = match result {
            Ok(status) => {
                if status.is_authenticated {
                    if let Some(token) = &status.access_token {
                        self.store_session_token(token, status.expires_in);
                    }
                }
                tracing::info!(
                    authenticated = status.is_authenticated,
                    user = ?status.user.as_ref().map(|u| u.id.as_str()),
                    "Session status resolved"
                );
                SessionState::from_status(status)
            }
            Err(e) => {
                tracing::error!(error = %e, "Session status check failed, treating as unauthenticated");
                SessionState::failed(e.inline_message())
            }
        };
        self.state.send_replace(state);
    }

    fn store_session_token(&self, token: &str, expires_in: Option<u64>) {
        let ttl = expires_in.map(Duration::from_secs);
        self.tokens.set(token, TokenKind::Session, ttl);
        if let Some(ttl) = ttl {
            self.refresh.schedule(ttl);
        }
    }

    /// Sign in with email and password; on success the caller reloads to `/`
    pub async fn login(&self, email: &str, password: &str) -> Result<Navigation, AuthError> {
        validation::validate_login(email, password)?;
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let response = self.api.login(&request).await?;

        if let Some(token) = &response.access_token {
            self.store_session_token(token, response.expires_in);
        }
        self.state.send_modify(|state| {
            state.access_token = response.access_token.clone();
            state.expires_in = response.expires_in;
        });
        tracing::info!(email = %request.email, "Logged in");
        Ok(Navigation::home())
    }

    /// Clear the token and every cached query; the caller reloads to `/`
    pub fn logout(&self) -> Navigation {
        self.refresh.cancel();
        self.tokens.clear();
        self.api.clear_local_state();
        self.queries.clear();
        self.state.send_modify(|state| {
            state.access_token = None;
            state.expires_in = None;
        });
        tracing::info!("Local session state cleared");
        Navigation::home()
    }

    /// End this device's server session, then clear local state regardless
    pub async fn sign_out(&self) -> Navigation {
        if let Err(e) = self.api.logout().await {
            tracing::warn!(error = %e, "Logout request failed");
        }
        self.logout()
    }

    /// End every server session of the user, then clear local state regardless
    pub async fn sign_out_everywhere(&self) -> Navigation {
        if let Err(e) = self.api.logout_all().await {
            tracing::warn!(error = %e, "Logout-all request failed");
        }
        self.logout()
    }

    pub fn password_reset(&self) -> PasswordResetFlow {
        PasswordResetFlow::new(self.api(), self.tokens.clone(), self.refresh.clone())
    }
}

/// Injected handle to the session
#[derive(Clone, Default)]
pub struct AuthContext {
    session: Option<Arc<AuthSession>>,
}

impl AuthContext {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// A context with no session behind it
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Result<&Arc<AuthSession>, AuthError> {
        self.session.as_ref().ok_or(AuthError::ContextUnavailable)
    }

    pub fn snapshot(&self) -> Result<SessionState, AuthError> {
        self.get().map(|session| session.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::{
        ForgotPasswordResponse, LoginResponse, ResetPasswordResponse, SuccessResponse,
        TokenResponse,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubApi {
        status: Result<AuthStatusResponse, u16>,
        status_calls: AtomicUsize,
        logout_fails: bool,
        /// `expires_in` of a refreshed token, or the failure status
        refresh_outcome: Result<u64, u16>,
        refresh_latency: Duration,
        refresh_calls: AtomicUsize,
    }

    impl StubApi {
        fn new(status: Result<AuthStatusResponse, u16>) -> Self {
            Self {
                status,
                status_calls: AtomicUsize::new(0),
                logout_fails: false,
                refresh_outcome: Ok(900),
                refresh_latency: Duration::ZERO,
                refresh_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthApi for StubApi {
        async fn status(&self) -> Result<AuthStatusResponse, AuthError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.status.clone().map_err(|status| AuthError::Server {
                status,
                message: "Internal Server Error".to_string(),
            })
        }
        async fn login(&self, _: &LoginRequest) -> Result<LoginResponse, AuthError> {
            Ok(LoginResponse {
                access_token: Some("fresh".to_string()),
                expires_in: Some(900),
                is_authenticated: Some(true),
            })
        }
        async fn logout(&self) -> Result<(), AuthError> {
            if self.logout_fails {
                Err(AuthError::Server {
                    status: 503,
                    message: "down".to_string(),
                })
            } else {
                Ok(())
            }
        }
        async fn logout_all(&self) -> Result<(), AuthError> {
            Ok(())
        }
        async fn forgot_password(&self, _: &str) -> Result<ForgotPasswordResponse, AuthError> {
            Err(AuthError::Rejected("unused".to_string()))
        }
        async fn resend_reset_otp(&self) -> Result<SuccessResponse, AuthError> {
            Err(AuthError::Rejected("unused".to_string()))
        }
        async fn verify_reset_otp(&self, _: &str) -> Result<SuccessResponse, AuthError> {
            Err(AuthError::Rejected("unused".to_string()))
        }
        async fn reset_password(&self, _: &str) -> Result<ResetPasswordResponse, AuthError> {
            Err(AuthError::Rejected("unused".to_string()))
        }
        async fn refresh(&self) -> Result<TokenResponse, AuthError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.refresh_latency).await;
            match self.refresh_outcome {
                Ok(expires_in) => Ok(TokenResponse {
                    access_token: "refreshed".to_string(),
                    expires_in,
                }),
                Err(status) => Err(AuthError::Server {
                    status,
                    message: "Refresh token expired".to_string(),
                }),
            }
        }
    }

    fn session(api: Arc<StubApi>) -> AuthSession {
        AuthSession::new(
            api,
            TokenStore::new(),
            Arc::new(QueryCache::new()),
            Duration::from_secs(60),
        )
    }

    fn authenticated() -> AuthStatusResponse {
        authenticated_for(900)
    }

    fn authenticated_for(expires_in: u64) -> AuthStatusResponse {
        AuthStatusResponse {
            is_authenticated: true,
            user: None,
            access_token: Some("abc".to_string()),
            expires_in: Some(expires_in),
        }
    }

    #[tokio::test]
    async fn test_status_checked_once() {
        let api = Arc::new(StubApi::new(Ok(authenticated())));
        let session = session(Arc::clone(&api));
        assert_eq!(session.state().phase(), SessionPhase::Loading);

        let (a, b) = tokio::join!(session.start(), session.start());
        assert_eq!(a, b);
        session.start().await;
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state().phase(), SessionPhase::Authenticated);
        assert_eq!(session.tokens().bearer().as_deref(), Some("abc"));
        assert!(session.refresh().is_scheduled());
    }

    #[tokio::test]
    async fn test_failed_status_is_unauthenticated() {
        let api = Arc::new(StubApi::new(Err(500)));
        let session = session(Arc::clone(&api));
        let state = session.start().await;
        assert_eq!(state.phase(), SessionPhase::Unauthenticated);
        assert_eq!(state.error.as_deref(), Some("Internal Server Error"));
        assert!(session.tokens().bearer().is_none());
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_queries() {
        let session = session(Arc::new(StubApi::new(Ok(authenticated()))));
        session.start().await;
        assert!(!session.queries().is_empty());

        let nav = session.logout();
        assert_eq!(nav.target(), "/");
        assert!(session.tokens().bearer().is_none());
        assert!(session.queries().is_empty());
        assert!(!session.refresh().is_scheduled());
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_server_fails() {
        let mut api = StubApi::new(Ok(authenticated()));
        api.logout_fails = true;
        let session = session(Arc::new(api));
        session.start().await;
        session.sign_out().await;
        assert!(session.tokens().bearer().is_none());
    }

    #[tokio::test]
    async fn test_login_validates_before_network() {
        let session = session(Arc::new(StubApi::new(Ok(AuthStatusResponse::default()))));
        let err = session.login("bad", "").await.unwrap_err();
        match err {
            AuthError::Validation(errors) => assert_eq!(errors.errors().len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(session.tokens().bearer().is_none());

        let nav = session.login("a@b.com", "pw").await.unwrap();
        assert_eq!(nav, Navigation::home());
        assert_eq!(session.tokens().bearer().as_deref(), Some("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_replaces_token() {
        let session = session(Arc::new(StubApi::new(Ok(authenticated()))));
        session.start().await;
        tokio::time::sleep(Duration::from_secs(841)).await;
        assert_eq!(session.tokens().bearer().as_deref(), Some("refreshed"));
        assert_eq!(session.state().access_token.as_deref(), Some("refreshed"));
        assert!(session.state().is_authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_lifetime_is_not_refreshed() {
        let api = Arc::new(StubApi::new(Ok(authenticated_for(0))));
        let session = session(Arc::clone(&api));
        session.start().await;

        assert_eq!(session.tokens().bearer().as_deref(), Some("abc"));
        assert!(!session.refresh().is_scheduled());
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshed_zero_lifetime_stops_refreshing() {
        let mut api = StubApi::new(Ok(authenticated()));
        api.refresh_outcome = Ok(0);
        let api = Arc::new(api);
        let session = session(Arc::clone(&api));
        session.start().await;

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.tokens().bearer().as_deref(), Some("refreshed"));
        assert!(!session.refresh().is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_clears_token_and_expires_session() {
        let mut api = StubApi::new(Ok(authenticated()));
        api.refresh_outcome = Err(401);
        let session = session(Arc::new(api));
        session.start().await;
        let mut updates = session.subscribe();
        updates.borrow_and_update();

        tokio::time::sleep(Duration::from_secs(841)).await;
        assert!(session.tokens().bearer().is_none());
        assert!(updates.has_changed().unwrap());

        let state = session.state();
        assert!(state.expired);
        assert_eq!(state.phase(), SessionPhase::Unauthenticated);
        assert_eq!(state.access_token, None);
        assert_eq!(state.error.as_deref(), Some("Refresh token expired"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_token_survives_in_flight_refresh() {
        let mut api = StubApi::new(Ok(authenticated()));
        api.refresh_latency = Duration::from_secs(10);
        let session = session(Arc::new(api));
        session.start().await;

        // refresh starts at 840s and returns at 850s
        tokio::time::sleep(Duration::from_secs(845)).await;
        session
            .tokens()
            .set("newer", TokenKind::Session, Some(Duration::from_secs(900)));
        tokio::time::sleep(Duration::from_secs(15)).await;

        assert_eq!(session.tokens().bearer().as_deref(), Some("newer"));
        assert_eq!(session.state().access_token.as_deref(), Some("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_token_survives_failed_in_flight_refresh() {
        let mut api = StubApi::new(Ok(authenticated()));
        api.refresh_outcome = Err(401);
        api.refresh_latency = Duration::from_secs(10);
        let session = session(Arc::new(api));
        session.start().await;

        tokio::time::sleep(Duration::from_secs(845)).await;
        session
            .tokens()
            .set("newer", TokenKind::Session, Some(Duration::from_secs(900)));
        tokio::time::sleep(Duration::from_secs(15)).await;

        assert_eq!(session.tokens().bearer().as_deref(), Some("newer"));
        assert!(!session.state().expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_during_refresh_stays_logged_out() {
        let mut api = StubApi::new(Ok(authenticated()));
        api.refresh_latency = Duration::from_secs(10);
        let api = Arc::new(api);
        let session = session(Arc::clone(&api));
        session.start().await;

        tokio::time::sleep(Duration::from_secs(845)).await;
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        session.logout();
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert!(session.tokens().bearer().is_none());
        assert_eq!(session.state().access_token, None);
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detached_context() {
        let context = AuthContext::detached();
        assert!(matches!(context.get(), Err(AuthError::ContextUnavailable)));
        assert!(matches!(context.snapshot(), Err(AuthError::ContextUnavailable)));
    }
}
