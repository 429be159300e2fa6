//! In-memory access token and its refresh timer
//!
//! The token lives only in process memory. Every HTTP call reads it from the
//! shared [`TokenStore`]; each `set`/`clear` bumps a generation so that an
//! in-flight refresh can tell whether the token it replaces is still current.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::client::AuthApi;

/// What a bearer token authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Normal login session
    Session,
    /// Short-lived password-reset session
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub kind: TokenKind,
    pub expires_in: Option<Duration>,
    pub issued_at: Instant,
}

impl AccessToken {
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_in.map(|ttl| self.issued_at + ttl)
    }
}

#[derive(Debug, Default)]
struct TokenSlot {
    token: Option<AccessToken>,
    generation: u64,
}

/// Shared in-memory token; clones see the same slot
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    slot: Arc<RwLock<TokenSlot>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a token, returning the new generation
    pub fn set(&self, value: &str, kind: TokenKind, expires_in: Option<Duration>) -> u64 {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        slot.token = Some(AccessToken {
            value: value.to_string(),
            kind,
            expires_in,
            issued_at: Instant::now(),
        });
        tracing::debug!(?kind, generation = slot.generation, "Access token stored");
        slot.generation
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        if slot.token.take().is_some() {
            tracing::debug!(generation = slot.generation, "Access token cleared");
        }
    }

    pub fn get(&self) -> Option<AccessToken> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    /// Raw token value for the `Authorization: Bearer` header
    pub fn bearer(&self) -> Option<String> {
        self.get().map(|t| t.value)
    }

    pub fn kind(&self) -> Option<TokenKind> {
        self.get().map(|t| t.kind)
    }

    pub fn generation(&self) -> u64 {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }
}

/// Shortest wait between two refreshes
pub const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Delay before refreshing a token that expires in `expires_in`.
///
/// Fires `lead` before expiry; tokens that live no longer than `lead` are
/// refreshed halfway through their lifetime. Never shorter than
/// [`MIN_REFRESH_DELAY`].
pub fn refresh_delay(expires_in: Duration, lead: Duration) -> Duration {
    let delay = if expires_in > lead {
        expires_in - lead
    } else {
        expires_in / 2
    };
    delay.max(MIN_REFRESH_DELAY)
}

/// Outcome of a background refresh for the current token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    Refreshed { access_token: String, expires_in: u64 },
    /// The refresh failed and the token was cleared; a reload is required
    Expired { reason: String },
}

pub type RefreshListener = Arc<dyn Fn(RefreshEvent) + Send + Sync>;

/// Owns the single pending refresh task
#[derive(Clone)]
pub struct RefreshScheduler {
    api: Arc<dyn AuthApi>,
    tokens: TokenStore,
    lead: Duration,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    listener: Option<RefreshListener>,
}

impl RefreshScheduler {
    pub fn new(api: Arc<dyn AuthApi>, tokens: TokenStore, lead: Duration) -> Self {
        Self {
            api,
            tokens,
            lead,
            task: Arc::new(Mutex::new(None)),
            listener: None,
        }
    }

    /// Notify `listener` of refreshes and expiry of the current token
    pub fn with_listener(mut self, listener: RefreshListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Replace any pending refresh with one for a token expiring in `expires_in`.
    /// A zero lifetime schedules nothing.
    pub fn schedule(&self, expires_in: Duration) {
        if expires_in.is_zero() {
            tracing::warn!("Token reported no lifetime, refresh not scheduled");
            self.cancel();
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No runtime, token refresh not scheduled");
            return;
        };
        let delay = refresh_delay(expires_in, self.lead);
        tracing::debug!(?expires_in, ?delay, "Scheduling token refresh");

        let handle = runtime.spawn(refresh_loop(
            Arc::clone(&self.api),
            self.tokens.clone(),
            self.lead,
            expires_in,
            self.listener.clone(),
        ));
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.take() {
            previous.abort();
            tracing::debug!("Token refresh cancelled");
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }
}

async fn refresh_loop(
    api: Arc<dyn AuthApi>,
    tokens: TokenStore,
    lead: Duration,
    mut expires_in: Duration,
    listener: Option<RefreshListener>,
) {
    let notify = |event: RefreshEvent| {
        if let Some(listener) = &listener {
            listener(event);
        }
    };

    loop {
        tokio::time::sleep(refresh_delay(expires_in, lead)).await;
        let generation = tokens.generation();

        match api.refresh().await {
            Ok(refreshed) => {
                if !tokens.is_current(generation) {
                    tracing::debug!("Token changed during refresh, dropping result");
                    return;
                }
                expires_in = Duration::from_secs(refreshed.expires_in);
                let ttl = (!expires_in.is_zero()).then_some(expires_in);
                tokens.set(&refreshed.access_token, TokenKind::Session, ttl);
                tracing::info!(expires_in = refreshed.expires_in, "Access token refreshed");
                notify(RefreshEvent::Refreshed {
                    access_token: refreshed.access_token,
                    expires_in: refreshed.expires_in,
                });
                if ttl.is_none() {
                    tracing::warn!("Refreshed token reported no lifetime, refresh stopped");
                    return;
                }
            }
            Err(e) if tokens.is_current(generation) => {
                tracing::warn!(error = %e, "Token refresh failed, clearing token");
                tokens.clear();
                notify(RefreshEvent::Expired {
                    reason: e.inline_message(),
                });
                return;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Token changed during failed refresh, keeping it");
                return;
            }
        }
    }
}
