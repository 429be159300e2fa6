//! Route Composer
//!
//! Turns declared [`RouteEntry`] trees into a [`RouterTable`]. Local entries
//! map one-to-one; each remote entry becomes a [`RemoteRoutes`] view that
//! loads its module lazily on first visit and publishes its state through a
//! watch channel:
//!
//! ```text
//! Idle --first visit--> Loading --load ok + min display--> Ready(routes)
//!                          \-----load failed-------------> Failed(message)
//! ```
//!
//! Retargeting a view bumps its generation; results from an older
//! generation, or for a view that has been dropped, are discarded.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;

use super::types::{
    HostElement, HostRoute, LocalHandler, RemoteTarget, RouteDef, RouteEntry, RouterTable,
};
use crate::remotes::RemoteLoader;

/// Inline message shown when a remote cannot be loaded
pub const REMOTE_LOAD_FAILED: &str =
    "Failed to load remote module. Please check if the microfrontend is running.";

/// State of one remote mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteView {
    /// Not visited yet
    Idle,
    /// Full-page placeholder
    Loading,
    Ready(Arc<Vec<RouteDef>>),
    Failed(String),
}

impl RemoteView {
    pub fn is_settled(&self) -> bool {
        matches!(self, RemoteView::Ready(_) | RemoteView::Failed(_))
    }
}

struct LoadState {
    target: RemoteTarget,
    generation: u64,
    started: bool,
}

struct RemoteRoutesInner {
    loader: Arc<RemoteLoader>,
    min_display: Duration,
    state: Mutex<LoadState>,
    view: watch::Sender<RemoteView>,
}

impl RemoteRoutesInner {
    fn publish(&self, generation: u64, view: RemoteView) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
            tracing::debug!(
                key = %state.target.cache_key(),
                stale = generation,
                current = state.generation,
                "Discarding stale remote result"
            );
            return;
        }
        self.view.send_replace(view);
    }
}

/// Handle to a remote mount; clones share the same view
#[derive(Clone)]
pub struct RemoteRoutes {
    inner: Arc<RemoteRoutesInner>,
}

impl std::fmt::Debug for RemoteRoutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRoutes")
            .field("target", &self.target())
            .field("view", &self.view())
            .finish()
    }
}

impl RemoteRoutes {
    pub fn new(loader: Arc<RemoteLoader>, target: RemoteTarget, min_display: Duration) -> Self {
        let (view, _) = watch::channel(RemoteView::Idle);
        Self {
            inner: Arc::new(RemoteRoutesInner {
                loader,
                min_display,
                state: Mutex::new(LoadState {
                    target,
                    generation: 0,
                    started: false,
                }),
                view,
            }),
        }
    }

    pub fn target(&self) -> RemoteTarget {
        self.lock_state().target.clone()
    }

    pub fn view(&self) -> RemoteView {
        self.inner.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RemoteView> {
        self.inner.view.subscribe()
    }

    /// Start loading if this generation has not started yet. Needs a Tokio runtime.
    pub fn ensure_started(&self) {
        let (generation, target) = {
            let mut state = self.lock_state();
            if state.started {
                return;
            }
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                tracing::warn!(key = %state.target.cache_key(), "No runtime, remote load deferred");
                return;
            };
            state.started = true;
            self.inner.view.send_replace(RemoteView::Loading);

            let generation = state.generation;
            let target = state.target.clone();
            let weak = Arc::downgrade(&self.inner);
            let loader = Arc::clone(&self.inner.loader);
            let min_display = self.inner.min_display;
            runtime.spawn(load_view(weak, loader, target.clone(), generation, min_display));
            (generation, target)
        };
        tracing::debug!(key = %target.cache_key(), generation, "Remote routes loading");
    }

    /// Point the view at a different remote, module or export
    pub fn retarget(&self, target: RemoteTarget) {
        let mut state = self.lock_state();
        if state.target == target {
            return;
        }
        state.target = target;
        state.generation += 1;
        state.started = false;
        self.inner.view.send_replace(RemoteView::Idle);
    }

    /// Start loading if needed and wait until the view is `Ready` or `Failed`
    pub async fn wait_settled(&self) -> RemoteView {
        self.ensure_started();
        let mut rx = self.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if current.is_settled() {
                return current;
            }
            if current == RemoteView::Idle {
                // retargeted while waiting
                self.ensure_started();
            }
            if rx.changed().await.is_err() {
                return current;
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LoadState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn load_view(
    weak: Weak<RemoteRoutesInner>,
    loader: Arc<RemoteLoader>,
    target: RemoteTarget,
    generation: u64,
    min_display: Duration,
) {
    let loaded = loader.load(&target.remote_name, &target.module_name).await;
    let view = match loaded {
        Some(module) => {
            let routes = module.routes(target.data_key.as_deref());
            if routes.is_empty() {
                tracing::debug!(key = %target.cache_key(), data_key = ?target.data_key, "No routes for export");
            }
            // Keep the placeholder up briefly so fast loads do not flicker.
            tokio::time::sleep(min_display).await;
            RemoteView::Ready(Arc::new(routes))
        }
        None => RemoteView::Failed(REMOTE_LOAD_FAILED.to_string()),
    };

    match weak.upgrade() {
        Some(inner) => inner.publish(generation, view),
        None => tracing::debug!(key = %target.cache_key(), "Remote view dropped before load finished"),
    }
}

/// Builds router tables from declared entries
pub struct RouteComposer {
    loader: Arc<RemoteLoader>,
    min_display: Duration,
}

impl RouteComposer {
    pub fn new(loader: Arc<RemoteLoader>, min_display: Duration) -> Self {
        Self {
            loader,
            min_display,
        }
    }

    pub fn compose(&self, entries: &[RouteEntry]) -> RouterTable {
        let mut next_id = 0;
        RouterTable::new(self.compose_level(entries, &mut next_id))
    }

    fn compose_level(&self, entries: &[RouteEntry], next_id: &mut usize) -> Vec<HostRoute> {
        entries
            .iter()
            .map(|entry| {
                let id = *next_id;
                *next_id += 1;
                match entry {
                    RouteEntry::Local(local) => HostRoute {
                        id,
                        path: local.path.clone(),
                        index: local.index,
                        element: match &local.handler {
                            LocalHandler::Layout(name) => HostElement::Layout(name.clone()),
                            LocalHandler::Page(name) => HostElement::Page(name.clone()),
                            LocalHandler::Redirect { to } => HostElement::Redirect { to: to.clone() },
                        },
                        children: self.compose_level(&local.children, next_id),
                        metadata: local.metadata.clone(),
                    },
                    RouteEntry::Remote(remote) => HostRoute {
                        id,
                        path: Some(remote.path.clone()),
                        index: false,
                        element: HostElement::Remote(RemoteRoutes::new(
                            Arc::clone(&self.loader),
                            remote.target.clone(),
                            self.min_display,
                        )),
                        children: Vec::new(),
                        metadata: remote.metadata.clone(),
                    },
                }
            })
            .collect()
    }
}
