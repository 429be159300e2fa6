//! Remote Loader
//!
//! Memoizing, single-flight accessor for exposed remote modules.
//!
//! The cache maps `"{remote}/{module}"` to a shared load future. The first
//! caller for a key creates and inserts the future while holding the cache
//! lock, so concurrent callers always join the same in-flight load and a key
//! is fetched at most once per loader lifetime. Failures resolve to `None`
//! and stay cached: a broken remote is not retried within the session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::future::{BoxFuture, FutureExt, Shared};

use super::fetcher::RemoteFetcher;
use super::module::RemoteModule;
use super::registry::RemoteDescriptor;
use crate::error::RemoteError;

/// Settled result of a load; `None` is a cached failure
pub type LoadedModule = Option<Arc<RemoteModule>>;

type SharedLoad = Shared<BoxFuture<'static, LoadedModule>>;

pub struct RemoteLoader {
    fetcher: Arc<dyn RemoteFetcher>,
    remotes: RwLock<HashMap<String, RemoteDescriptor>>,
    cache: Mutex<HashMap<String, SharedLoad>>,
}

impl RemoteLoader {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self {
            fetcher,
            remotes: RwLock::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Make remotes loadable by name
    pub fn register_remotes<'a, I>(&self, remotes: I)
    where
        I: IntoIterator<Item = &'a RemoteDescriptor>,
    {
        let mut registered = self.remotes.write().unwrap_or_else(PoisonError::into_inner);
        for remote in remotes {
            tracing::info!(remote = %remote.name, entry = %remote.entry_url, "Registered remote");
            registered.insert(remote.name.clone(), remote.clone());
        }
    }

    pub fn is_registered(&self, remote: &str) -> bool {
        self.remotes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(remote)
    }

    pub fn cache_key(remote: &str, module: &str) -> String {
        format!("{remote}/{module}")
    }

    /// Load `module` from `remote`, at most once per key
    pub async fn load(&self, remote: &str, module: &str) -> LoadedModule {
        let key = Self::cache_key(remote, module);
        let shared = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            match cache.get(&key) {
                Some(existing) => {
                    tracing::debug!(key = %key, "Remote module cache hit");
                    existing.clone()
                }
                None => {
                    tracing::debug!(key = %key, "Remote module cache miss");
                    let fresh = self.start_load(remote, module, key.clone());
                    cache.insert(key, fresh.clone());
                    fresh
                }
            }
        };
        shared.await
    }

    /// Settled cache entry, without starting a load. `None` when absent or still in flight.
    pub fn peek(&self, remote: &str, module: &str) -> Option<LoadedModule> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .get(&Self::cache_key(remote, module))
            .and_then(|shared| shared.peek().cloned())
    }

    /// Number of keys ever requested
    pub fn cached_keys(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn start_load(&self, remote: &str, module: &str, key: String) -> SharedLoad {
        let descriptor = self
            .remotes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(remote)
            .cloned();
        let fetcher = Arc::clone(&self.fetcher);
        let remote = remote.to_string();
        let module = module.to_string();

        async move {
            let result = match descriptor {
                Some(descriptor) => fetcher
                    .fetch_module(&descriptor, &module)
                    .await
                    .and_then(|value| RemoteModule::from_value(&key, value)),
                None => Err(RemoteError::NotRegistered(remote)),
            };
            match result {
                Ok(loaded) => {
                    tracing::info!(key = %key, exports = ?loaded.exports(), "Loaded remote module");
                    Some(Arc::new(loaded))
                }
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Failed to load remote module");
                    None
                }
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remotes::StaticFetcher;
    use serde_json::json;

    fn descriptor(name: &str) -> RemoteDescriptor {
        RemoteDescriptor {
            name: name.to_string(),
            entry_url: format!("http://localhost/{name}/mf-manifest.json"),
            exposed_module: "routes".to_string(),
        }
    }

    #[tokio::test]
    async fn test_load_and_cache() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.insert("VrittiAuth", "routes", json!({ "authRoutes": [{ "path": "login" }] }));
        let loader = RemoteLoader::new(fetcher);
        loader.register_remotes([&descriptor("VrittiAuth")]);

        assert!(loader.peek("VrittiAuth", "routes").is_none());
        let module = loader.load("VrittiAuth", "routes").await.unwrap();
        assert_eq!(module.routes(Some("authRoutes")).len(), 1);
        assert!(matches!(loader.peek("VrittiAuth", "routes"), Some(Some(_))));
    }

    #[tokio::test]
    async fn test_unregistered_remote_is_cached_failure() {
        let loader = RemoteLoader::new(Arc::new(StaticFetcher::new()));
        assert!(loader.load("Ghost", "routes").await.is_none());
        assert!(matches!(loader.peek("Ghost", "routes"), Some(None)));
        assert_eq!(loader.cached_keys(), 1);
    }
}
