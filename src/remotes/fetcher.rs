//! Remote fetchers: the runtime that turns a descriptor into a module value.
//!
//! `RemoteFetcher` is the seam the loader depends on. Two implementations:
//! - [`ManifestFetcher`] reads the remote's federation manifest over HTTP and
//!   then fetches the exposed module's JSON document.
//! - [`StaticFetcher`] serves modules registered in-process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::registry::RemoteDescriptor;
use crate::error::RemoteError;

#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Fetch the raw value of `module` exposed by `remote`
    async fn fetch_module(&self, remote: &RemoteDescriptor, module: &str)
        -> Result<Value, RemoteError>;
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// The subset of `mf-manifest.json` the host reads
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationManifest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub meta_data: ManifestMeta,
    #[serde(default)]
    pub exposes: Vec<ExposedModule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMeta {
    #[serde(default)]
    pub public_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExposedModule {
    pub name: String,
    /// Expose path as declared by the remote, e.g. `./routes`
    #[serde(default)]
    pub path: Option<String>,
}

impl FederationManifest {
    pub fn find_expose(&self, module: &str) -> Option<&ExposedModule> {
        self.exposes.iter().find(|e| {
            e.name == module
                || e.path
                    .as_deref()
                    .map(|p| p.trim_start_matches("./") == module)
                    .unwrap_or(false)
        })
    }

    /// Directory module documents are served from
    pub fn module_base(&self, entry_url: &Url) -> Url {
        let public = self
            .meta_data
            .public_path
            .as_deref()
            .filter(|p| *p != "auto")
            .and_then(|p| Url::parse(&with_trailing_slash(p)).ok());
        match public {
            Some(url) => url,
            None => entry_url.join("./").unwrap_or_else(|_| entry_url.clone()),
        }
    }
}

fn with_trailing_slash(raw: &str) -> String {
    if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    }
}

// ---------------------------------------------------------------------------
// ManifestFetcher
// ---------------------------------------------------------------------------

type ManifestLoad = Result<Arc<FederationManifest>, Arc<RemoteError>>;

type SharedManifest = Shared<BoxFuture<'static, ManifestLoad>>;

/// HTTP fetcher. Each remote's manifest is fetched once and shared by all of
/// its modules, concurrent callers included. A failed manifest is dropped
/// once settled so a later module load can try again.
pub struct ManifestFetcher {
    http: Client,
    manifests: Mutex<HashMap<String, SharedManifest>>,
}

impl ManifestFetcher {
    pub fn new(timeout: Duration) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http))
    }

    pub fn with_client(http: Client) -> Self {
        Self {
            http,
            manifests: Mutex::new(HashMap::new()),
        }
    }

    async fn manifest(&self, remote: &RemoteDescriptor) -> Result<Arc<FederationManifest>, RemoteError> {
        let shared = {
            let mut manifests = self.manifests.lock().unwrap_or_else(PoisonError::into_inner);
            match manifests.get(&remote.name) {
                Some(existing) => existing.clone(),
                None => {
                    let fresh = fetch_manifest(self.http.clone(), remote.clone()).boxed().shared();
                    manifests.insert(remote.name.clone(), fresh.clone());
                    fresh
                }
            }
        };

        shared.await.map_err(|source| {
            let mut manifests = self.manifests.lock().unwrap_or_else(PoisonError::into_inner);
            let settled_failure = manifests
                .get(&remote.name)
                .is_some_and(|entry| matches!(entry.peek(), Some(Err(_))));
            if settled_failure {
                manifests.remove(&remote.name);
            }
            RemoteError::ManifestUnavailable {
                remote: remote.name.clone(),
                source,
            }
        })
    }
}

async fn fetch_manifest(http: Client, remote: RemoteDescriptor) -> ManifestLoad {
    tracing::debug!(remote = %remote.name, url = %remote.entry_url, "Fetching manifest");
    let raw: Value = get_json(&http, &remote.entry_url).await.map_err(Arc::new)?;
    let manifest: FederationManifest = serde_json::from_value(raw).map_err(|e| {
        Arc::new(RemoteError::Manifest {
            url: remote.entry_url.clone(),
            reason: e.to_string(),
        })
    })?;
    Ok(Arc::new(manifest))
}

async fn get_json<T: serde::de::DeserializeOwned>(http: &Client, url: &str) -> Result<T, RemoteError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RemoteError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.json::<T>().await?)
}

#[async_trait]
impl RemoteFetcher for ManifestFetcher {
    async fn fetch_module(
        &self,
        remote: &RemoteDescriptor,
        module: &str,
    ) -> Result<Value, RemoteError> {
        let entry_url = Url::parse(&remote.entry_url).map_err(|e| RemoteError::Manifest {
            url: remote.entry_url.clone(),
            reason: e.to_string(),
        })?;
        let manifest = self.manifest(remote).await?;
        let expose = manifest
            .find_expose(module)
            .ok_or_else(|| RemoteError::ExposeNotFound {
                remote: remote.name.clone(),
                module: module.to_string(),
            })?;

        let module_url = manifest
            .module_base(&entry_url)
            .join(&format!("{}.json", expose.name.trim_start_matches("./")))
            .map_err(|e| RemoteError::Manifest {
                url: remote.entry_url.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(remote = %remote.name, module, url = %module_url, "Fetching exposed module");
        get_json(&self.http, module_url.as_str()).await
    }
}

// ---------------------------------------------------------------------------
// StaticFetcher
// ---------------------------------------------------------------------------

/// In-process fetcher for modules bundled with the host
#[derive(Default)]
pub struct StaticFetcher {
    modules: RwLock<HashMap<String, Value>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, remote: &str, module: &str, value: Value) {
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(format!("{remote}/{module}"), value);
    }
}

#[async_trait]
impl RemoteFetcher for StaticFetcher {
    async fn fetch_module(
        &self,
        remote: &RemoteDescriptor,
        module: &str,
    ) -> Result<Value, RemoteError> {
        let key = format!("{}/{}", remote.name, module);
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .ok_or(RemoteError::NotFound(key))
    }
}
