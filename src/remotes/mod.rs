//! Remote micro-frontends: where they live, how they are fetched, and the
//! session-wide module cache.

pub mod fetcher;
pub mod loader;
pub mod module;
pub mod registry;

pub use fetcher::{FederationManifest, ManifestFetcher, RemoteFetcher, StaticFetcher};
pub use loader::{LoadedModule, RemoteLoader};
pub use module::{unwrap_default_export, RemoteModule};
pub use registry::{
    build_remote_entry, RemoteDescriptor, RemoteRegistry, ALL_REMOTES, AUTH_REMOTE, CLOUD_REMOTE,
};
