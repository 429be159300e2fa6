//! Remote Registry
//!
//! The list of micro-frontends the host knows about, with their manifest
//! URLs resolved from the page location and environment.
//!
//! - Local mode (a dev port is configured for the remote):
//!   `{protocol}://{host}:{port}/mf-manifest.json`
//! - Production mode: `{base}/{prod_path}/mf-manifest.json`, where `base` is
//!   `PUBLIC_MF_BASE_URL` or the page origin.

use std::collections::BTreeMap;

use crate::config::HostConfig;
use crate::error::RemoteError;

pub const AUTH_REMOTE: &str = "VrittiAuth";
pub const CLOUD_REMOTE: &str = "VrittiCloud";

const MANIFEST_FILE: &str = "mf-manifest.json";

/// A registered remote. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDescriptor {
    pub name: String,
    /// Resolved manifest URL
    pub entry_url: String,
    pub exposed_module: String,
}

/// Static definition of a remote before environment resolution
#[derive(Debug, Clone, Copy)]
pub struct RemoteSpec {
    pub name: &'static str,
    pub port_var: &'static str,
    pub prod_path: &'static str,
    pub exposed_module: &'static str,
}

/// All remotes the host loads
pub const ALL_REMOTES: &[RemoteSpec] = &[
    RemoteSpec {
        name: AUTH_REMOTE,
        port_var: "PUBLIC_AUTH_MF_PORT",
        prod_path: "auth-microfrontend",
        exposed_module: "routes",
    },
    RemoteSpec {
        name: CLOUD_REMOTE,
        port_var: "PUBLIC_CLOUD_MF_PORT",
        prod_path: "cloud-microfrontend",
        exposed_module: "routes",
    },
];

/// Build the manifest URL for one remote
pub fn build_remote_entry(config: &HostConfig, port: Option<u16>, prod_path: &str) -> String {
    let page = &config.page;
    match port {
        Some(port) => format!(
            "{}://{}:{}/{}",
            page.protocol, page.hostname, port, MANIFEST_FILE
        ),
        None => {
            let base = config
                .mf_base_url
                .clone()
                .unwrap_or_else(|| format!("{}://{}", page.protocol, page.hostname));
            format!("{}/{}/{}", base, prod_path.trim_matches('/'), MANIFEST_FILE)
        }
    }
}

/// Name-indexed set of remote descriptors
#[derive(Debug, Clone, Default)]
pub struct RemoteRegistry {
    remotes: BTreeMap<String, RemoteDescriptor>,
}

impl RemoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every entry of [`ALL_REMOTES`] against the configuration
    pub fn from_config(config: &HostConfig) -> Self {
        let mut registry = Self::new();
        for spec in ALL_REMOTES {
            let port = port_for(config, spec);
            let descriptor = RemoteDescriptor {
                name: spec.name.to_string(),
                entry_url: build_remote_entry(config, port, spec.prod_path),
                exposed_module: spec.exposed_module.to_string(),
            };
            tracing::debug!(
                remote = %descriptor.name,
                entry = %descriptor.entry_url,
                local = port.is_some(),
                "Resolved remote"
            );
            registry.insert(descriptor);
        }
        registry
    }

    /// Add or replace a descriptor
    pub fn insert(&mut self, descriptor: RemoteDescriptor) {
        self.remotes.insert(descriptor.name.clone(), descriptor);
    }

    pub fn resolve(&self, name: &str) -> Result<&RemoteDescriptor, RemoteError> {
        self.remotes
            .get(name)
            .ok_or_else(|| RemoteError::UnknownRemote(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteDescriptor> {
        self.remotes.values()
    }

    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }
}

fn port_for(config: &HostConfig, spec: &RemoteSpec) -> Option<u16> {
    match spec.port_var {
        "PUBLIC_AUTH_MF_PORT" => config.auth_mf_port,
        "PUBLIC_CLOUD_MF_PORT" => config.cloud_mf_port,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageLocation;

    fn config_at(url: &str) -> HostConfig {
        HostConfig::for_page(PageLocation::parse(url).unwrap())
    }

    #[test]
    fn test_local_port_uses_page_protocol_and_host() {
        let mut config = config_at("https://local.vrittiai.com:3012");
        config.auth_mf_port = Some(3001);

        let registry = RemoteRegistry::from_config(&config);
        let auth = registry.resolve(AUTH_REMOTE).unwrap();
        assert_eq!(
            auth.entry_url,
            "https://local.vrittiai.com:3001/mf-manifest.json"
        );
        assert_eq!(auth.exposed_module, "routes");
    }

    #[test]
    fn test_production_uses_base_url() {
        let mut config = config_at("https://cloud.vrittiai.com");
        config.mf_base_url = Some("https://mf.vrittiai.com".to_string());

        let registry = RemoteRegistry::from_config(&config);
        assert_eq!(
            registry.resolve(AUTH_REMOTE).unwrap().entry_url,
            "https://mf.vrittiai.com/auth-microfrontend/mf-manifest.json"
        );
        assert_eq!(
            registry.resolve(CLOUD_REMOTE).unwrap().entry_url,
            "https://mf.vrittiai.com/cloud-microfrontend/mf-manifest.json"
        );
    }

    #[test]
    fn test_production_defaults_to_page_origin() {
        let config = config_at("https://app.vrittiai.com/some/page");
        let registry = RemoteRegistry::from_config(&config);
        assert_eq!(
            registry.resolve(CLOUD_REMOTE).unwrap().entry_url,
            "https://app.vrittiai.com/cloud-microfrontend/mf-manifest.json"
        );
    }

    #[test]
    fn test_unknown_remote() {
        let registry = RemoteRegistry::from_config(&config_at("https://app.vrittiai.com"));
        assert_eq!(registry.len(), 2);
        assert!(matches!(
            registry.resolve("Nope"),
            Err(RemoteError::UnknownRemote(name)) if name == "Nope"
        ));
    }
}
