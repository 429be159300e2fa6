//! Route Types
//!
//! Input entries (what the host declares), the serde shape of routes a remote
//! publishes, and the composed table handed to the router.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::composer::RemoteRoutes;
use super::matcher::{self, RouteMatch, RouteNode};

/// Route metadata for auth, navigation and document titles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_auth: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breadcrumb: Option<String>,
}

impl RouteMetadata {
    pub fn titled(title: &str, requires_auth: bool) -> Self {
        Self {
            title: Some(title.to_string()),
            requires_auth: Some(requires_auth),
            ..Self::default()
        }
    }
}

/// A route as published by a remote's exposed module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub index: bool,
    /// Component identifier rendered for this route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    /// Navigate target, for redirect-only routes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RouteDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RouteMetadata>,
}

impl RouteNode for RouteDef {
    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn is_index(&self) -> bool {
        self.index
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

/// Which remote module (and which table inside it) backs a route
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteTarget {
    pub remote_name: String,
    pub module_name: String,
    /// Named export holding the route array; `None` means the module is the array
    pub data_key: Option<String>,
}

impl RemoteTarget {
    pub fn new(remote_name: &str, module_name: &str, data_key: Option<&str>) -> Self {
        Self {
            remote_name: remote_name.to_string(),
            module_name: module_name.to_string(),
            data_key: data_key.map(str::to_string),
        }
    }

    /// Loader cache key, `"{remoteName}/{moduleName}"`
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.remote_name, self.module_name)
    }
}

/// Handler of a route known at build time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalHandler {
    /// Wraps child routes
    Layout(String),
    Page(String),
    Redirect { to: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRouteEntry {
    pub path: Option<String>,
    pub index: bool,
    pub handler: LocalHandler,
    pub children: Vec<RouteEntry>,
    pub metadata: Option<RouteMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRouteEntry {
    pub path: String,
    pub target: RemoteTarget,
    pub metadata: Option<RouteMetadata>,
}

/// A route declared by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEntry {
    Local(LocalRouteEntry),
    Remote(RemoteRouteEntry),
}

impl RouteEntry {
    pub fn layout(path: &str, name: &str, children: Vec<RouteEntry>) -> Self {
        RouteEntry::Local(LocalRouteEntry {
            path: Some(path.to_string()),
            index: false,
            handler: LocalHandler::Layout(name.to_string()),
            children,
            metadata: None,
        })
    }

    pub fn page(path: &str, name: &str) -> Self {
        RouteEntry::Local(LocalRouteEntry {
            path: Some(path.to_string()),
            index: false,
            handler: LocalHandler::Page(name.to_string()),
            children: Vec::new(),
            metadata: None,
        })
    }

    pub fn redirect(path: &str, to: &str) -> Self {
        RouteEntry::Local(LocalRouteEntry {
            path: Some(path.to_string()),
            index: false,
            handler: LocalHandler::Redirect { to: to.to_string() },
            children: Vec::new(),
            metadata: None,
        })
    }

    pub fn index_redirect(to: &str) -> Self {
        RouteEntry::Local(LocalRouteEntry {
            path: None,
            index: true,
            handler: LocalHandler::Redirect { to: to.to_string() },
            children: Vec::new(),
            metadata: None,
        })
    }

    pub fn remote(path: &str, target: RemoteTarget, metadata: Option<RouteMetadata>) -> Self {
        RouteEntry::Remote(RemoteRouteEntry {
            path: path.to_string(),
            target,
            metadata,
        })
    }

    pub fn with_metadata(mut self, metadata: RouteMetadata) -> Self {
        match &mut self {
            RouteEntry::Local(local) => local.metadata = Some(metadata),
            RouteEntry::Remote(remote) => remote.metadata = Some(metadata),
        }
        self
    }
}

/// Rendered element of a composed route
#[derive(Debug, Clone)]
pub enum HostElement {
    Layout(String),
    Page(String),
    Redirect { to: String },
    Remote(RemoteRoutes),
}

/// A composed route. `id` is unique within its table.
#[derive(Debug, Clone)]
pub struct HostRoute {
    pub id: usize,
    pub path: Option<String>,
    pub index: bool,
    pub element: HostElement,
    pub children: Vec<HostRoute>,
    pub metadata: Option<RouteMetadata>,
}

impl HostRoute {
    /// Whether the route's own pattern ends in a splat
    pub fn is_splat(&self) -> bool {
        self.path
            .as_deref()
            .map(|p| p.trim_end_matches('/').ends_with('*'))
            .unwrap_or(false)
    }
}

impl RouteNode for HostRoute {
    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn is_index(&self) -> bool {
        self.index
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

/// The route table handed to the router
#[derive(Debug, Clone, Default)]
pub struct RouterTable {
    routes: Vec<HostRoute>,
}

impl RouterTable {
    pub fn new(routes: Vec<HostRoute>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[HostRoute] {
        &self.routes
    }

    /// Match `path`, ignoring the routes whose ids are in `excluded`
    pub fn match_path(&self, path: &str, excluded: &[usize]) -> Option<RouteMatch<'_, HostRoute>> {
        matcher::match_routes(&self.routes, path, &|route: &HostRoute| {
            excluded.contains(&route.id)
        })
    }

    /// Every remote mount in the table, depth first
    pub fn remote_mounts(&self) -> Vec<&HostRoute> {
        fn walk<'a>(routes: &'a [HostRoute], out: &mut Vec<&'a HostRoute>) {
            for route in routes {
                if matches!(route.element, HostElement::Remote(_)) {
                    out.push(route);
                }
                walk(&route.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.routes, &mut out);
        out
    }

    /// One line per route, indented by depth
    pub fn describe(&self) -> Vec<String> {
        fn walk(routes: &[HostRoute], depth: usize, out: &mut Vec<String>) {
            for route in routes {
                let pattern = if route.index {
                    "(index)".to_string()
                } else {
                    route.path.clone().unwrap_or_default()
                };
                let element = match &route.element {
                    HostElement::Layout(name) => format!("layout {name}"),
                    HostElement::Page(name) => format!("page {name}"),
                    HostElement::Redirect { to } => format!("redirect -> {to}"),
                    HostElement::Remote(remote) => {
                        let target = remote.target();
                        match &target.data_key {
                            Some(key) => format!("remote {}[{}]", target.cache_key(), key),
                            None => format!("remote {}", target.cache_key()),
                        }
                    }
                };
                out.push(format!("{}{} => {}", "  ".repeat(depth), pattern, element));
                walk(&route.children, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.routes, 0, &mut out);
        out
    }
}

/// Path parameters captured by `:name` segments
pub type RouteParams = BTreeMap<String, String>;
