//! Path resolution against a composed table
//!
//! Produces what the router would display for a location: layouts, the leaf
//! view and the metadata of the deepest route that carries any. Redirects are
//! followed; a remote mount whose table has no match for the location falls
//! through to the rest of the host table.

use futures::FutureExt;

use super::composer::RemoteView;
use super::matcher;
use super::types::{HostElement, HostRoute, RouteMetadata, RouteParams, RouterTable};
use crate::error::RouteError;

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 8;

/// Leaf content of a rendered location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Full-page loading placeholder
    Placeholder,
    Page(String),
    /// Route served by a remote; `element` is the remote's component id
    RemotePage {
        remote: String,
        element: Option<String>,
    },
    /// Inline, non-fatal remote failure
    RemoteError(String),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Final location after redirects
    pub path: String,
    pub layouts: Vec<String>,
    pub view: View,
    pub metadata: Option<RouteMetadata>,
    pub params: RouteParams,
}

impl Rendered {
    pub fn placeholder(path: &str) -> Self {
        Self {
            path: path.to_string(),
            layouts: Vec::new(),
            view: View::Placeholder,
            metadata: None,
            params: RouteParams::new(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.title.as_deref())
    }
}

/// How remote mounts are treated during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Kick off loads and report the current view
    Snapshot,
    /// Wait for every visited remote to settle
    Settle,
}

enum Step {
    Done(Rendered),
    Redirect(String),
}

/// Non-blocking resolution; pending remotes render as the placeholder
pub fn render(table: &RouterTable, path: &str) -> Result<Rendered, RouteError> {
    resolve(table, path, Mode::Snapshot)
        .now_or_never()
        .unwrap_or_else(|| Ok(Rendered::placeholder(path)))
}

pub async fn resolve(table: &RouterTable, path: &str, mode: Mode) -> Result<Rendered, RouteError> {
    let mut current = normalize(path);
    for _ in 0..=MAX_REDIRECTS {
        match resolve_once(table, &current, mode).await {
            Step::Done(rendered) => return Ok(rendered),
            Step::Redirect(to) => {
                tracing::debug!(from = %current, to = %to, "Following redirect");
                current = normalize(&to);
            }
        }
    }
    Err(RouteError::RedirectLoop {
        path: path.to_string(),
        hops: MAX_REDIRECTS,
    })
}

async fn resolve_once(table: &RouterTable, path: &str, mode: Mode) -> Step {
    let mut excluded: Vec<usize> = Vec::new();
    loop {
        let Some(found) = table.match_path(path, &excluded) else {
            return Step::Done(done(path, Vec::new(), View::NotFound, None, RouteParams::new()));
        };
        let Some(leaf) = found.leaf() else {
            return Step::Done(done(path, Vec::new(), View::NotFound, None, RouteParams::new()));
        };

        let parents = &found.chain[..found.chain.len() - 1];
        let layouts = layout_names(parents);
        let metadata = found.chain.iter().rev().find_map(|r| r.metadata.clone());

        let remote = match &leaf.element {
            HostElement::Redirect { to } => return Step::Redirect(to.clone()),
            HostElement::Page(name) | HostElement::Layout(name) => {
                return Step::Done(done(
                    path,
                    layouts,
                    View::Page(name.clone()),
                    metadata,
                    found.params,
                ))
            }
            HostElement::Remote(remote) => remote,
        };

        let view = match mode {
            Mode::Snapshot => {
                remote.ensure_started();
                remote.view()
            }
            Mode::Settle => remote.wait_settled().await,
        };

        let routes = match view {
            RemoteView::Idle | RemoteView::Loading => {
                return Step::Done(done(path, layouts, View::Placeholder, metadata, found.params))
            }
            RemoteView::Failed(message) => {
                return Step::Done(done(
                    path,
                    layouts,
                    View::RemoteError(message),
                    metadata,
                    found.params,
                ))
            }
            RemoteView::Ready(routes) => routes,
        };

        // Splat mounts hand the remainder to the remote; exact mounts the whole path.
        let remote_path = if leaf.is_splat() {
            found.splat.clone().unwrap_or_default()
        } else {
            path.to_string()
        };

        let Some(remote_match) = matcher::match_routes(routes.as_slice(), &remote_path, &|_| false)
        else {
            tracing::debug!(path, route = leaf.id, "Remote has no match, falling through");
            excluded.push(leaf.id);
            continue;
        };
        let Some(remote_leaf) = remote_match.leaf() else {
            excluded.push(leaf.id);
            continue;
        };

        if let Some(to) = &remote_leaf.redirect {
            let base = mount_base(path, &remote_path, leaf.is_splat());
            return Step::Redirect(join_location(&base, to));
        }

        let mut layouts = layouts;
        layouts.extend(
            remote_match.chain[..remote_match.chain.len() - 1]
                .iter()
                .filter_map(|r| r.element.clone()),
        );
        let metadata = remote_match
            .chain
            .iter()
            .rev()
            .find_map(|r| r.metadata.clone())
            .or(metadata);
        let mut params = found.params;
        params.extend(remote_match.params);

        return Step::Done(done(
            path,
            layouts,
            View::RemotePage {
                remote: remote.target().remote_name,
                element: remote_leaf.element.clone(),
            },
            metadata,
            params,
        ));
    }
}

fn done(
    path: &str,
    layouts: Vec<String>,
    view: View,
    metadata: Option<RouteMetadata>,
    params: RouteParams,
) -> Rendered {
    Rendered {
        path: path.to_string(),
        layouts,
        view,
        metadata,
        params,
    }
}

fn layout_names(routes: &[&HostRoute]) -> Vec<String> {
    routes
        .iter()
        .filter_map(|r| match &r.element {
            HostElement::Layout(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// `/a//b/` -> `/a/b`
pub fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    format!("/{}", matcher::segments(path).join("/"))
}

fn mount_base(path: &str, remote_path: &str, splat: bool) -> String {
    if splat && !remote_path.is_empty() {
        path.strip_suffix(remote_path)
            .unwrap_or(path)
            .to_string()
    } else if splat {
        path.to_string()
    } else {
        "/".to_string()
    }
}

fn join_location(base: &str, to: &str) -> String {
    if to.starts_with('/') {
        to.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("dashboard/"), "/dashboard");
        assert_eq!(normalize("/account//profile?tab=1"), "/account/profile");
    }

    #[test]
    fn test_join_location() {
        assert_eq!(join_location("/account/", "profile"), "/account/profile");
        assert_eq!(join_location("/account", "/login"), "/login");
        assert_eq!(mount_base("/account/old", "old", true), "/account/");
        assert_eq!(mount_base("/login", "/login", false), "/");
    }
}
