//! Path matching shared by host tables and remote route arrays.
//!
//! Routes are tried in declaration order. Supported pattern segments are
//! static text (case-insensitive), `:name` captures and a trailing `*` splat.
//! An index route matches only an empty remainder. A parent with children
//! matches when one of its children matches, or when the parent consumed the
//! whole path.

use super::types::RouteParams;

/// Anything the matcher can walk
pub trait RouteNode: Sized {
    fn path(&self) -> Option<&str>;
    fn is_index(&self) -> bool;
    fn children(&self) -> &[Self];
}

/// Successful match: the route chain from the root down to the leaf
#[derive(Debug)]
pub struct RouteMatch<'a, N> {
    pub chain: Vec<&'a N>,
    pub params: RouteParams,
    /// Remainder captured by the deepest `*` segment
    pub splat: Option<String>,
}

impl<'a, N> RouteMatch<'a, N> {
    pub fn leaf(&self) -> Option<&'a N> {
        self.chain.last().copied()
    }
}

/// Split a path into non-empty segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn match_routes<'a, N: RouteNode>(
    routes: &'a [N],
    path: &str,
    skip: &dyn Fn(&N) -> bool,
) -> Option<RouteMatch<'a, N>> {
    let segs = segments(path);
    let mut found = match_level(routes, &segs, skip)?;
    found.chain.reverse();
    Some(found)
}

struct Consumed<'p> {
    rest: Vec<&'p str>,
    params: RouteParams,
    splat: Option<String>,
}

// Builds the chain leaf-first; `match_routes` reverses it once at the end.
fn match_level<'a, N: RouteNode>(
    routes: &'a [N],
    remaining: &[&str],
    skip: &dyn Fn(&N) -> bool,
) -> Option<RouteMatch<'a, N>> {
    for route in routes {
        if skip(route) {
            continue;
        }

        if route.is_index() {
            if remaining.is_empty() {
                return Some(RouteMatch {
                    chain: vec![route],
                    params: RouteParams::new(),
                    splat: None,
                });
            }
            continue;
        }

        let pattern = segments(route.path().unwrap_or(""));
        let Some(consumed) = consume(&pattern, remaining) else {
            continue;
        };

        if !route.children().is_empty() {
            if let Some(mut child) = match_level(route.children(), &consumed.rest, skip) {
                let mut params = consumed.params;
                params.append(&mut child.params);
                child.params = params;
                if child.splat.is_none() {
                    child.splat = consumed.splat;
                }
                child.chain.push(route);
                return Some(child);
            }
        }

        // A splat leaf swallows the remainder; a splat parent whose children
        // did not match still owns it.
        if consumed.rest.is_empty() || consumed.splat.is_some() {
            return Some(RouteMatch {
                chain: vec![route],
                params: consumed.params,
                splat: consumed.splat,
            });
        }
    }
    None
}

fn consume<'p>(pattern: &[&str], remaining: &[&'p str]) -> Option<Consumed<'p>> {
    let mut params = RouteParams::new();
    for (i, seg) in pattern.iter().enumerate() {
        if *seg == "*" {
            let rest: Vec<&str> = remaining.get(i..).map(<[_]>::to_vec).unwrap_or_default();
            return Some(Consumed {
                splat: Some(rest.join("/")),
                rest,
                params,
            });
        }
        let actual = remaining.get(i)?;
        if let Some(name) = seg.strip_prefix(':') {
            params.insert(name.to_string(), (*actual).to_string());
        } else if !seg.eq_ignore_ascii_case(actual) {
            return None;
        }
    }
    Some(Consumed {
        rest: remaining.get(pattern.len()..).map(<[_]>::to_vec).unwrap_or_default(),
        params,
        splat: None,
    })
}
