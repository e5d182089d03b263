//! Route table and path matching.
//!
//! Routes form a tree. Child paths are relative to their parent (`/admin` + `users` is
//! `/admin/users`) and inherit the parent's [`RouteMeta`]. Segments starting with `:` capture a
//! path parameter.

use std::collections::BTreeMap;

use crate::auth::guard::RouteMeta;
use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
pub struct RouteRecord {
    pub path: &'static str,
    pub name: &'static str,
    pub meta: RouteMeta,
    pub children: Vec<RouteRecord>,
}

impl RouteRecord {
    pub fn new(path: &'static str, name: &'static str, meta: RouteMeta) -> Self {
        Self {
            path,
            name,
            meta,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<RouteRecord>) -> Self {
        self.children = children;
        self
    }
}

/// A path matched against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Normalized path: no query, no fragment, no trailing slash
    pub path: String,
    pub name: &'static str,
    pub params: BTreeMap<String, String>,
    /// Union of the matched route's flags and all its ancestors'
    pub meta: RouteMeta,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteRecord>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteRecord>) -> Self {
        Self { routes }
    }

    /// The DQ console's routes.
    pub fn default_routes() -> Self {
        use RouteMeta as M;

        Self::new(vec![
            RouteRecord::new("/", "home", M::AUTHENTICATED),
            RouteRecord::new("/login", "login", M::GUEST_ONLY),
            RouteRecord::new("/register", "register", M::GUEST_ONLY),
            RouteRecord::new("/about", "about", M::PUBLIC),
            RouteRecord::new("/data-sources", "data-sources", M::AUTHENTICATED),
            RouteRecord::new("/data-sources/create", "data-source-create", M::AUTHENTICATED),
            RouteRecord::new("/inspection-rules", "inspection-rules", M::AUTHENTICATED),
            RouteRecord::new("/inspection-rules/create", "inspection-rule-create", M::AUTHENTICATED),
            RouteRecord::new("/inspection-rules/:id/edit", "inspection-rule-edit", M::AUTHENTICATED),
            RouteRecord::new("/inspection-tasks", "inspection-tasks", M::AUTHENTICATED),
            RouteRecord::new("/projects", "projects", M::AUTHENTICATED),
            RouteRecord::new("/projects/create", "project-create", M::AUTHENTICATED),
            RouteRecord::new("/projects/:id/edit", "project-edit", M::AUTHENTICATED),
            RouteRecord::new("/admin", "admin", M::SYSTEM_ADMIN)
                .with_children(vec![RouteRecord::new("users", "admin-users", M::PUBLIC)]),
        ])
    }

    /// Match `path` against the table. Records are tried in declaration order, children before
    /// their parent.
    pub fn resolve(&self, path: &str) -> Result<ResolvedRoute> {
        let segments = segments(path);

        self.routes
            .iter()
            .find_map(|record| match_record(record, &segments, RouteMeta::PUBLIC, BTreeMap::new()))
            .map(|(name, meta, params)| ResolvedRoute {
                path: format!("/{}", segments.join("/")),
                name,
                params,
                meta,
            })
            .ok_or_else(|| Error::NotFound {
                resource: "Route".to_string(),
                id: path.to_string(),
            })
    }
}

/// Non-empty path segments, ignoring query string and fragment.
fn segments(path: &str) -> Vec<&str> {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    path[..end].split('/').filter(|s| !s.is_empty()).collect()
}

type Match = (&'static str, RouteMeta, BTreeMap<String, String>);

fn match_record(record: &RouteRecord, remaining: &[&str], inherited: RouteMeta, mut params: BTreeMap<String, String>) -> Option<Match> {
    let pattern = segments(record.path);
    if pattern.len() > remaining.len() {
        return None;
    }

    for (expected, actual) in pattern.iter().zip(remaining) {
        if let Some(name) = expected.strip_prefix(':') {
            params.insert(name.to_string(), (*actual).to_string());
        } else if expected != actual {
            return None;
        }
    }

    let meta = inherited.union(record.meta);
    let rest = &remaining[pattern.len()..];

    if let Some(found) = record
        .children
        .iter()
        .find_map(|child| match_record(child, rest, meta, params.clone()))
    {
        return Some(found);
    }

    rest.is_empty().then_some((record.name, meta, params))
}
