//! In-app navigation.
//!
//! The [`Router`] resolves a path against the [`RouteTable`], runs the [`NavigationGuard`] and
//! commits the resulting [`Location`]. Guard redirects are followed like any other navigation, up
//! to `max_redirects` hops.
//!
//! Navigations can overlap: the guard awaits the identity fetch, and a logout triggered inside
//! one navigation starts another. The last navigation started wins. Every navigation takes a
//! generation number when it starts, and one that finds a newer generation after its guard
//! resolves returns [`NavigationOutcome::Superseded`] without touching the location.

pub mod routes;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::auth::guard::{GuardDecision, NavigationGuard};
use crate::auth::session::SessionStore;
use crate::errors::{Error, Result};

pub use routes::{ResolvedRoute, RouteRecord, RouteTable};

/// Where the session layer sends the user. Implemented by [`Router`]; the session store only
/// holds a weak handle to it.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Navigate through the guard, as a user clicking a link would.
    async fn push(&self, path: &str);

    /// Replace the location immediately, bypassing the guard. Used when the backend rejected the
    /// credential and nothing should run in between.
    fn hard_redirect(&self, path: &str);
}

/// The committed location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub name: &'static str,
    pub params: BTreeMap<String, String>,
}

impl From<ResolvedRoute> for Location {
    fn from(route: ResolvedRoute) -> Self {
        Self {
            path: route.path,
            name: route.name,
            params: route.params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The location was committed, possibly after guard redirects
    Completed(Location),
    /// A newer navigation started while this one was in the guard
    Superseded,
}

pub struct Router {
    table: RouteTable,
    guard: NavigationGuard,
    location: watch::Sender<Option<Location>>,
    generation: AtomicU64,
    max_redirects: usize,
}

impl Router {
    pub fn new(table: RouteTable, guard: NavigationGuard, max_redirects: usize) -> Self {
        let (location, _) = watch::channel(None);
        Self {
            table,
            guard,
            location,
            generation: AtomicU64::new(0),
            max_redirects,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.guard.session()
    }

    /// The committed location; `None` until the first navigation completes.
    pub fn current(&self) -> Option<Location> {
        self.location.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Location>> {
        self.location.subscribe()
    }

    #[instrument(skip(self), err)]
    pub async fn navigate(&self, path: &str) -> Result<NavigationOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut target = path.to_string();

        for _ in 0..=self.max_redirects {
            let resolved = self.table.resolve(&target)?;
            let decision = self.guard.check(&resolved.meta).await;

            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(target = %resolved.path, "Navigation superseded by a newer one");
                return Ok(NavigationOutcome::Superseded);
            }

            match decision {
                GuardDecision::Allow => {
                    let location = Location::from(resolved);
                    self.commit(location.clone());
                    return Ok(NavigationOutcome::Completed(location));
                }
                GuardDecision::Redirect(to) => {
                    debug!(from = %resolved.path, to, "Guard redirected navigation");
                    target = to.to_string();
                }
            }
        }

        Err(Error::RedirectLoop { path: path.to_string() })
    }

    /// Commit `path` without running the guard, superseding any navigation in flight.
    pub fn hard_redirect(&self, path: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        match self.table.resolve(path) {
            Ok(resolved) => {
                info!(path = %resolved.path, "Hard redirect");
                self.commit(Location::from(resolved));
            }
            Err(e) => warn!(path, error = %e, "Hard redirect to unknown route ignored"),
        }
    }

    fn commit(&self, location: Location) {
        debug!(path = %location.path, name = location.name, "Location committed");
        self.location.send_replace(Some(location));
    }
}

#[async_trait]
impl Navigator for Router {
    async fn push(&self, path: &str) {
        if let Err(e) = self.navigate(path).await {
            warn!(path, error = %e, "Navigation failed");
        }
    }

    fn hard_redirect(&self, path: &str) {
        Router::hard_redirect(self, path);
    }
}
