//! The session context: one transport, one session store and one router, wired together.
//!
//! Components reference each other in a cycle (the store redirects through the router, the
//! router's guard reads the store, the transport ends the session on 401). Ownership runs one
//! way, router → guard → store → transport, and every back edge is a `Weak` handle.

use std::sync::{Arc, Weak};

use tracing::info;

use crate::auth::guard::NavigationGuard;
use crate::auth::session::SessionStore;
use crate::config::Config;
use crate::dashboard::DashboardService;
use crate::errors::Result;
use crate::notifications::Notifier;
use crate::router::{NavigationOutcome, Navigator, RouteTable, Router};
use crate::storage::{self, CredentialStorage};
use crate::transport::{SessionInvalidationListener, Transport};
use crate::types::routes;

pub struct SessionContext {
    transport: Arc<Transport>,
    router: Arc<Router>,
    dashboard: DashboardService,
    initial_route: String,
}

impl SessionContext {
    /// Build a context using the storage backend selected in `config`.
    pub fn new(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        Self::with_storage(config, storage::from_config(&config.storage), notifier)
    }

    pub fn with_storage(config: &Config, storage: Arc<dyn CredentialStorage>, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let transport = Arc::new(Transport::new(config, storage, notifier)?);

        let router = Arc::new_cyclic(|weak: &Weak<Router>| {
            let navigator: Weak<dyn Navigator> = weak.clone();
            let session = Arc::new(SessionStore::new(transport.clone(), navigator));
            Router::new(RouteTable::default_routes(), NavigationGuard::new(session), config.max_redirects)
        });

        transport.add_invalidation_listener(Arc::new(EndSessionOnRejection {
            session: Arc::downgrade(router.session()),
            router: Arc::downgrade(&router),
        }));

        Ok(Self {
            dashboard: DashboardService::new(transport.clone()),
            transport,
            router,
            initial_route: config.initial_route.clone(),
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.router.session()
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn dashboard(&self) -> &DashboardService {
        &self.dashboard
    }

    /// Navigate to the configured initial route. The guard reconciles the session with storage
    /// and resolves the identity before deciding where the user lands.
    pub async fn bootstrap(&self) -> Result<NavigationOutcome> {
        info!(route = %self.initial_route, "Bootstrapping session");
        self.router.navigate(&self.initial_route).await
    }
}

/// Reacts to a 401: drop the in-memory session and go straight to login, without running the
/// guard. The transport has already cleared the persisted credential.
struct EndSessionOnRejection {
    session: Weak<SessionStore>,
    router: Weak<Router>,
}

impl SessionInvalidationListener for EndSessionOnRejection {
    fn session_invalidated(&self) {
        if let Some(session) = self.session.upgrade() {
            session.invalidate();
        }
        if let Some(router) = self.router.upgrade() {
            router.hard_redirect(routes::LOGIN);
        }
    }
}
