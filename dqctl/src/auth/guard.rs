//! Route access decisions.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::api::models::users::Role;
use crate::auth::session::{SessionSnapshot, SessionStore};
use crate::types::routes;

/// Static access flags attached to a route. A route's effective metadata is the union of its own
/// flags and those of all its ancestors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_system_admin: bool,
    /// Project admin or anything above it
    pub requires_project_admin: bool,
    pub guest_only: bool,
}

impl RouteMeta {
    pub const PUBLIC: Self = Self {
        requires_auth: false,
        requires_system_admin: false,
        requires_project_admin: false,
        guest_only: false,
    };

    pub const AUTHENTICATED: Self = Self {
        requires_auth: true,
        ..Self::PUBLIC
    };

    pub const SYSTEM_ADMIN: Self = Self {
        requires_auth: true,
        requires_system_admin: true,
        ..Self::PUBLIC
    };

    pub const PROJECT_ADMIN: Self = Self {
        requires_auth: true,
        requires_project_admin: true,
        ..Self::PUBLIC
    };

    pub const GUEST_ONLY: Self = Self {
        guest_only: true,
        ..Self::PUBLIC
    };

    pub fn union(self, other: Self) -> Self {
        Self {
            requires_auth: self.requires_auth || other.requires_auth,
            requires_system_admin: self.requires_system_admin || other.requires_system_admin,
            requires_project_admin: self.requires_project_admin || other.requires_project_admin,
            guest_only: self.guest_only || other.guest_only,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

/// Decide whether a session may enter a route with `meta`. First matching rule wins:
///
/// 1. needs auth, not authenticated: login
/// 2. guest only, authenticated: home
/// 3. needs system admin, not a system admin: home
/// 4. needs project admin, below project admin: home
/// 5. allow
///
/// Rule 3 applies to anonymous sessions too, so an admin-only route without `requires_auth` sends
/// them home rather than to login.
pub fn decide(meta: &RouteMeta, session: &SessionSnapshot) -> GuardDecision {
    let authenticated = session.is_authenticated();

    if meta.requires_auth && !authenticated {
        return GuardDecision::Redirect(routes::LOGIN);
    }
    if meta.guest_only && authenticated {
        return GuardDecision::Redirect(routes::HOME);
    }
    if meta.requires_system_admin && !session.is_system_admin() {
        return GuardDecision::Redirect(routes::HOME);
    }
    if meta.requires_project_admin && !(authenticated && session.has_at_least(Role::ProjectAdmin)) {
        return GuardDecision::Redirect(routes::HOME);
    }

    GuardDecision::Allow
}

/// Runs before every navigation: refresh the session from storage, then [`decide`].
pub struct NavigationGuard {
    session: Arc<SessionStore>,
}

impl NavigationGuard {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    #[instrument(skip(self), fields(meta = ?meta))]
    pub async fn check(&self, meta: &RouteMeta) -> GuardDecision {
        self.session.initialize_auth().await;

        let decision = decide(meta, &self.session.snapshot());
        debug!(?decision, "Guard decision");
        decision
    }
}
