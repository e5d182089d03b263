//! Session store: the single source of truth for who the current user is.
//!
//! The session is the pair (credential, identity) plus a busy flag. It moves between three phases:
//!
//! ```text
//!                 login / initialize_auth            identity resolved
//! Unauthenticated ────────────────────────► Pending ───────────────────► Authenticated
//!        ▲                                     │                               │
//!        └──────── logout, identity-fetch failure, 401 ────────────────────────┘
//! ```
//!
//! State lives in a `tokio::sync::watch` channel, so every transition is observable through
//! [`SessionStore::subscribe`]. The persisted credential in [`CredentialStorage`] stays the
//! authoritative value; the in-memory copy is reconciled to it by [`SessionStore::initialize_auth`].
//!
//! [`CredentialStorage`]: crate::storage::CredentialStorage

use std::fmt;
use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::api::models::auth::{LoginForm, RegisterRequest, TokenResponse};
use crate::api::models::users::{Role, User};
use crate::errors::{Error, Result};
use crate::notifications::Notification;
use crate::router::Navigator;
use crate::transport::Transport;
use crate::types::{endpoints, routes};

/// Phase of the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No credential, no identity
    Unauthenticated,
    /// Credential present, identity not resolved yet
    Pending,
    /// Credential and identity both present
    Authenticated,
}

/// Point-in-time view of the session.
#[derive(Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub user: Option<User>,
    /// A login or registration submission is in flight
    pub busy: bool,
}

// Manual impl so the credential never ends up in logs
impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .field("busy", &self.busy)
            .finish()
    }
}

impl SessionSnapshot {
    pub fn phase(&self) -> SessionPhase {
        match (&self.token, &self.user) {
            (Some(_), Some(_)) => SessionPhase::Authenticated,
            (Some(_), None) => SessionPhase::Pending,
            (None, _) => SessionPhase::Unauthenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == SessionPhase::Authenticated
    }

    fn has_role(&self, role: Role) -> bool {
        self.user.as_ref().is_some_and(|u| u.role == role)
    }

    pub fn is_system_admin(&self) -> bool {
        self.has_role(Role::SystemAdmin)
    }

    pub fn is_project_admin(&self) -> bool {
        self.has_role(Role::ProjectAdmin)
    }

    pub fn is_regular_user(&self) -> bool {
        self.has_role(Role::RegularUser)
    }

    /// The identity's role, or `REGULAR_USER` when there is no identity. The fallback grants
    /// nothing on its own: it only ever appears alongside `is_authenticated() == false`.
    pub fn user_role(&self) -> Role {
        self.user.as_ref().map(|u| u.role).unwrap_or_default()
    }

    /// True when an identity is present and its role includes `role`.
    pub fn has_at_least(&self, role: Role) -> bool {
        self.user.as_ref().is_some_and(|u| u.role.includes(role))
    }
}

pub struct SessionStore {
    transport: Arc<Transport>,
    navigator: Weak<dyn Navigator>,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionStore {
    /// Create a store seeded from the persisted credential. The identity is not fetched until
    /// [`initialize_auth`](Self::initialize_auth) runs, so a persisted credential starts `Pending`.
    pub fn new(transport: Arc<Transport>, navigator: Weak<dyn Navigator>) -> Self {
        let token = transport.storage().load().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read persisted credential, starting logged out");
            None
        });
        let (state, _) = watch::channel(SessionSnapshot {
            token,
            ..Default::default()
        });

        Self {
            transport,
            navigator,
            state,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Subscribe to session transitions. The receiver is notified whenever the credential, the
    /// identity or the busy flag changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_system_admin(&self) -> bool {
        self.state.borrow().is_system_admin()
    }

    pub fn is_project_admin(&self) -> bool {
        self.state.borrow().is_project_admin()
    }

    pub fn is_regular_user(&self) -> bool {
        self.state.borrow().is_regular_user()
    }

    pub fn user_role(&self) -> Role {
        self.state.borrow().user_role()
    }

    pub fn has_at_least(&self, role: Role) -> bool {
        self.state.borrow().has_at_least(role)
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().busy
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    fn has_credential(&self) -> bool {
        self.state.borrow().token.is_some()
    }

    /// Exchange username and password for a credential, then resolve the identity.
    ///
    /// On success the user is sent to the admin area (system admins) or home. On any failure an
    /// error notification is emitted and the error is returned for field-level display; no
    /// credential is left behind.
    #[instrument(skip(self, password), fields(username = %username), err)]
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.begin_submission()?;
        // Release the busy flag however the submission ends
        let _guard = scopeguard::guard((), |_| self.end_submission());

        match self.authenticate(username, password).await {
            Ok(role) => {
                info!(role = %role, "Login successful");
                self.notify(Notification::success("Login successful"));
                let target = if role == Role::SystemAdmin { routes::ADMIN_USERS } else { routes::HOME };
                self.navigate(target).await;
                Ok(())
            }
            Err(e) => {
                self.notify(Notification::error(e.detail().unwrap_or("Login failed")));
                Err(e)
            }
        }
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Role> {
        let form = LoginForm {
            username: username.to_string(),
            password: password.to_string(),
        };
        let issued: TokenResponse = self.transport.post_form(endpoints::TOKEN, &form).await?;

        // Persist first: the transport reads the credential from storage, not from memory
        self.transport.storage().store(&issued.access_token)?;
        self.state.send_modify(|s| {
            s.token = Some(issued.access_token);
            s.user = None;
        });
        debug!("Credential issued, resolving identity");

        self.fetch_identity().await;

        // fetch_identity absorbs its own failure by tearing the session down
        let snapshot = self.snapshot();
        match snapshot.user {
            Some(user) if snapshot.token.is_some() => Ok(user.role),
            _ => Err(Error::Unauthenticated {
                message: Some("Could not load user profile".to_string()),
            }),
        }
    }

    /// Create an account. Registration never authenticates; the user is sent to the login page.
    #[instrument(skip(self, password), fields(username = %username, email = %email), err)]
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<()> {
        self.begin_submission()?;
        // Release the busy flag however the submission ends
        let _guard = scopeguard::guard((), |_| self.end_submission());

        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        match self.transport.post_json(endpoints::REGISTER, &request).await {
            Ok(_) => {
                info!("Registration successful");
                self.notify(Notification::success("Registration successful, please log in"));
                self.navigate(routes::LOGIN).await;
                Ok(())
            }
            Err(e) => {
                self.notify(Notification::error(e.detail().unwrap_or("Registration failed")));
                Err(e)
            }
        }
    }

    /// Resolve the identity behind the current credential. Without a credential this is a no-op.
    ///
    /// Failure is never returned: a credential whose identity cannot be fetched is worthless, so
    /// the session is torn down via [`logout`](Self::logout) instead.
    #[instrument(skip_all)]
    pub async fn fetch_identity(&self) {
        if !self.has_credential() {
            return;
        }

        match self.transport.get::<User>(endpoints::ME).await {
            Ok(user) => {
                debug!(user_id = user.id, role = %user.role, "Identity resolved");
                // The credential may have been dropped while the request was in flight
                let applied = self.state.send_if_modified(|s| {
                    if s.token.is_none() {
                        return false;
                    }
                    s.user = Some(user);
                    true
                });
                if !applied {
                    debug!("Credential cleared during identity fetch, discarding identity");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch user info, ending session");
                self.logout().await;
            }
        }
    }

    /// End the session: clear identity and credential (memory and storage), go to the login page.
    /// Safe to call when already logged out.
    #[instrument(skip_all)]
    pub async fn logout(&self) {
        self.invalidate();
        self.navigate(routes::LOGIN).await;
        self.notify(Notification::success("Logged out"));
    }

    /// Drop the session without navigating or notifying. Used when the backend has already
    /// rejected the credential and navigation is handled elsewhere.
    pub fn invalidate(&self) {
        let changed = self.state.send_if_modified(|s| {
            let had_session = s.token.is_some() || s.user.is_some();
            s.token = None;
            s.user = None;
            had_session
        });
        if changed {
            info!("Session cleared");
        }

        if let Err(e) = self.transport.storage().clear() {
            error!(error = %e, "Failed to clear persisted credential");
        }
    }

    /// Reconcile with the persisted credential and resolve the identity if there is one.
    ///
    /// Runs at bootstrap and before every navigation. Repeated calls only repeat the identity
    /// refresh.
    #[instrument(skip_all)]
    pub async fn initialize_auth(&self) {
        let persisted = self.transport.storage().load().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read persisted credential, treating as logged out");
            None
        });

        if self.reconcile(persisted) {
            self.fetch_identity().await;
        }
    }

    /// Align the in-memory credential with `persisted`. Returns whether a credential is present.
    fn reconcile(&self, persisted: Option<String>) -> bool {
        let present = persisted.is_some();
        self.state.send_if_modified(|s| {
            if s.token == persisted {
                return false;
            }
            debug!(present, "Persisted credential changed, resetting identity");
            s.token = persisted;
            s.user = None;
            true
        });
        present
    }

    /// Replace the identity, e.g. after the user edited their profile. Ignored (returns `false`)
    /// when there is no credential.
    pub fn set_user(&self, user: User) -> bool {
        self.state.send_if_modified(|s| {
            if s.token.is_none() {
                return false;
            }
            s.user = Some(user);
            true
        })
    }

    fn begin_submission(&self) -> Result<()> {
        let mut acquired = false;
        self.state.send_if_modified(|s| {
            if s.busy {
                return false;
            }
            s.busy = true;
            acquired = true;
            true
        });

        if acquired {
            Ok(())
        } else {
            debug!("Rejecting overlapping submission");
            Err(Error::Busy)
        }
    }

    fn end_submission(&self) {
        self.state.send_if_modified(|s| std::mem::replace(&mut s.busy, false));
    }

    fn notify(&self, notification: Notification) {
        self.transport.notifier().notify(notification);
    }

    async fn navigate(&self, path: &str) {
        match self.navigator.upgrade() {
            Some(navigator) => navigator.push(path).await,
            None => debug!(path, "No navigator attached, skipping redirect"),
        }
    }
}
