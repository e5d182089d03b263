//! Client-side authentication and route authorization.
//!
//! - [`session`]: the [`SessionStore`](session::SessionStore), owning the credential and the
//!   identity behind it, plus the login/register/logout flows.
//! - [`guard`]: the access decision applied to every navigation, based on per-route
//!   [`RouteMeta`](guard::RouteMeta) flags and the current session.
//!
//! # Roles
//!
//! Identities carry one of three roles, ordered `REGULAR_USER < PROJECT_ADMIN < SYSTEM_ADMIN`.
//! Routes can require authentication, a system admin, or at least a project admin; guest-only
//! routes (login, registration) are closed to authenticated users.

pub mod guard;
pub mod session;
