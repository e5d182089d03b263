//! Common type definitions and well-known locations.
//!
//! This module defines:
//! - Type aliases for entity IDs
//! - The API endpoint paths consumed by the session layer
//! - The route paths used as redirect targets

// Type aliases for IDs
pub type UserId = i64;
pub type ProjectId = i64;

/// Backend endpoints consumed by the session layer.
pub mod endpoints {
    pub const TOKEN: &str = "/api/v1/auth/token";
    pub const REGISTER: &str = "/api/v1/auth/register";
    pub const ME: &str = "/api/v1/auth/me";
    pub const GLOBAL_STATISTICS: &str = "/api/v1/dashboard/statistics";
    pub const PROJECT_STATISTICS: &str = "/api/v1/dashboard/project-statistics";
}

/// Routes that the session layer redirects to.
pub mod routes {
    pub const HOME: &str = "/";
    pub const LOGIN: &str = "/login";
    pub const ADMIN_USERS: &str = "/admin/users";
}

/// Mask a bearer credential for logs and traces, keeping only its first 4 characters.
/// Example: "eyJhbGciOiJIUzI1NiJ9..." -> "eyJh…"
pub fn abbrev_token(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{prefix}…")
}
