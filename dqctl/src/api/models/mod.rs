//! API request and response data models.
//!
//! These models define the contract with the backend. They are plain serde types; all
//! transport concerns (credentials, error classification) live in [`crate::transport`].
//!
//! - [`users`]: the resolved identity and its role
//! - [`auth`]: login form, registration payload, issued token, error bodies
//! - [`dashboard`]: global and per-project inspection statistics

pub mod auth;
pub mod dashboard;
pub mod users;
