//! Wire contract with the DQ backend.
//!
//! The session layer only speaks to a handful of endpoints; their request and response bodies
//! live in [`models`]:
//!
//! - **Authentication** (`/api/v1/auth/*`): token issue, registration, current identity
//! - **Dashboard** (`/api/v1/dashboard/*`): read-only aggregate statistics
//!
//! Endpoint paths themselves are in [`crate::types::endpoints`].

pub mod models;
