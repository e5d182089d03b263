//! # dqctl: Session Control Layer for the DQ Console
//!
//! `dqctl` owns the client side of authentication for the DQ (data quality) console: it obtains a
//! bearer credential from the backend, persists it, resolves the identity and role behind it, and
//! decides on every navigation whether the current session may enter the target route.
//!
//! ## Overview
//!
//! Three components make up a session, wired together by [`SessionContext`]:
//!
//! - The **transport** ([`transport`]) is the only way to talk to the backend. It attaches the
//!   persisted credential to every request, turns failures into user notifications, and when the
//!   backend answers 401 it clears the credential and tells its listeners the session is over.
//! - The **session store** ([`auth::session`]) holds the credential and the identity, runs the
//!   login, registration and logout flows, and publishes every transition on a `watch` channel.
//! - The **router** ([`router`]) resolves paths against the route table and runs the navigation
//!   guard ([`auth::guard`]), which reconciles the session with storage and then allows the
//!   navigation or redirects it to the login page or home.
//!
//! Control flows from router to guard to store to transport. Back edges (the store redirecting
//! after logout, the transport ending the session on 401) go through weak handles and callbacks.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use clap::Parser;
//! use dqctl::{Config, SessionContext, notifications::ConsoleNotifier};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = dqctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     dqctl::telemetry::init_telemetry("warn")?;
//!
//!     let context = SessionContext::new(&config, Arc::new(ConsoleNotifier))?;
//!     context.bootstrap().await?;
//!
//!     context.session().login("alice", "password").await?;
//!     println!("Signed in as {:?}", context.session().user());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod errors;
pub mod notifications;
pub mod router;
pub mod storage;
pub mod telemetry;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;
pub use context::SessionContext;

#[cfg(test)]
mod test;
