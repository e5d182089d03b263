//! Tracing initialization (fmt subscriber filtered by `RUST_LOG`).
//!
//! Logs go to stderr so that command output on stdout stays machine-readable. Without `RUST_LOG`
//! the filter falls back to the directive passed by the caller, e.g.
//!
//! ```bash
//! RUST_LOG=dqctl=debug dqctl whoami
//! ```

use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing with a console (stderr) fmt layer.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(default_directive: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;

    debug!("Telemetry initialized");
    Ok(())
}
