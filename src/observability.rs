//! # Log output.
//!
//! The library only emits [`tracing`] events. Binaries (and tests that want to
//! see them) call [`init_logging`] once at startup.
//!
//! ```text
//! RUST_LOG set   ─► EnvFilter from RUST_LOG
//! RUST_LOG unset ─► EnvFilter::new(default_directive)      e.g. "runvisor=info"
//! ```

use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

/// Installs a stderr `fmt` subscriber filtered by `RUST_LOG`, or by
/// `default_directive` when the variable is absent or invalid.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(default_directive: &str) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    subscriber(filter, std::io::stderr).try_init()
}

fn subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true);

    tracing_subscriber::registry().with(filter).with(layer)
}
