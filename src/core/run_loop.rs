//! # RunLoop: repeat runs on a fixed frequency.
//!
//! ```text
//! loop {
//!   coordinator.run(options, ctx)
//!     ├─ Ok                       ─► continue
//!     └─ Err(e)                   ─► error!, one-shot: return Err(e)
//!   one-shot (no frequency)       ─► return Ok
//!   sleep(frequency) or ctx cancelled ─► return Ok
//! }
//! ```
//!
//! A failed run never stops a periodic loop; the next trigger simply tries again.

use std::sync::Arc;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::config::GlobalOptions;
use crate::core::RunCoordinator;
use crate::core::shutdown::wait_for_shutdown_signal;
use crate::error::RunError;

/// Drives a [`RunCoordinator`] once or periodically.
pub struct RunLoop {
    coordinator: Arc<RunCoordinator>,
    options: GlobalOptions,
}

impl RunLoop {
    /// Creates a loop; `options.run_frequency` decides between one-shot and periodic.
    pub fn new(coordinator: Arc<RunCoordinator>, options: GlobalOptions) -> Self {
        Self {
            coordinator,
            options,
        }
    }

    /// Runs until the one-shot run ends or `ctx` is cancelled.
    pub async fn run(&self, ctx: &CancellationToken) -> Result<(), RunError> {
        let mut runs: u64 = 0;

        while !ctx.is_cancelled() {
            runs += 1;
            if let Err(e) = self.coordinator.run(&self.options, ctx).await {
                error!(error = %e, label = e.as_label(), run = runs, "run failed");
                if self.options.run_frequency.is_none() {
                    return Err(e);
                }
            }

            let Some(frequency) = self.options.run_frequency else {
                return Ok(());
            };
            trace!(?frequency, "waiting until next run");
            select! {
                biased;
                _ = ctx.cancelled() => break,
                _ = time::sleep(frequency) => {}
            }
        }

        info!(runs, "run loop stopped");
        Ok(())
    }

    /// Like [`RunLoop::run`], cancelled by the first OS shutdown signal.
    pub async fn run_until_signal(&self) -> Result<(), RunError> {
        let ctx = CancellationToken::new();
        let run = self.run(&ctx);
        tokio::pin!(run);

        select! {
            res = &mut run => return res,
            signal = wait_for_shutdown_signal() => match signal {
                Ok(signal) => info!(%signal, "shutdown requested"),
                Err(e) => {
                    warn!(error = %e, "cannot listen for shutdown signals");
                    return run.await;
                }
            },
        }

        ctx.cancel();
        run.await
    }
}
