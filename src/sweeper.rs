// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Background sweep of expired rate limit windows and CSRF tokens.

use crate::csrf::CsrfProtection;
use crate::limiter::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle to a running sweeper. Dropping it leaves the task running;
/// call [`SweeperHandle::shutdown`] to stop it.
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the current pass to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Sweeper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Periodically purges expired state from the limiter and the token store.
pub struct Sweeper;

impl Sweeper {
    /// Spawn the sweep loop on the current runtime.
    pub fn spawn(
        interval: Duration,
        limiter: Arc<RateLimiter>,
        csrf: Arc<CsrfProtection>,
    ) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let windows = limiter.cleanup().await;
                        let tokens = csrf.purge_expired().await;
                        debug!(windows, tokens, "Sweep pass complete");
                    }
                }
            }
            info!("Sweeper stopped");
        });

        SweeperHandle { cancel, task }
    }
}
