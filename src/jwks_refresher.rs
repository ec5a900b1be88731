// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # JWKS Background Refresher
//!
//! Background task that periodically re-fetches the identity provider's
//! JSON Web Key Set. This keeps the verification key cache warm so signing
//! key rotation at the provider propagates without failing a live request
//! first.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown,
//! following the same pattern as the HTTP server task.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::JwksManager;

/// Default interval between refresh sweeps.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Background task that keeps the JWKS cache fresh.
pub struct JwksRefresher {
    jwks: Arc<JwksManager>,
    refresh_interval: Duration,
}

impl JwksRefresher {
    /// Create a new refresher for the given key manager.
    pub fn new(jwks: Arc<JwksManager>) -> Self {
        Self {
            jwks,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// Override the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Run the refresh loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(refresher.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.refresh_interval.as_secs(),
            url = self.jwks.jwks_url(),
            "JWKS refresher starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("JWKS refresher shutting down");
                return;
            }

            self.refresh_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.refresh_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("JWKS refresher shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one refresh sweep.
    async fn refresh_step(&self) {
        match self.jwks.refresh().await {
            Ok(()) => debug!("JWKS refresher: key set refreshed"),
            Err(e) => warn!(error = %e, "JWKS refresher: refresh failed, keeping cached keys"),
        }
    }
}
