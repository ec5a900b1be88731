// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[cfg(feature = "dev")]
use relational_auth_server::auth::InsecureDecoder;
use relational_auth_server::{
    api::router,
    auth::{JwksDecoder, JwksManager, TokenDecoder},
    config::{ServerConfig, LOG_FORMAT_ENV},
    jwks_refresher::JwksRefresher,
    state::AppState,
    storage::AuthDatabase,
};

#[tokio::main]
async fn main() {
    init_tracing();

    let config = ServerConfig::from_env().expect("Invalid server configuration");

    let database_path = config.database_path();
    let database =
        Arc::new(AuthDatabase::open(&database_path).expect("Failed to open user database"));
    info!(path = %database_path.display(), "User database ready");

    // Pick the token decoder: JWKS-backed in production, unverified only in
    // dev builds.
    let (decoder, jwks): (Arc<dyn TokenDecoder>, Option<Arc<JwksManager>>) = match &config.jwks_url
    {
        Some(url) => {
            let manager = Arc::new(JwksManager::new(url.as_str()));
            let mut decoder = JwksDecoder::new(manager.clone());
            if let Some(issuer) = &config.issuer {
                decoder = decoder.with_issuer(issuer.as_str());
            }
            if let Some(audience) = &config.audience {
                decoder = decoder.with_audience(audience.as_str());
            }
            info!(url = url.as_str(), "Verifying tokens against JWKS");
            (Arc::new(decoder), Some(manager))
        }
        #[cfg(feature = "dev")]
        None => {
            tracing::warn!("JWT_JWKS_URL not set; accepting UNVERIFIED tokens (dev build only)");
            (Arc::new(InsecureDecoder), None)
        }
        #[cfg(not(feature = "dev"))]
        None => {
            panic!("JWT_JWKS_URL must be set (unverified tokens require the dev feature)")
        }
    };

    let state = AppState::new(
        config.auth.clone(),
        decoder,
        database.clone(),
        database,
        jwks.clone(),
    );

    let shutdown = CancellationToken::new();

    // Keep verification keys warm so provider key rotation does not fail a
    // live request first.
    if let Some(manager) = jwks {
        tokio::spawn(JwksRefresher::new(manager).run(shutdown.clone()));
    }

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");

    info!("Auth server listening on http://{addr} (docs at /docs)");

    let handle = axum_server::Handle::new();
    tokio::spawn(shutdown_signal(handle.clone(), shutdown));

    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .expect("HTTP server failed");
}

/// Initialize the tracing subscriber from `RUST_LOG`, defaulting to `info`.
///
/// Set `LOG_FORMAT=json` for newline-delimited JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("Failed to build log filter");

    let json_logs = env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

/// Wait for Ctrl-C, then stop background tasks and drain the server.
async fn shutdown_signal(handle: axum_server::Handle<SocketAddr>, shutdown: CancellationToken) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");

    info!("Shutdown signal received, draining connections");
    shutdown.cancel();
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
