// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Gate Service
//!
//! Serves the CSRF token endpoint and the rate-limited contact endpoint
//! for the portfolio site.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (and `.env` if present):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `APP_ENV`: `production` enables Secure cookies and HSTS
//! - `CSRF_SECRET`: HMAC signing secret, at least 32 bytes (required)
//! - `CSRF_TOKEN_EXPIRY_SECS`: Token lifetime (default: 3600)
//! - `RATE_LIMIT_WINDOW_MS`: Contact window (default: 900000)
//! - `RATE_LIMIT_MAX_REQUESTS`: Contact requests per window (default: 5)
//! - `CLEANUP_INTERVAL_SECS`: Background sweep interval (default: 300)

use contact_gate::{contact::LogMailer, router, AppState, Config};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    if let Err(e) = dotenv {
        info!(error = %e, "No .env file loaded");
    }

    // Load configuration
    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        environment = ?config.environment,
        token_expiry_secs = config.csrf.token_expiry_secs,
        rotate_on_use = config.csrf.rotate_on_use,
        window_ms = config.rate_limit.window_ms,
        max_requests = config.rate_limit.max_requests,
        "Starting contact gate"
    );
    if config.csrf.expose_stats {
        warn!(
            environment = ?config.environment,
            "CSRF_EXPOSE_STATS is set: token store statistics are returned by the validation endpoint"
        );
    }

    let addr: SocketAddr = config.bind_addr.parse()?;

    // Create application state
    let state = Arc::new(AppState::new(config, Arc::new(LogMailer))?);
    let sweeper = state.start_sweeper();

    let app = router(state);

    // Start server
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
