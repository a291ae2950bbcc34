//! Service entry point
//!
//! Bootstraps tracing, loads the environment-sourced configuration, picks
//! the identity-directory backend, and serves the router.
//!
//! Environment:
//!
//! - `IDBRIDGE_ISSUER_URL` / `IDBRIDGE_AUDIENCE` / `IDBRIDGE_JWKS_URL` -
//!   see [`idbridge_federation::config`]
//! - `IDBRIDGE_DIRECTORY_URL` - base URL of the identity directory; when
//!   unset the in-process dev directory is used
//! - `IDBRIDGE_BIND_ADDR` - listen address, default `127.0.0.1:8080`
//! - `RUST_LOG` - tracing filter, default `info`

use std::env;
use std::sync::Arc;

use anyhow::Context;
use idbridge_federation::directory::http::HttpDirectory;
use idbridge_federation::directory::memory::MemoryDirectory;
use idbridge_federation::directory::IdentityDirectory;
use idbridge_federation::{FederationBridge, FederationConfig};
use idbridge_server::{AppState, router};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Dev-directory signing secret; only ever used without a configured
/// directory, which is loudly warned about at startup
const DEV_DIRECTORY_SECRET: &[u8] = b"idbridge-dev-directory-secret";

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn directory_from_env() -> Arc<dyn IdentityDirectory> {
    match env::var("IDBRIDGE_DIRECTORY_URL") {
        Ok(url) => {
            info!(directory_url = %url, "using HTTP identity directory");
            Arc::new(HttpDirectory::new(url))
        }
        Err(_) => {
            warn!("IDBRIDGE_DIRECTORY_URL not set, using in-process dev directory");
            Arc::new(MemoryDirectory::new(DEV_DIRECTORY_SECRET))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = FederationConfig::from_env().context("loading federation configuration")?;
    if !config.audience_is_configured() {
        warn!("audience is not configured; mint requests will fail closed");
    }

    let bridge = FederationBridge::new(config, directory_from_env());
    let state = AppState {
        bridge: Arc::new(bridge),
    };

    let bind_addr =
        env::var("IDBRIDGE_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(addr = %bind_addr, "idbridge-server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("serving")?;

    Ok(())
}
