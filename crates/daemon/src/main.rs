// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `scpd`: the control-plane daemon binary. Resolves `Config::from_env`,
//! wires production collaborators (`InMemoryObjectStore`,
//! `HttpSandboxFactory`, `HttpAgentBackendFactory`) into an `AppState`,
//! installs the `tracing-subscriber` formatter selected by
//! `SCP_LOG_FORMAT`, and serves the router on `SCP_LISTEN_ADDR` (default
//! `0.0.0.0:8080`) — the same shape as the teacher's `daemon::main`
//! (resolve config, build adapters, hand the listener to a `tokio::main`).

use scp_daemon::config::{Config, LogFormat};
use scp_daemon::state::AppState;
use scp_sandbox::{HttpAgentBackendFactory, HttpSandboxFactory};
use scp_storage::InMemoryObjectStore;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            eprintln!("scpd: {err}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }

    let object_store: Arc<dyn scp_storage::ObjectStore> = Arc::new(InMemoryObjectStore::new());
    let sandbox_factory = Arc::new(HttpSandboxFactory::new(config.sandbox_runtime_url.clone()));
    let agent_factory = Arc::new(HttpAgentBackendFactory);

    let state = Arc::new(AppState::new(config.clone(), object_store, sandbox_factory, agent_factory));
    let router = scp_daemon::router(state);

    let listen_addr =
        std::env::var("SCP_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %listen_addr, "failed to bind listen address");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %listen_addr, mount_path = %config.mount_path, "scpd listening");
    if let Err(err) = axum::serve(listener, router).await {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }
}
