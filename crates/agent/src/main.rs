//! QoS Agent - QoS resource resolution daemon
//!
//! Runs on each node next to the container runtime, advertising the QoS
//! classes the node supports and resolving pod and container requests.

use anyhow::Result;
use qos_agent::{api, config::AgentConfig, state::AppState, watcher::ConfigWatcher};
use qos_lib::{
    health::{Component, HealthRegistry},
    negotiation::NoopPolicyAgent,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting qos-agent");

    let config = AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        cni_conf_dir = %config.cni_conf_dir.display(),
        "Agent configured"
    );

    let health_registry = HealthRegistry::with_all_components().await;

    let state = Arc::new(AppState::from_config(
        config,
        Arc::new(NoopPolicyAgent),
        health_registry.clone(),
    )?);

    // A broken CNI config at startup leaves the catalog without net classes
    if let Err(e) = state.reload_network_config().await {
        warn!(error = %e, "Initial CNI config load failed");
    }

    let catalog = state.catalog();
    state.logger.log_startup(
        AGENT_VERSION,
        catalog.advertise_pod_resources().len(),
        catalog.advertise_container_resources().len(),
    );

    let _watcher = match ConfigWatcher::new(&state.config.cni_conf_dir).start(state.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "CNI config watcher disabled, use the reload endpoint");
            None
        }
    };

    health_registry.set_ready(true).await;

    let port = state.config.api_port;
    let api_handle = tokio::spawn(api::serve(port, state.clone()));

    tokio::select! {
        res = api_handle => {
            health_registry.set_unhealthy(Component::Api, "API server exited").await;
            res??;
        }
        res = tokio::signal::ctrl_c() => {
            res?;
            state.logger.log_shutdown("SIGINT received");
        }
    }
    info!("Shutting down");

    Ok(())
}
