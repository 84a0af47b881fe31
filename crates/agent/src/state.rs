//! Daemon state shared by the HTTP API and the CNI config watcher

use anyhow::{Context, Result};
use qos_lib::{
    backend::ConfiguredBackend,
    catalog::{CapabilityCatalog, NetworkPluginConfig, PlaceholderResources},
    error::CatalogParseError,
    health::{Component, HealthRegistry},
    negotiation::{NetworkNegotiator, PolicyAgent},
    observability::{QosMetrics, StructuredLogger},
    resolver::QosResolver,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AgentConfig;

/// Result of a successful network configuration reload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadSummary {
    pub networks: usize,
    pub net_classes: usize,
}

pub struct AppState {
    pub config: AgentConfig,
    pub resolver: Arc<QosResolver>,
    pub negotiator: NetworkNegotiator,
    pub health_registry: HealthRegistry,
    pub metrics: QosMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    /// Build the catalog and resolver described by the configuration
    ///
    /// The network part of the catalog starts empty; call
    /// [`AppState::reload_network_config`] to populate it.
    pub fn from_config(
        config: AgentConfig,
        agent: Arc<dyn PolicyAgent>,
        health_registry: HealthRegistry,
    ) -> Result<Self> {
        let rdt = Arc::new(ConfiguredBackend::rdt(config.rdt.clone()));
        let blockio = Arc::new(ConfiguredBackend::blockio(config.blockio.clone()));

        let mut builder = CapabilityCatalog::builder()
            .with_backend(rdt.as_ref())
            .with_backend(blockio.as_ref());
        if config.placeholder_resources {
            builder = builder.with_source(&PlaceholderResources);
        }
        let catalog = builder.build().context("Invalid QoS class configuration")?;

        let resolver = Arc::new(
            QosResolver::new(Arc::new(catalog))
                .with_backend(rdt, config.ignore_rdt_not_enabled_errors)
                .with_backend(blockio, config.ignore_blockio_not_enabled_errors),
        );
        let negotiator =
            NetworkNegotiator::new(resolver.clone(), agent, config.negotiation_options());

        info!(
            policy_agent = %negotiator.agent_name(),
            failure_policy = ?config.agent_failure_policy,
            "QoS resolver initialized"
        );

        Ok(Self {
            logger: StructuredLogger::new(&config.node_name),
            metrics: QosMetrics::new(),
            config,
            resolver,
            negotiator,
            health_registry,
        })
    }

    pub fn catalog(&self) -> &Arc<CapabilityCatalog> {
        self.resolver.catalog()
    }

    /// Reload the CNI configuration directory, rebuild the net classes and
    /// announce the loaded networks to the policy agent
    ///
    /// A failed load or parse keeps the previous catalog. Announcement
    /// failures only degrade the policy agent's health.
    pub async fn reload_network_config(&self) -> Result<ReloadSummary, CatalogParseError> {
        let plugin_config =
            match NetworkPluginConfig::load_dir(&self.config.cni_conf_dir, self.config.cni_max_conf_num)
                .await
            {
                Ok(plugin_config) => plugin_config,
                Err(e) => {
                    self.on_rebuild_failed(&e).await;
                    return Err(e);
                }
            };

        let rebuilt = self.catalog().rebuild_network_catalog(&plugin_config);
        self.announce(&plugin_config).await;

        match rebuilt {
            Ok(net_classes) => {
                let networks = plugin_config.networks.len();
                self.metrics.record_catalog_rebuilt(net_classes);
                self.logger.log_catalog_rebuilt(networks, net_classes);
                self.health_registry.set_healthy(Component::Catalog).await;
                Ok(ReloadSummary {
                    networks,
                    net_classes,
                })
            }
            Err(e) => {
                self.on_rebuild_failed(&e).await;
                Err(e)
            }
        }
    }

    async fn on_rebuild_failed(&self, err: &CatalogParseError) {
        self.metrics.record_catalog_rebuild_failed();
        self.logger.log_catalog_rebuild_failed(&err.to_string());
        self.health_registry
            .set_degraded(Component::Catalog, err.to_string())
            .await;
    }

    async fn announce(&self, plugin_config: &NetworkPluginConfig) {
        match self.negotiator.announce_network_configs(plugin_config).await {
            Ok(()) => {
                self.health_registry
                    .set_healthy(Component::PolicyAgent)
                    .await
            }
            Err(e) => {
                warn!(error = %e, "Failed to announce network configs to policy agent");
                self.health_registry
                    .set_degraded(Component::PolicyAgent, e.to_string())
                    .await;
            }
        }
    }
}
