//! Runtime-spec mutation generation
//!
//! Turns the QoS requests of a sandbox or container into an ordered list of
//! mutations for the spec builder. The order follows the request scan order,
//! so replaying the same request set against the same catalog yields the
//! same list.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{QosResolver, ResolutionTarget, Strategy};
use crate::catalog::{BandwidthLimits, Scope};
use crate::error::{QosError, Result};
use crate::models::{ContainerConfig, PodSandboxConfig, QOS_RESOURCE_NET};

/// Block-I/O parameters a class translates to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxBlockIo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_read_bps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_write_bps: Option<u64>,
}

/// One instruction for the runtime-spec builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigMutation {
    /// Assign the container to an RDT class of service
    Rdt { class: String },
    /// Apply a block-I/O class
    BlockIo { class: String, block_io: LinuxBlockIo },
    /// Apply a class of a vendor-defined resource type
    Vendor { resource: String, class: String },
}

impl ConfigMutation {
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigMutation::Rdt { .. } => "rdt",
            ConfigMutation::BlockIo { .. } => "block_io",
            ConfigMutation::Vendor { .. } => "vendor",
        }
    }
}

/// The resolved network class of a sandbox and the limits to hand to CNI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkQos {
    pub class: String,
    pub bandwidth: Option<BandwidthLimits>,
}

impl QosResolver {
    /// Mutations for a pod sandbox. "net" is validated but applied at the
    /// sandbox network layer, never as a spec mutation.
    pub fn generate_sandbox_mutations(
        &self,
        sandbox: &PodSandboxConfig,
    ) -> Result<Vec<ConfigMutation>> {
        self.generate(&ResolutionTarget::Sandbox(sandbox))
    }

    /// Mutations for a container, including RDT/block-I/O classes picked up
    /// from annotations when no structured request names them
    ///
    /// "net" is a pod-level resource only: a container request for it fails
    /// with `UnknownResourceType`, whatever class it names.
    pub fn generate_container_mutations(
        &self,
        container: &ContainerConfig,
        sandbox: &PodSandboxConfig,
    ) -> Result<Vec<ConfigMutation>> {
        self.generate(&ResolutionTarget::Container { container, sandbox })
    }

    /// The sandbox's network class with its bandwidth, resolved once per sandbox
    pub fn resolve_sandbox_network(&self, sandbox: &PodSandboxConfig) -> Result<Option<NetworkQos>> {
        let snapshot = self.catalog.snapshot();
        let target = ResolutionTarget::Sandbox(sandbox);
        let class =
            self.resolve_with(&snapshot, &Strategy::SandboxNetwork, QOS_RESOURCE_NET, &target)?;

        Ok(class.map(|class| {
            let bandwidth = snapshot.network_class(&class).and_then(|c| c.bandwidth);
            NetworkQos { class, bandwidth }
        }))
    }

    fn generate(&self, target: &ResolutionTarget<'_>) -> Result<Vec<ConfigMutation>> {
        let requests = target.requests();
        if let Some(request) = requests.iter().find(|r| r.class.is_empty()) {
            return Err(QosError::EmptyClassNotAllowed {
                resource: request.name.clone(),
            });
        }

        // Requested types in first-seen order, then back-end types that may
        // still be set through annotations
        let mut order: Vec<&str> = Vec::new();
        for request in requests {
            if !order.contains(&request.name.as_str()) {
                order.push(&request.name);
            }
        }
        if target.scope() == Scope::Container {
            for entry in &self.backends {
                let resource = entry.backend.resource();
                if !order.contains(&resource) {
                    order.push(resource);
                }
            }
        }

        // One snapshot for the whole call
        let snapshot = self.catalog.snapshot();
        let mut mutations = Vec::new();

        for resource in order {
            let strategy = self.strategy(target.scope(), resource);
            let class = match self.resolve_with(&snapshot, &strategy, resource, target) {
                Ok(Some(class)) => class,
                Ok(None) => continue,
                Err(err @ QosError::DisabledBackend { .. }) => match &strategy {
                    Strategy::Backend(entry) if entry.ignore_not_enabled => {
                        info!(
                            event = "qos_soft_skip",
                            resource = %resource,
                            target = %target.name(),
                            error = %err,
                            "Continuing without QoS class, back-end not enabled"
                        );
                        continue;
                    }
                    _ => return Err(err),
                },
                Err(err) => return Err(err),
            };

            match &strategy {
                Strategy::Backend(entry) => mutations.push(entry.backend.to_mutation(&class)?),
                Strategy::SandboxNetwork => {}
                Strategy::Catalog => mutations.push(ConfigMutation::Vendor {
                    resource: resource.to_string(),
                    class,
                }),
            }
        }

        Ok(mutations)
    }
}
