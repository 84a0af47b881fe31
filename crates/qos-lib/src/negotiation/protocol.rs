//! Draft / adjust / merge cycle for sandbox networking
//!
//! A draft is built from the sandbox config and consumed by `negotiate`, so
//! each sandbox start gets exactly one round trip. Whatever the agent sends
//! back is merged field by field and the bandwidth class re-validated
//! against the catalog before the runtime uses it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use super::agent::{
    AdjustPodSandboxNetworkRequest, AdjustedNetworkConfig, CreatePodSandboxNetworkConfRequest,
    NetworkBandwidth, NetworkDraftConfig, PodSandboxInfo, PolicyAgent,
};
use crate::catalog::{CatalogSnapshot, NetworkPluginConfig};
use crate::error::{AgentError, QosError, Result};
use crate::models::PodSandboxConfig;
use crate::resolver::QosResolver;

/// CNI args the runtime always passes for a pod
pub const CNI_LABEL_POD_NAMESPACE: &str = "K8S_POD_NAMESPACE";
pub const CNI_LABEL_POD_NAME: &str = "K8S_POD_NAME";
pub const CNI_LABEL_POD_UID: &str = "K8S_POD_UID";
pub const CNI_LABEL_INFRA_CONTAINER_ID: &str = "K8S_POD_INFRA_CONTAINER_ID";
pub const CNI_LABEL_IGNORE_UNKNOWN: &str = "IgnoreUnknown";

/// What to do when the agent cannot be reached, times out or replies garbage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentFailurePolicy {
    /// Fail sandbox network setup
    Abort,
    /// Continue with the unmodified draft
    ProceedWithDraft,
}

#[derive(Debug, Clone)]
pub struct NegotiationOptions {
    pub failure_policy: AgentFailurePolicy,
    /// Upper bound on each agent call
    pub timeout: Duration,
}

/// How the final configuration came about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationOutcome {
    /// The agent changed at least one field
    Adjusted,
    /// The agent replied without changes
    Unchanged,
    /// The agent call failed and policy allowed the draft through
    ProceededWithDraft,
}

impl NegotiationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationOutcome::Adjusted => "adjusted",
            NegotiationOutcome::Unchanged => "unchanged",
            NegotiationOutcome::ProceededWithDraft => "proceeded_with_draft",
        }
    }
}

/// A sandbox network proposal that has not been sent yet
#[derive(Debug, Clone)]
pub struct SandboxNetworkDraft {
    pod: PodSandboxInfo,
    config: NetworkDraftConfig,
}

impl SandboxNetworkDraft {
    pub fn pod(&self) -> &PodSandboxInfo {
        &self.pod
    }

    pub fn config(&self) -> &NetworkDraftConfig {
        &self.config
    }
}

/// Final sandbox network configuration, owned by the runtime again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiatedNetwork {
    pub config: NetworkDraftConfig,
    pub outcome: NegotiationOutcome,
}

/// Runs the negotiation with one policy agent
pub struct NetworkNegotiator {
    resolver: Arc<QosResolver>,
    agent: Arc<dyn PolicyAgent>,
    options: NegotiationOptions,
}

impl NetworkNegotiator {
    pub fn new(
        resolver: Arc<QosResolver>,
        agent: Arc<dyn PolicyAgent>,
        options: NegotiationOptions,
    ) -> Self {
        Self {
            resolver,
            agent,
            options,
        }
    }

    pub fn options(&self) -> &NegotiationOptions {
        &self.options
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    /// Assemble the draft network configuration of a sandbox
    pub fn draft(&self, sandbox_id: &str, sandbox: &PodSandboxConfig) -> Result<SandboxNetworkDraft> {
        let bandwidth = self
            .resolver
            .resolve_sandbox_network(sandbox)?
            .map(|qos| NetworkBandwidth {
                class: qos.class,
                limits: qos.bandwidth,
            });

        let meta = &sandbox.metadata;
        let mut labels = sandbox.labels.clone();
        labels.insert(CNI_LABEL_POD_NAMESPACE.to_string(), meta.namespace.clone());
        labels.insert(CNI_LABEL_POD_NAME.to_string(), meta.name.clone());
        labels.insert(CNI_LABEL_INFRA_CONTAINER_ID.to_string(), sandbox_id.to_string());
        labels.insert(CNI_LABEL_POD_UID.to_string(), meta.uid.clone());
        labels.insert(CNI_LABEL_IGNORE_UNKNOWN.to_string(), "1".to_string());

        Ok(SandboxNetworkDraft {
            pod: PodSandboxInfo {
                id: sandbox_id.to_string(),
                name: meta.name.clone(),
                uid: meta.uid.clone(),
                namespace: meta.namespace.clone(),
                labels: sandbox.labels.clone(),
                annotations: sandbox.annotations.clone(),
            },
            config: NetworkDraftConfig {
                port_mappings: sandbox.port_mappings.clone(),
                bandwidth,
                labels,
                dns: sandbox.dns_config.clone().unwrap_or_default(),
            },
        })
    }

    /// Send the draft to the agent and merge its reply
    pub async fn negotiate(&self, draft: SandboxNetworkDraft) -> Result<NegotiatedNetwork> {
        let SandboxNetworkDraft { pod, config } = draft;
        let sandbox = pod.name.clone();
        let request = AdjustPodSandboxNetworkRequest {
            pod,
            draft: config.clone(),
        };

        let started = Instant::now();
        let reply = match timeout(
            self.options.timeout,
            self.agent.adjust_pod_sandbox_network(request),
        )
        .await
        {
            Ok(reply) => reply,
            Err(_) => Err(AgentError::Timeout(self.options.timeout)),
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => return self.on_agent_failure(&sandbox, config, err),
        };
        debug!(
            sandbox = %sandbox,
            agent = %self.agent.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Policy agent replied"
        );

        let outcome = if reply.is_untouched() {
            NegotiationOutcome::Unchanged
        } else {
            NegotiationOutcome::Adjusted
        };
        let snapshot = self.resolver.catalog().snapshot();
        let merged = merge_adjustment(&sandbox, &config, reply, &snapshot)?;

        info!(
            sandbox = %sandbox,
            outcome = outcome.as_str(),
            bandwidth_class = ?merged.bandwidth.as_ref().map(|b| b.class.as_str()),
            "Sandbox network negotiated"
        );
        Ok(NegotiatedNetwork {
            config: merged,
            outcome,
        })
    }

    fn on_agent_failure(
        &self,
        sandbox: &str,
        draft: NetworkDraftConfig,
        err: AgentError,
    ) -> Result<NegotiatedNetwork> {
        match self.options.failure_policy {
            AgentFailurePolicy::Abort => {
                warn!(sandbox = %sandbox, error = %err, "Policy agent call failed, aborting sandbox network setup");
                Err(QosError::AgentCall(err))
            }
            AgentFailurePolicy::ProceedWithDraft => {
                warn!(sandbox = %sandbox, error = %err, "Policy agent call failed, proceeding with draft");
                Ok(NegotiatedNetwork {
                    config: draft,
                    outcome: NegotiationOutcome::ProceededWithDraft,
                })
            }
        }
    }

    /// Send every loaded network configuration to the agent for inspection
    ///
    /// The reply is awaited and logged. Changes it proposes are not applied.
    pub async fn announce_network_configs(
        &self,
        plugin_config: &NetworkPluginConfig,
    ) -> std::result::Result<(), AgentError> {
        let request = CreatePodSandboxNetworkConfRequest {
            networks: plugin_config.networks.clone(),
        };
        let count = request.networks.len();

        let reply = timeout(
            self.options.timeout,
            self.agent.create_pod_sandbox_network_conf(request),
        )
        .await
        .map_err(|_| AgentError::Timeout(self.options.timeout))??;

        info!(
            agent = %self.agent.name(),
            networks = count,
            returned = reply.networks.len(),
            "Network configs sent to policy agent"
        );
        // TODO: apply networks returned by the agent once the reply semantics are agreed on
        Ok(())
    }
}

/// Overlay the agent's reply onto the draft and re-validate the resulting
/// bandwidth class against the current catalog
pub fn merge_adjustment(
    sandbox: &str,
    draft: &NetworkDraftConfig,
    reply: AdjustedNetworkConfig,
    catalog: &CatalogSnapshot,
) -> Result<NetworkDraftConfig> {
    let mut merged = draft.clone();
    reply.port_mappings.apply(&mut merged.port_mappings);
    reply.labels.apply(&mut merged.labels);
    reply.dns.apply(&mut merged.dns);
    reply.bandwidth.apply_option(&mut merged.bandwidth);

    // The catalog may have been rebuilt since the draft, so an untouched
    // class is checked too
    if let Some(bandwidth) = &merged.bandwidth {
        if bandwidth.class.is_empty() || catalog.network_class(&bandwidth.class).is_none() {
            return Err(QosError::NegotiationRejected {
                sandbox: sandbox.to_string(),
                reason: format!("unknown net class {:?}", bandwidth.class),
            });
        }
    }

    Ok(merged)
}
