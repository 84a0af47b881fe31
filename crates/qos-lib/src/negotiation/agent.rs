//! Messages exchanged with the external policy agent
//!
//! The transport is not defined here. Anything that can carry these
//! serde-serializable messages and return a reply implements `PolicyAgent`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::{BandwidthLimits, NetworkConfig};
use crate::error::AgentError;
use crate::models::{DnsConfig, PortMapping};

/// Agent's verdict on one field of the draft
///
/// `Untouched` is the sentinel for a field the agent did not look at, so a
/// partially populated reply never wipes drafted values. `Clear` resets the
/// field explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate<T> {
    Untouched,
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Untouched
    }
}

impl<T> FieldUpdate<T> {
    pub fn is_untouched(&self) -> bool {
        matches!(self, FieldUpdate::Untouched)
    }

    /// Apply to a field whose cleared state is its default value
    pub fn apply(self, field: &mut T)
    where
        T: Default,
    {
        match self {
            FieldUpdate::Untouched => {}
            FieldUpdate::Clear => *field = T::default(),
            FieldUpdate::Set(value) => *field = value,
        }
    }

    /// Apply to an optional field; clearing sets it to `None`
    pub fn apply_option(self, field: &mut Option<T>) {
        match self {
            FieldUpdate::Untouched => {}
            FieldUpdate::Clear => *field = None,
            FieldUpdate::Set(value) => *field = Some(value),
        }
    }
}

/// Bandwidth setting of a sandbox network, tied to a catalog class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkBandwidth {
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<BandwidthLimits>,
}

/// The runtime's proposal for a sandbox's network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDraftConfig {
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub bandwidth: Option<NetworkBandwidth>,
    /// Labels passed to the network plugin as CNI args
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub dns: DnsConfig,
}

/// Pod identity sent alongside the draft
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSandboxInfo {
    pub id: String,
    pub name: String,
    pub uid: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustPodSandboxNetworkRequest {
    pub pod: PodSandboxInfo,
    pub draft: NetworkDraftConfig,
}

/// The agent's reply; fields it may change, each defaulting to untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustedNetworkConfig {
    #[serde(default)]
    pub port_mappings: FieldUpdate<Vec<PortMapping>>,
    #[serde(default)]
    pub bandwidth: FieldUpdate<NetworkBandwidth>,
    #[serde(default)]
    pub labels: FieldUpdate<BTreeMap<String, String>>,
    #[serde(default)]
    pub dns: FieldUpdate<DnsConfig>,
}

impl AdjustedNetworkConfig {
    pub fn is_untouched(&self) -> bool {
        self.port_mappings.is_untouched()
            && self.bandwidth.is_untouched()
            && self.labels.is_untouched()
            && self.dns.is_untouched()
    }
}

/// Complete set of parsed network configurations, sent on every reload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePodSandboxNetworkConfRequest {
    pub networks: Vec<NetworkConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePodSandboxNetworkConfReply {
    /// Networks the agent would like changed. Not applied yet.
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

/// External policy agent consulted before sandbox networking is set up
#[async_trait]
pub trait PolicyAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn adjust_pod_sandbox_network(
        &self,
        request: AdjustPodSandboxNetworkRequest,
    ) -> Result<AdjustedNetworkConfig, AgentError>;

    async fn create_pod_sandbox_network_conf(
        &self,
        request: CreatePodSandboxNetworkConfRequest,
    ) -> Result<CreatePodSandboxNetworkConfReply, AgentError>;
}

/// Agent that accepts every draft unchanged
#[derive(Debug, Clone, Default)]
pub struct NoopPolicyAgent;

#[async_trait]
impl PolicyAgent for NoopPolicyAgent {
    fn name(&self) -> &str {
        "noop"
    }

    async fn adjust_pod_sandbox_network(
        &self,
        _request: AdjustPodSandboxNetworkRequest,
    ) -> Result<AdjustedNetworkConfig, AgentError> {
        Ok(AdjustedNetworkConfig::default())
    }

    async fn create_pod_sandbox_network_conf(
        &self,
        _request: CreatePodSandboxNetworkConfRequest,
    ) -> Result<CreatePodSandboxNetworkConfReply, AgentError> {
        Ok(CreatePodSandboxNetworkConfReply::default())
    }
}
