//! Sandbox network negotiation with an external policy agent
//!
//! This module provides:
//! - The message shapes exchanged with the agent
//! - The one-shot draft / adjust / merge protocol
//! - The bulk network configuration announcement sent on reload

mod agent;
mod protocol;

#[cfg(test)]
mod tests;

pub use agent::{
    AdjustPodSandboxNetworkRequest, AdjustedNetworkConfig, CreatePodSandboxNetworkConfReply,
    CreatePodSandboxNetworkConfRequest, FieldUpdate, NetworkBandwidth, NetworkDraftConfig,
    NoopPolicyAgent, PodSandboxInfo, PolicyAgent,
};
pub use protocol::{
    merge_adjustment, AgentFailurePolicy, NegotiatedNetwork, NegotiationOptions,
    NegotiationOutcome, NetworkNegotiator, SandboxNetworkDraft, CNI_LABEL_IGNORE_UNKNOWN,
    CNI_LABEL_INFRA_CONTAINER_ID, CNI_LABEL_POD_NAME, CNI_LABEL_POD_NAMESPACE, CNI_LABEL_POD_UID,
};
