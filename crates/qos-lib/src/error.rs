//! Error types for QoS resolution, catalog rebuilds and negotiation

use std::time::Duration;
use thiserror::Error;

use crate::catalog::Scope;

/// Errors raised while resolving QoS requests or negotiating sandbox networking
#[derive(Debug, Error)]
pub enum QosError {
    #[error("unknown {scope}-level QoS resource type {resource:?}")]
    UnknownResourceType { scope: Scope, resource: String },

    #[error("unknown {resource} class {class:?}")]
    UnknownClass { resource: String, class: String },

    #[error("empty class name not allowed for QoS resource type {resource:?}")]
    EmptyClassNotAllowed { resource: String },

    #[error("{resource} disabled, refusing to set {resource} class of container {container:?} to {class:?}")]
    DisabledBackend {
        resource: String,
        container: String,
        class: String,
    },

    #[error("duplicate class {class:?} in QoS resource type {resource:?}")]
    DuplicateClass { resource: String, class: String },

    #[error("{scope}-level QoS resource type {resource:?} registered twice")]
    DuplicateResourceType { scope: Scope, resource: String },

    #[error(transparent)]
    CatalogParse(#[from] CatalogParseError),

    #[error("policy agent call failed: {0}")]
    AgentCall(#[from] AgentError),

    #[error("network negotiation rejected for sandbox {sandbox:?}: {reason}")]
    NegotiationRejected { sandbox: String, reason: String },
}

impl QosError {
    /// Stable machine-readable kind, used for metrics labels and API replies
    pub fn kind(&self) -> &'static str {
        match self {
            QosError::UnknownResourceType { .. } => "unknown_resource_type",
            QosError::UnknownClass { .. } => "unknown_class",
            QosError::EmptyClassNotAllowed { .. } => "empty_class_not_allowed",
            QosError::DisabledBackend { .. } => "disabled_backend",
            QosError::DuplicateClass { .. } => "duplicate_class",
            QosError::DuplicateResourceType { .. } => "duplicate_resource_type",
            QosError::CatalogParse(_) => "catalog_parse_error",
            QosError::AgentCall(_) => "agent_call_error",
            QosError::NegotiationRejected { .. } => "negotiation_rejected",
        }
    }
}

/// Malformed or missing network plugin configuration
#[derive(Debug, Error)]
pub enum CatalogParseError {
    #[error("unable to parse CNI config for QoS resources: expected at least 2 networks, found {found}")]
    NotEnoughNetworks { found: usize },

    #[error("failed to parse CNI config for QoS resources: {source} (config: {raw})")]
    Decode {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read CNI config from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to reach or understand the external policy agent
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("policy agent unreachable: {0}")]
    Unreachable(String),

    #[error("policy agent did not reply within {0:?}")]
    Timeout(Duration),

    #[error("malformed policy agent reply: {0}")]
    MalformedReply(String),
}

pub type Result<T, E = QosError> = std::result::Result<T, E>;
