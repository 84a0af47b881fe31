//! QoS resource resolution for a container runtime
//!
//! This crate provides the core functionality for:
//! - Advertising the QoS resource types and classes a node supports
//! - Resolving pod and container QoS requests into runtime-spec mutations
//! - Deriving network bandwidth classes from the CNI plugin configuration
//! - Negotiating sandbox networking with an external policy agent
//! - Health checks and observability

pub mod backend;
pub mod catalog;
pub mod error;
pub mod health;
pub mod models;
pub mod negotiation;
pub mod observability;
pub mod resolver;

pub use backend::{BackendSpec, ClassSpec, ConfiguredBackend, QosBackend};
pub use catalog::{CapabilityCatalog, CatalogSnapshot, NetworkPluginConfig, Scope};
pub use error::{AgentError, CatalogParseError, QosError, Result};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use negotiation::{NetworkNegotiator, PolicyAgent};
pub use observability::{QosMetrics, StructuredLogger};
pub use resolver::{ConfigMutation, QosResolver, ResolutionTarget};
