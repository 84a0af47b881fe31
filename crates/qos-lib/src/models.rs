//! Core data models for QoS resolution
//!
//! Mirrors the shapes the orchestration layer hands to the runtime on sandbox
//! and container creation, plus the resource types the runtime advertises
//! back to the scheduler.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the network bandwidth QoS resource
pub const QOS_RESOURCE_NET: &str = "net";
/// Name of the RDT (cache / memory bandwidth) QoS resource
pub const QOS_RESOURCE_RDT: &str = "rdt";
/// Name of the block-I/O QoS resource
pub const QOS_RESOURCE_BLOCKIO: &str = "blockio";

/// A named tier within a QoS resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceClass {
    pub name: String,
    /// Max number of simultaneous consumers, when bounded. Advertisement only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
}

impl ResourceClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: None,
        }
    }

    pub fn with_capacity(name: impl Into<String>, capacity: u64) -> Self {
        Self {
            name: name.into(),
            capacity: Some(capacity),
        }
    }
}

/// A QoS dimension and the classes that may be requested for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub name: String,
    /// `false` means the classes are a fixed capability advertisement
    pub mutable: bool,
    pub classes: Vec<ResourceClass>,
}

impl ResourceType {
    /// Build an immutable resource type from plain class names
    pub fn fixed<I, S>(name: impl Into<String>, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            mutable: false,
            classes: classes.into_iter().map(ResourceClass::new).collect(),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c.name == class)
    }

    /// Name of the first class that appears more than once, if any
    pub fn duplicate_class(&self) -> Option<&str> {
        self.classes.iter().enumerate().find_map(|(i, c)| {
            self.classes[..i]
                .iter()
                .any(|prev| prev.name == c.name)
                .then_some(c.name.as_str())
        })
    }
}

/// A request for one class of one QoS resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosRequest {
    /// Resource type name ("rdt", "blockio", "net", vendor names)
    pub name: String,
    #[serde(default)]
    pub class: String,
}

impl QosRequest {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
        }
    }
}

/// Pod sandbox metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSandboxMetadata {
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub attempt: u32,
}

/// Container metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    pub name: String,
    #[serde(default)]
    pub attempt: u32,
}

/// Transport protocol of a port mapping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Sctp => write!(f, "sctp"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    #[serde(default)]
    pub protocol: Protocol,
    pub container_port: u16,
    #[serde(default)]
    pub host_port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub searches: Vec<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

impl DnsConfig {
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty() && self.searches.is_empty() && self.options.is_empty()
    }
}

/// Pod-level configuration handed over on sandbox creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSandboxConfig {
    pub metadata: PodSandboxMetadata,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub dns_config: Option<DnsConfig>,
    #[serde(default)]
    pub qos_resources: Vec<QosRequest>,
}

/// Container-level configuration handed over on container creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub metadata: ContainerMetadata,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub qos_resources: Vec<QosRequest>,
}
