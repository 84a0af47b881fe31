//! Enforcement back-end interface for RDT and block-I/O
//!
//! The runtime never enforces classes itself. It asks the host back-end
//! whether the feature is enabled and which classes it knows, and lets the
//! back-end translate a class into the runtime-spec mutation it needs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::QosError;
use crate::models::{QOS_RESOURCE_BLOCKIO, QOS_RESOURCE_RDT};
use crate::resolver::{ConfigMutation, LinuxBlockIo};

/// Annotation keys consulted when a container carries no structured request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationKeys {
    /// Container annotation, e.g. `io.kubernetes.cri.rdt-class`
    pub container: String,
    /// Pod annotation prefix, suffixed with the container name
    pub pod_container_prefix: String,
    /// Pod-wide default annotation
    pub pod: String,
}

impl AnnotationKeys {
    pub fn for_resource(resource: &str) -> Self {
        Self {
            container: format!("io.kubernetes.cri.{resource}-class"),
            pod_container_prefix: format!("{resource}.resources.beta.kubernetes.io/container."),
            pod: format!("{resource}.resources.beta.kubernetes.io/pod"),
        }
    }

    /// Effective class from annotations: container, then per-container pod
    /// annotation, then the pod-wide default. `None` when nothing is set.
    pub fn class_from_annotations(
        &self,
        container_name: &str,
        container_annotations: &BTreeMap<String, String>,
        pod_annotations: &BTreeMap<String, String>,
    ) -> Option<String> {
        container_annotations
            .get(&self.container)
            .or_else(|| {
                pod_annotations.get(&format!("{}{}", self.pod_container_prefix, container_name))
            })
            .or_else(|| pod_annotations.get(&self.pod))
            .filter(|class| !class.is_empty())
            .cloned()
    }
}

/// A host enforcement back-end queried during resolution
pub trait QosBackend: Send + Sync {
    /// Resource type this back-end serves ("rdt", "blockio")
    fn resource(&self) -> &str;

    fn is_enabled(&self) -> bool;

    fn class_exists(&self, class: &str) -> bool;

    /// Classes the back-end currently knows, in its configured order
    fn classes(&self) -> Vec<String>;

    /// Translate a validated class into a runtime-spec mutation
    fn to_mutation(&self, class: &str) -> Result<ConfigMutation, QosError>;

    fn annotation_keys(&self) -> AnnotationKeys {
        AnnotationKeys::for_resource(self.resource())
    }
}

/// Per-class settings of a configured back-end
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub name: String,
    /// Block-I/O weight (10-1000)
    #[serde(default)]
    pub weight: Option<u16>,
    #[serde(default)]
    pub throttle_read_bps: Option<u64>,
    #[serde(default)]
    pub throttle_write_bps: Option<u64>,
}

/// Back-end description as read from the daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub classes: Vec<ClassSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Rdt,
    BlockIo,
}

/// Back-end whose state comes from configuration rather than host discovery
#[derive(Debug, Clone)]
pub struct ConfiguredBackend {
    kind: BackendKind,
    spec: BackendSpec,
}

impl ConfiguredBackend {
    pub fn rdt(spec: BackendSpec) -> Self {
        Self {
            kind: BackendKind::Rdt,
            spec,
        }
    }

    pub fn blockio(spec: BackendSpec) -> Self {
        Self {
            kind: BackendKind::BlockIo,
            spec,
        }
    }

    fn class(&self, name: &str) -> Option<&ClassSpec> {
        self.spec.classes.iter().find(|c| c.name == name)
    }
}

impl QosBackend for ConfiguredBackend {
    fn resource(&self) -> &str {
        match self.kind {
            BackendKind::Rdt => QOS_RESOURCE_RDT,
            BackendKind::BlockIo => QOS_RESOURCE_BLOCKIO,
        }
    }

    fn is_enabled(&self) -> bool {
        self.spec.enabled
    }

    fn class_exists(&self, class: &str) -> bool {
        self.spec.enabled && self.class(class).is_some()
    }

    fn classes(&self) -> Vec<String> {
        if !self.spec.enabled {
            return Vec::new();
        }
        self.spec.classes.iter().map(|c| c.name.clone()).collect()
    }

    fn to_mutation(&self, class: &str) -> Result<ConfigMutation, QosError> {
        let spec = self.class(class).ok_or_else(|| QosError::UnknownClass {
            resource: self.resource().to_string(),
            class: class.to_string(),
        })?;

        Ok(match self.kind {
            BackendKind::Rdt => ConfigMutation::Rdt {
                class: class.to_string(),
            },
            BackendKind::BlockIo => ConfigMutation::BlockIo {
                class: class.to_string(),
                block_io: LinuxBlockIo {
                    weight: spec.weight,
                    throttle_read_bps: spec.throttle_read_bps,
                    throttle_write_bps: spec.throttle_write_bps,
                },
            },
        })
    }
}
