//! Capability catalog
//!
//! Registry of the QoS resource types this node can honour, partitioned into
//! pod scope and container scope. The scheduler queries it to learn what can
//! be requested and the resolver validates requests against it.
//!
//! The catalog is an immutable snapshot behind an atomic reference. Reloading
//! the network plugin configuration builds a complete new snapshot and swaps
//! it in, so concurrent resolutions observe either the old or the new
//! catalog and never a mix.

mod cni;
mod placeholder;


pub use cni::{
    extract_bandwidth_classes, BandwidthLimits, CniQosClass, NetworkConfig, NetworkPluginConfig,
    LOOPBACK_NETWORK_NAME,
};
pub use placeholder::PlaceholderResources;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::QosBackend;
use crate::error::{CatalogParseError, QosError};
use crate::models::{ResourceClass, ResourceType, QOS_RESOURCE_NET};

/// Level at which a QoS resource is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Pod,
    Container,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Pod => write!(f, "pod"),
            Scope::Container => write!(f, "container"),
        }
    }
}

/// A pluggable provider of resource types registered at catalog construction
///
/// Used for vendor-defined types that are not wired to a real enforcement
/// back-end. Deployments that do not need them simply register no source.
pub trait ResourceTypeSource: Send + Sync {
    fn name(&self) -> &str;

    fn resource_types(&self, scope: Scope) -> Vec<ResourceType>;
}

/// Immutable view of the catalog at one point in time
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pod: Vec<ResourceType>,
    container: Vec<ResourceType>,
    network: BTreeMap<String, CniQosClass>,
}

impl CatalogSnapshot {
    /// The "net" resource type, if the plugin advertises any class
    pub fn network_resource(&self) -> Option<ResourceType> {
        if self.network.is_empty() {
            return None;
        }
        Some(ResourceType {
            name: QOS_RESOURCE_NET.to_string(),
            mutable: false,
            classes: self
                .network
                .iter()
                .map(|(name, class)| ResourceClass {
                    name: name.clone(),
                    capacity: class.capacity,
                })
                .collect(),
        })
    }

    /// Advertised resource types for a scope, in stable order
    pub fn resource_types(&self, scope: Scope) -> Vec<ResourceType> {
        match scope {
            Scope::Pod => self
                .network_resource()
                .into_iter()
                .chain(self.pod.iter().cloned())
                .collect(),
            Scope::Container => self.container.clone(),
        }
    }

    /// Whether the scope's catalog knows the resource type at all
    pub fn has_resource(&self, scope: Scope, resource: &str) -> bool {
        match scope {
            Scope::Pod if resource == QOS_RESOURCE_NET => !self.network.is_empty(),
            Scope::Pod => self.pod.iter().any(|r| r.name == resource),
            Scope::Container => self.container.iter().any(|r| r.name == resource),
        }
    }

    pub fn lookup_class(&self, scope: Scope, resource: &str, class: &str) -> bool {
        match scope {
            Scope::Pod if resource == QOS_RESOURCE_NET => self.network.contains_key(class),
            Scope::Pod => self
                .pod
                .iter()
                .any(|r| r.name == resource && r.has_class(class)),
            Scope::Container => self
                .container
                .iter()
                .any(|r| r.name == resource && r.has_class(class)),
        }
    }

    pub fn network_class(&self, class: &str) -> Option<&CniQosClass> {
        self.network.get(class)
    }

    pub fn network_classes(&self) -> &BTreeMap<String, CniQosClass> {
        &self.network
    }
}

/// Shared, atomically swappable capability catalog
pub struct CapabilityCatalog {
    snapshot: ArcSwap<CatalogSnapshot>,
}

impl std::fmt::Debug for CapabilityCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityCatalog")
            .field("snapshot", &self.snapshot.load())
            .finish()
    }
}

impl Default for CapabilityCatalog {
    fn default() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(CatalogSnapshot::default()),
        }
    }
}

impl CapabilityCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Current snapshot; stays valid even if the catalog is rebuilt meanwhile
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.load_full()
    }

    /// Pod-level resource types for the scheduler
    pub fn advertise_pod_resources(&self) -> Vec<ResourceType> {
        self.snapshot.load().resource_types(Scope::Pod)
    }

    /// Container-level resource types for the scheduler
    pub fn advertise_container_resources(&self) -> Vec<ResourceType> {
        self.snapshot.load().resource_types(Scope::Container)
    }

    pub fn lookup_class(&self, scope: Scope, resource: &str, class: &str) -> bool {
        self.snapshot.load().lookup_class(scope, resource, class)
    }

    pub fn network_class(&self, class: &str) -> Option<CniQosClass> {
        self.snapshot.load().network_class(class).cloned()
    }

    /// Re-derive the "net" classes from the plugin configuration
    ///
    /// On error the previous catalog stays in effect. Returns the number of
    /// network classes now advertised.
    pub fn rebuild_network_catalog(
        &self,
        plugin_config: &NetworkPluginConfig,
    ) -> Result<usize, CatalogParseError> {
        let classes = match extract_bandwidth_classes(plugin_config) {
            Ok(classes) => classes,
            Err(e) => {
                warn!(error = %e, "Network catalog rebuild failed, keeping previous catalog");
                return Err(e);
            }
        };

        let count = classes.len();
        self.snapshot.rcu(|current| {
            let mut next = CatalogSnapshot::clone(current);
            next.network = classes.clone();
            next
        });

        info!(classes = count, "Network QoS catalog rebuilt");
        Ok(count)
    }
}

/// Assembles the static part of the catalog at process start
#[derive(Default)]
pub struct CatalogBuilder {
    pod: Vec<ResourceType>,
    container: Vec<ResourceType>,
    network: BTreeMap<String, CniQosClass>,
}

impl CatalogBuilder {
    pub fn register(mut self, scope: Scope, resource: ResourceType) -> Self {
        match scope {
            Scope::Pod => self.pod.push(resource),
            Scope::Container => self.container.push(resource),
        }
        self
    }

    /// Advertise a back-end's classes at container scope (skipped when empty)
    pub fn with_backend(self, backend: &dyn QosBackend) -> Self {
        let classes = backend.classes();
        if classes.is_empty() {
            return self;
        }
        self.register(
            Scope::Container,
            ResourceType::fixed(backend.resource(), classes),
        )
    }

    pub fn with_source(mut self, source: &dyn ResourceTypeSource) -> Self {
        for scope in [Scope::Pod, Scope::Container] {
            for resource in source.resource_types(scope) {
                self = self.register(scope, resource);
            }
        }
        self
    }

    pub fn with_network_classes(mut self, classes: BTreeMap<String, CniQosClass>) -> Self {
        self.network = classes;
        self
    }

    /// Validate uniqueness invariants and produce the catalog
    pub fn build(self) -> Result<CapabilityCatalog, QosError> {
        for (scope, resources) in [(Scope::Pod, &self.pod), (Scope::Container, &self.container)] {
            for (i, resource) in resources.iter().enumerate() {
                let reserved = scope == Scope::Pod && resource.name == QOS_RESOURCE_NET;
                if reserved || resources[..i].iter().any(|r| r.name == resource.name) {
                    return Err(QosError::DuplicateResourceType {
                        scope,
                        resource: resource.name.clone(),
                    });
                }
                if let Some(class) = resource.duplicate_class() {
                    return Err(QosError::DuplicateClass {
                        resource: resource.name.clone(),
                        class: class.to_string(),
                    });
                }
            }
        }

        Ok(CapabilityCatalog {
            snapshot: ArcSwap::from_pointee(CatalogSnapshot {
                pod: self.pod,
                container: self.container,
                network: self.network,
            }),
        })
    }
}
