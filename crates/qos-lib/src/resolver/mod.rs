//! QoS class resolution
//!
//! One resolver serves both pod and container scope. Each resource type is
//! routed through a strategy picked from a small table:
//!
//! - container-scope types served by an enforcement back-end (RDT,
//!   block-I/O): structured request first, annotations as fallback, then the
//!   back-end's enablement and class checks
//! - pod-scope "net": lookup in the network part of the catalog
//! - everything else: structured request only, validated against the
//!   catalog entry for the scope

mod mutations;

#[cfg(test)]
mod tests;

pub use mutations::{ConfigMutation, LinuxBlockIo, NetworkQos};

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::QosBackend;
use crate::catalog::{CapabilityCatalog, CatalogSnapshot, Scope};
use crate::error::{QosError, Result};
use crate::models::{ContainerConfig, PodSandboxConfig, QosRequest, QOS_RESOURCE_NET};

/// What is being resolved: a sandbox, or a container inside its sandbox
#[derive(Debug, Clone, Copy)]
pub enum ResolutionTarget<'a> {
    Sandbox(&'a PodSandboxConfig),
    Container {
        container: &'a ContainerConfig,
        sandbox: &'a PodSandboxConfig,
    },
}

impl<'a> ResolutionTarget<'a> {
    pub fn scope(&self) -> Scope {
        match self {
            ResolutionTarget::Sandbox(_) => Scope::Pod,
            ResolutionTarget::Container { .. } => Scope::Container,
        }
    }

    pub fn requests(&self) -> &'a [QosRequest] {
        match self {
            ResolutionTarget::Sandbox(sandbox) => &sandbox.qos_resources,
            ResolutionTarget::Container { container, .. } => &container.qos_resources,
        }
    }

    /// Container name, or sandbox name at pod scope
    pub fn name(&self) -> &'a str {
        match self {
            ResolutionTarget::Sandbox(sandbox) => &sandbox.metadata.name,
            ResolutionTarget::Container { container, .. } => &container.metadata.name,
        }
    }

    fn container_annotations(&self) -> Option<&'a BTreeMap<String, String>> {
        match self {
            ResolutionTarget::Sandbox(_) => None,
            ResolutionTarget::Container { container, .. } => Some(&container.annotations),
        }
    }

    fn pod_annotations(&self) -> &'a BTreeMap<String, String> {
        match self {
            ResolutionTarget::Sandbox(sandbox) => &sandbox.annotations,
            ResolutionTarget::Container { sandbox, .. } => &sandbox.annotations,
        }
    }

    /// Last structured request for the resource type; later requests win
    fn request(&self, resource: &str) -> Option<&'a QosRequest> {
        self.requests().iter().rev().find(|r| r.name == resource)
    }
}

struct BackendEntry {
    backend: Arc<dyn QosBackend>,
    ignore_not_enabled: bool,
}

enum Strategy<'r> {
    Backend(&'r BackendEntry),
    SandboxNetwork,
    Catalog,
}

/// Resolves QoS requests against the shared catalog and host back-ends
pub struct QosResolver {
    catalog: Arc<CapabilityCatalog>,
    backends: Vec<BackendEntry>,
}

impl QosResolver {
    pub fn new(catalog: Arc<CapabilityCatalog>) -> Self {
        Self {
            catalog,
            backends: Vec::new(),
        }
    }

    /// Route a container-scope resource type through an enforcement back-end
    ///
    /// With `ignore_not_enabled`, a class requested while the back-end is
    /// disabled is logged and skipped instead of failing the container.
    pub fn with_backend(mut self, backend: Arc<dyn QosBackend>, ignore_not_enabled: bool) -> Self {
        self.backends.push(BackendEntry {
            backend,
            ignore_not_enabled,
        });
        self
    }

    pub fn catalog(&self) -> &Arc<CapabilityCatalog> {
        &self.catalog
    }

    fn strategy(&self, scope: Scope, resource: &str) -> Strategy<'_> {
        match scope {
            Scope::Pod if resource == QOS_RESOURCE_NET => Strategy::SandboxNetwork,
            Scope::Pod => Strategy::Catalog,
            Scope::Container => self
                .backends
                .iter()
                .find(|entry| entry.backend.resource() == resource)
                .map(Strategy::Backend)
                .unwrap_or(Strategy::Catalog),
        }
    }

    /// Resolve the effective class of one resource type for a target
    ///
    /// `Ok(None)` means the resource was never requested.
    pub fn resolve(&self, resource: &str, target: &ResolutionTarget<'_>) -> Result<Option<String>> {
        let snapshot = self.catalog.snapshot();
        let strategy = self.strategy(target.scope(), resource);
        self.resolve_with(&snapshot, &strategy, resource, target)
    }

    fn resolve_with(
        &self,
        snapshot: &CatalogSnapshot,
        strategy: &Strategy<'_>,
        resource: &str,
        target: &ResolutionTarget<'_>,
    ) -> Result<Option<String>> {
        match strategy {
            Strategy::Backend(entry) => resolve_backend(entry.backend.as_ref(), resource, target),
            Strategy::SandboxNetwork => {
                let Some(class) = requested_class(resource, target)? else {
                    return Ok(None);
                };
                if snapshot.network_class(&class).is_none() {
                    return Err(QosError::UnknownClass {
                        resource: resource.to_string(),
                        class,
                    });
                }
                Ok(Some(class))
            }
            Strategy::Catalog => {
                let Some(class) = requested_class(resource, target)? else {
                    return Ok(None);
                };
                let scope = target.scope();
                if !snapshot.has_resource(scope, resource) {
                    return Err(QosError::UnknownResourceType {
                        scope,
                        resource: resource.to_string(),
                    });
                }
                if !snapshot.lookup_class(scope, resource, &class) {
                    return Err(QosError::UnknownClass {
                        resource: resource.to_string(),
                        class,
                    });
                }
                info!(
                    resource = %resource,
                    class = %class,
                    target = %target.name(),
                    "Setting QoS resource"
                );
                Ok(Some(class))
            }
        }
    }
}

/// Class of a structured request; a present request must name a class
fn requested_class(resource: &str, target: &ResolutionTarget<'_>) -> Result<Option<String>> {
    match target.request(resource) {
        None => Ok(None),
        Some(request) if request.class.is_empty() => Err(QosError::EmptyClassNotAllowed {
            resource: resource.to_string(),
        }),
        Some(request) => Ok(Some(request.class.clone())),
    }
}

fn resolve_backend(
    backend: &dyn QosBackend,
    resource: &str,
    target: &ResolutionTarget<'_>,
) -> Result<Option<String>> {
    let name = target.name();

    let class = match requested_class(resource, target)? {
        Some(class) => {
            debug!(resource = %resource, class = %class, container = %name, "Class from container config");
            class
        }
        None => {
            let empty = BTreeMap::new();
            let container_annotations = target.container_annotations().unwrap_or(&empty);
            let from_annotations = backend.annotation_keys().class_from_annotations(
                name,
                container_annotations,
                target.pod_annotations(),
            );
            match from_annotations {
                Some(class) => {
                    debug!(resource = %resource, class = %class, container = %name, "Class from annotations");
                    class
                }
                None => return Ok(None),
            }
        }
    };

    if !backend.is_enabled() {
        return Err(QosError::DisabledBackend {
            resource: resource.to_string(),
            container: name.to_string(),
            class,
        });
    }
    if !backend.class_exists(&class) {
        return Err(QosError::UnknownClass {
            resource: resource.to_string(),
            class,
        });
    }
    Ok(Some(class))
}
