//! Resolution and mutation generation tests
//!
//! Back-ends are configured in memory; the network catalog is fed a plugin
//! configuration the same way a reload would.

use super::*;
use crate::backend::{BackendSpec, ClassSpec, ConfiguredBackend};
use crate::catalog::{
    NetworkConfig, NetworkPluginConfig, PlaceholderResources, LOOPBACK_NETWORK_NAME,
};
use crate::models::{ContainerMetadata, PodSandboxMetadata, QOS_RESOURCE_BLOCKIO, QOS_RESOURCE_RDT};

fn spec(enabled: bool, classes: &[&str]) -> BackendSpec {
    BackendSpec {
        enabled,
        classes: classes
            .iter()
            .map(|name| ClassSpec {
                name: name.to_string(),
                weight: Some(200),
                ..Default::default()
            })
            .collect(),
    }
}

struct Fixture {
    rdt: BackendSpec,
    blockio: BackendSpec,
    ignore_rdt: bool,
    ignore_blockio: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            rdt: spec(true, &["gold", "silver", "bronze"]),
            blockio: spec(true, &["fast", "slow"]),
            ignore_rdt: false,
            ignore_blockio: false,
        }
    }
}

impl Fixture {
    fn resolver(self) -> QosResolver {
        let rdt = Arc::new(ConfiguredBackend::rdt(self.rdt));
        let blockio = Arc::new(ConfiguredBackend::blockio(self.blockio));

        let catalog = CapabilityCatalog::builder()
            .with_backend(rdt.as_ref())
            .with_backend(blockio.as_ref())
            .with_source(&PlaceholderResources)
            .build()
            .unwrap();
        catalog
            .rebuild_network_catalog(&NetworkPluginConfig::new(vec![
                NetworkConfig {
                    name: LOOPBACK_NETWORK_NAME.to_string(),
                    source: "{}".to_string(),
                },
                NetworkConfig {
                    name: "podnet".to_string(),
                    source: r#"{"name":"podnet","qos":{
                        "gold":{"capacity":2,"bandwidth":{"ingressRate":10000000,"egressRate":10000000}},
                        "bronze":{"capacity":50}
                    }}"#
                    .to_string(),
                },
            ]))
            .unwrap();

        QosResolver::new(Arc::new(catalog))
            .with_backend(rdt, self.ignore_rdt)
            .with_backend(blockio, self.ignore_blockio)
    }
}

fn sandbox(requests: &[(&str, &str)]) -> PodSandboxConfig {
    PodSandboxConfig {
        metadata: PodSandboxMetadata {
            name: "web-0".to_string(),
            uid: "uid-1".to_string(),
            namespace: "default".to_string(),
            attempt: 0,
        },
        qos_resources: requests.iter().map(|(n, c)| QosRequest::new(*n, *c)).collect(),
        ..Default::default()
    }
}

fn container(requests: &[(&str, &str)]) -> ContainerConfig {
    ContainerConfig {
        metadata: ContainerMetadata {
            name: "app".to_string(),
            attempt: 0,
        },
        qos_resources: requests.iter().map(|(n, c)| QosRequest::new(*n, *c)).collect(),
        ..Default::default()
    }
}

mod backend_resolution {
    use super::*;

    #[test]
    fn test_structured_request_resolves() {
        let resolver = Fixture::default().resolver();
        let pod = sandbox(&[]);
        let ctr = container(&[(QOS_RESOURCE_RDT, "gold")]);

        let class = resolver
            .resolve(
                QOS_RESOURCE_RDT,
                &ResolutionTarget::Container {
                    container: &ctr,
                    sandbox: &pod,
                },
            )
            .unwrap();
        assert_eq!(class.as_deref(), Some("gold"));
    }

    #[test]
    fn test_structured_request_beats_annotation() {
        let resolver = Fixture::default().resolver();
        let pod = sandbox(&[]);
        let mut ctr = container(&[(QOS_RESOURCE_RDT, "gold")]);
        ctr.annotations
            .insert("io.kubernetes.cri.rdt-class".to_string(), "silver".to_string());

        let mutations = resolver.generate_container_mutations(&ctr, &pod).unwrap();
        assert_eq!(
            mutations,
            vec![ConfigMutation::Rdt {
                class: "gold".to_string()
            }]
        );
    }

    #[test]
    fn test_annotation_fallback_when_not_requested() {
        let resolver = Fixture::default().resolver();
        let mut pod = sandbox(&[]);
        pod.annotations.insert(
            "blockio.resources.beta.kubernetes.io/pod".to_string(),
            "slow".to_string(),
        );
        let ctr = container(&[]);

        let mutations = resolver.generate_container_mutations(&ctr, &pod).unwrap();
        assert_eq!(
            mutations,
            vec![ConfigMutation::BlockIo {
                class: "slow".to_string(),
                block_io: LinuxBlockIo {
                    weight: Some(200),
                    ..Default::default()
                },
            }]
        );
    }

    #[test]
    fn test_absent_request_yields_nothing() {
        let resolver = Fixture::default().resolver();
        let pod = sandbox(&[]);
        let ctr = container(&[]);

        assert_eq!(
            resolver
                .resolve(
                    QOS_RESOURCE_BLOCKIO,
                    &ResolutionTarget::Container {
                        container: &ctr,
                        sandbox: &pod
                    }
                )
                .unwrap(),
            None
        );
        assert!(resolver
            .generate_container_mutations(&ctr, &pod)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unknown_backend_class() {
        let resolver = Fixture::default().resolver();
        let err = resolver
            .generate_container_mutations(&container(&[(QOS_RESOURCE_RDT, "diamond")]), &sandbox(&[]))
            .unwrap_err();

        assert!(matches!(
            err,
            QosError::UnknownClass { ref resource, ref class } if resource == "rdt" && class == "diamond"
        ));
    }

    #[test]
    fn test_unknown_annotation_class_is_an_error() {
        let resolver = Fixture::default().resolver();
        let mut ctr = container(&[]);
        ctr.annotations
            .insert("io.kubernetes.cri.rdt-class".to_string(), "diamond".to_string());

        let err = resolver
            .generate_container_mutations(&ctr, &sandbox(&[]))
            .unwrap_err();
        assert_eq!(err.kind(), "unknown_class");
    }

    #[test]
    fn test_disabled_backend_fails_without_ignore() {
        let resolver = Fixture {
            rdt: spec(false, &["gold"]),
            ..Default::default()
        }
        .resolver();

        let err = resolver
            .generate_container_mutations(&container(&[(QOS_RESOURCE_RDT, "gold")]), &sandbox(&[]))
            .unwrap_err();
        assert!(matches!(
            err,
            QosError::DisabledBackend { ref container, .. } if container == "app"
        ));
    }

    #[test]
    fn test_disabled_backend_skipped_with_ignore() {
        let resolver = Fixture {
            rdt: spec(false, &["gold"]),
            ignore_rdt: true,
            ..Default::default()
        }
        .resolver();

        let mutations = resolver
            .generate_container_mutations(
                &container(&[(QOS_RESOURCE_RDT, "gold"), (QOS_RESOURCE_BLOCKIO, "fast")]),
                &sandbox(&[]),
            )
            .unwrap();
        assert_eq!(mutations.len(), 1);
        assert!(matches!(mutations[0], ConfigMutation::BlockIo { .. }));
    }

    #[test]
    fn test_ignore_does_not_cover_other_backend() {
        let resolver = Fixture {
            blockio: spec(false, &["fast"]),
            ignore_rdt: true,
            ..Default::default()
        }
        .resolver();

        let err = resolver
            .generate_container_mutations(
                &container(&[(QOS_RESOURCE_BLOCKIO, "fast")]),
                &sandbox(&[]),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "disabled_backend");
    }

    #[test]
    fn test_ignore_never_covers_unknown_class() {
        let resolver = Fixture {
            ignore_rdt: true,
            ignore_blockio: true,
            ..Default::default()
        }
        .resolver();

        let err = resolver
            .generate_container_mutations(&container(&[(QOS_RESOURCE_RDT, "diamond")]), &sandbox(&[]))
            .unwrap_err();
        assert_eq!(err.kind(), "unknown_class");
    }
}

mod generic_resolution {
    use super::*;

    #[test]
    fn test_vendor_class_yields_single_mutation() {
        let resolver = Fixture::default().resolver();
        let mutations = resolver
            .generate_container_mutations(&container(&[("dummy-2", "gold")]), &sandbox(&[]))
            .unwrap();

        assert_eq!(
            mutations,
            vec![ConfigMutation::Vendor {
                resource: "dummy-2".to_string(),
                class: "gold".to_string(),
            }]
        );
    }

    #[test]
    fn test_unknown_resource_type_per_scope() {
        let resolver = Fixture::default().resolver();

        let err = resolver
            .generate_container_mutations(&container(&[("podres-1", "qos-a")]), &sandbox(&[]))
            .unwrap_err();
        assert!(matches!(
            err,
            QosError::UnknownResourceType { scope: Scope::Container, .. }
        ));

        let err = resolver
            .generate_sandbox_mutations(&sandbox(&[("dummy-1", "class-a")]))
            .unwrap_err();
        assert!(matches!(
            err,
            QosError::UnknownResourceType { scope: Scope::Pod, .. }
        ));
    }

    #[test]
    fn test_unknown_vendor_class() {
        let resolver = Fixture::default().resolver();
        let err = resolver
            .generate_sandbox_mutations(&sandbox(&[("podres-2", "cls-9")]))
            .unwrap_err();
        assert_eq!(err.kind(), "unknown_class");
    }

    #[test]
    fn test_empty_class_rejected_for_every_type() {
        let resolver = Fixture::default().resolver();

        for resource in [QOS_RESOURCE_RDT, QOS_RESOURCE_BLOCKIO, "dummy-1", "no-such-type"] {
            let err = resolver
                .generate_container_mutations(&container(&[(resource, "")]), &sandbox(&[]))
                .unwrap_err();
            assert!(
                matches!(err, QosError::EmptyClassNotAllowed { resource: ref r } if r == resource),
                "{resource}: {err}"
            );
        }

        for resource in [QOS_RESOURCE_NET, "podres-1"] {
            let err = resolver
                .generate_sandbox_mutations(&sandbox(&[(resource, "")]))
                .unwrap_err();
            assert_eq!(err.kind(), "empty_class_not_allowed");
        }
    }

    #[test]
    fn test_error_aborts_without_partial_mutations() {
        let resolver = Fixture::default().resolver();
        let result = resolver.generate_container_mutations(
            &container(&[(QOS_RESOURCE_RDT, "gold"), ("dummy-1", "class-z")]),
            &sandbox(&[]),
        );
        assert!(result.is_err());
    }
}

mod sandbox_network {
    use super::*;

    #[test]
    fn test_net_validates_but_produces_no_mutation() {
        let resolver = Fixture::default().resolver();

        let mutations = resolver
            .generate_sandbox_mutations(&sandbox(&[(QOS_RESOURCE_NET, "gold"), ("podres-1", "qos-b")]))
            .unwrap();
        assert_eq!(
            mutations,
            vec![ConfigMutation::Vendor {
                resource: "podres-1".to_string(),
                class: "qos-b".to_string(),
            }]
        );

        let err = resolver
            .generate_sandbox_mutations(&sandbox(&[(QOS_RESOURCE_NET, "platinum")]))
            .unwrap_err();
        assert_eq!(err.kind(), "unknown_class");
    }

    #[test]
    fn test_resolve_sandbox_network_returns_bandwidth() {
        let resolver = Fixture::default().resolver();

        let qos = resolver
            .resolve_sandbox_network(&sandbox(&[(QOS_RESOURCE_NET, "gold")]))
            .unwrap()
            .unwrap();
        assert_eq!(qos.class, "gold");
        assert_eq!(qos.bandwidth.map(|b| b.egress_rate), Some(10_000_000));

        let bronze = resolver
            .resolve_sandbox_network(&sandbox(&[(QOS_RESOURCE_NET, "bronze")]))
            .unwrap()
            .unwrap();
        assert_eq!(bronze.bandwidth, None);

        assert_eq!(resolver.resolve_sandbox_network(&sandbox(&[])).unwrap(), None);
    }

    #[test]
    fn test_net_is_not_a_container_resource() {
        let resolver = Fixture::default().resolver();
        let err = resolver
            .generate_container_mutations(&container(&[(QOS_RESOURCE_NET, "gold")]), &sandbox(&[]))
            .unwrap_err();
        assert_eq!(err.kind(), "unknown_resource_type");
    }

    #[test]
    fn test_net_ignores_annotations() {
        let resolver = Fixture::default().resolver();
        let mut pod = sandbox(&[]);
        pod.annotations.insert(
            "net.resources.beta.kubernetes.io/pod".to_string(),
            "gold".to_string(),
        );
        assert_eq!(resolver.resolve_sandbox_network(&pod).unwrap(), None);
    }
}

mod ordering {
    use super::*;

    #[test]
    fn test_mutations_follow_request_order() {
        let resolver = Fixture::default().resolver();
        let pod = sandbox(&[]);
        let ctr = container(&[
            ("dummy-1", "class-b"),
            (QOS_RESOURCE_BLOCKIO, "fast"),
            (QOS_RESOURCE_RDT, "bronze"),
        ]);

        let kinds: Vec<_> = resolver
            .generate_container_mutations(&ctr, &pod)
            .unwrap()
            .into_iter()
            .map(|m| match m {
                ConfigMutation::Rdt { .. } => "rdt",
                ConfigMutation::BlockIo { .. } => "blockio",
                ConfigMutation::Vendor { .. } => "vendor",
            })
            .collect();
        assert_eq!(kinds, vec!["vendor", "blockio", "rdt"]);
    }

    #[test]
    fn test_last_duplicate_request_wins_once() {
        let resolver = Fixture::default().resolver();
        let mutations = resolver
            .generate_container_mutations(
                &container(&[(QOS_RESOURCE_RDT, "gold"), (QOS_RESOURCE_RDT, "silver")]),
                &sandbox(&[]),
            )
            .unwrap();
        assert_eq!(
            mutations,
            vec![ConfigMutation::Rdt {
                class: "silver".to_string()
            }]
        );
    }

    #[test]
    fn test_replay_is_identical() {
        let resolver = Fixture::default().resolver();
        let mut pod = sandbox(&[]);
        pod.annotations.insert(
            "rdt.resources.beta.kubernetes.io/container.app".to_string(),
            "silver".to_string(),
        );
        let ctr = container(&[("dummy-2", "platinum"), (QOS_RESOURCE_BLOCKIO, "slow")]);

        let first = resolver.generate_container_mutations(&ctr, &pod).unwrap();
        let second = resolver.generate_container_mutations(&ctr, &pod).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}
