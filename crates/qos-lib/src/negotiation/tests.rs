//! Negotiation round-trip tests against scripted agents

use super::*;
use crate::backend::{BackendSpec, ConfiguredBackend};
use crate::catalog::{
    BandwidthLimits, CapabilityCatalog, NetworkConfig, NetworkPluginConfig, LOOPBACK_NETWORK_NAME,
};
use crate::error::{AgentError, QosError};
use crate::models::{DnsConfig, PodSandboxConfig, PodSandboxMetadata, PortMapping, QosRequest};
use crate::resolver::QosResolver;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MBPS: u64 = 1_000_000;

enum Behaviour {
    Reply(AdjustedNetworkConfig),
    Fail,
    Hang,
}

struct ScriptedAgent {
    behaviour: Behaviour,
    seen: Mutex<Vec<AdjustPodSandboxNetworkRequest>>,
    announced: Mutex<Vec<usize>>,
}

impl ScriptedAgent {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            seen: Mutex::new(Vec::new()),
            announced: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PolicyAgent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn adjust_pod_sandbox_network(
        &self,
        request: AdjustPodSandboxNetworkRequest,
    ) -> Result<AdjustedNetworkConfig, AgentError> {
        self.seen.lock().unwrap().push(request);
        match &self.behaviour {
            Behaviour::Reply(reply) => Ok(reply.clone()),
            Behaviour::Fail => Err(AgentError::Unreachable("connection refused".to_string())),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(AdjustedNetworkConfig::default())
            }
        }
    }

    async fn create_pod_sandbox_network_conf(
        &self,
        request: CreatePodSandboxNetworkConfRequest,
    ) -> Result<CreatePodSandboxNetworkConfReply, AgentError> {
        self.announced.lock().unwrap().push(request.networks.len());
        match &self.behaviour {
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(CreatePodSandboxNetworkConfReply::default())
            }
            Behaviour::Fail => Err(AgentError::MalformedReply("truncated".to_string())),
            Behaviour::Reply(_) => Ok(CreatePodSandboxNetworkConfReply {
                networks: request.networks,
            }),
        }
    }
}

fn plugin_config() -> NetworkPluginConfig {
    NetworkPluginConfig::new(vec![
        NetworkConfig {
            name: LOOPBACK_NETWORK_NAME.to_string(),
            source: "{}".to_string(),
        },
        NetworkConfig {
            name: "podnet".to_string(),
            source: r#"{"name":"podnet","qos":{
                "standard":{"capacity":10,"bandwidth":{"ingressRate":10000000,"egressRate":10000000}},
                "premium":{"capacity":2,"bandwidth":{"ingressRate":100000000,"egressRate":100000000}}
            }}"#
            .to_string(),
        },
    ])
}

fn resolver() -> Arc<QosResolver> {
    let catalog = CapabilityCatalog::builder().build().unwrap();
    catalog.rebuild_network_catalog(&plugin_config()).unwrap();
    Arc::new(
        QosResolver::new(Arc::new(catalog))
            .with_backend(Arc::new(ConfiguredBackend::rdt(BackendSpec::default())), false),
    )
}

fn negotiator(agent: Arc<ScriptedAgent>, failure_policy: AgentFailurePolicy) -> NetworkNegotiator {
    NetworkNegotiator::new(
        resolver(),
        agent,
        NegotiationOptions {
            failure_policy,
            timeout: Duration::from_millis(100),
        },
    )
}

fn sandbox() -> PodSandboxConfig {
    PodSandboxConfig {
        metadata: PodSandboxMetadata {
            name: "web-0".to_string(),
            uid: "5f2c".to_string(),
            namespace: "shop".to_string(),
            attempt: 0,
        },
        labels: BTreeMap::from([("tier".to_string(), "a".to_string())]),
        port_mappings: vec![PortMapping {
            container_port: 8080,
            host_port: 80,
            ..Default::default()
        }],
        qos_resources: vec![QosRequest::new("net", "standard")],
        ..Default::default()
    }
}

fn bandwidth(class: &str, rate: u64) -> NetworkBandwidth {
    NetworkBandwidth {
        class: class.to_string(),
        limits: Some(BandwidthLimits {
            ingress_rate: rate,
            egress_rate: rate,
            ..Default::default()
        }),
    }
}

mod drafting {
    use super::*;

    #[test]
    fn test_draft_from_sandbox_config() {
        let negotiator = negotiator(ScriptedAgent::new(Behaviour::Fail), AgentFailurePolicy::Abort);
        let draft = negotiator.draft("sandbox-1", &sandbox()).unwrap();
        let config = draft.config();

        assert_eq!(config.port_mappings.len(), 1);
        assert_eq!(config.port_mappings[0].host_port, 80);
        assert_eq!(config.bandwidth, Some(bandwidth("standard", 10 * MBPS)));
        assert_eq!(config.labels["tier"], "a");
        assert_eq!(config.labels[CNI_LABEL_POD_NAME], "web-0");
        assert_eq!(config.labels[CNI_LABEL_POD_NAMESPACE], "shop");
        assert_eq!(config.labels[CNI_LABEL_INFRA_CONTAINER_ID], "sandbox-1");
        assert!(config.dns.is_empty());
        assert_eq!(draft.pod().uid, "5f2c");
    }

    #[test]
    fn test_draft_fails_on_unknown_net_class() {
        let negotiator = negotiator(ScriptedAgent::new(Behaviour::Fail), AgentFailurePolicy::Abort);
        let mut config = sandbox();
        config.qos_resources = vec![QosRequest::new("net", "gold")];

        let err = negotiator.draft("sandbox-1", &config).unwrap_err();
        assert_eq!(err.kind(), "unknown_class");
    }

    #[test]
    fn test_draft_without_net_request_has_no_bandwidth() {
        let negotiator = negotiator(ScriptedAgent::new(Behaviour::Fail), AgentFailurePolicy::Abort);
        let mut config = sandbox();
        config.qos_resources.clear();

        let draft = negotiator.draft("sandbox-1", &config).unwrap();
        assert_eq!(draft.config().bandwidth, None);
    }
}

mod merging {
    use super::*;

    #[tokio::test]
    async fn test_agent_lowers_bandwidth_within_class() {
        let agent = ScriptedAgent::new(Behaviour::Reply(AdjustedNetworkConfig {
            bandwidth: FieldUpdate::Set(bandwidth("standard", 5 * MBPS)),
            ..Default::default()
        }));
        let negotiator = negotiator(agent.clone(), AgentFailurePolicy::Abort);
        let draft = negotiator.draft("sandbox-1", &sandbox()).unwrap();
        let drafted = draft.config().clone();

        let negotiated = negotiator.negotiate(draft).await.unwrap();

        assert_eq!(negotiated.outcome, NegotiationOutcome::Adjusted);
        assert_eq!(negotiated.config.bandwidth, Some(bandwidth("standard", 5 * MBPS)));
        assert_eq!(negotiated.config.port_mappings, drafted.port_mappings);
        assert_eq!(negotiated.config.labels, drafted.labels);
        assert_eq!(negotiated.config.dns, drafted.dns);

        let seen = agent.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].draft, drafted);
        assert_eq!(seen[0].pod.name, "web-0");
    }

    #[tokio::test]
    async fn test_agent_switches_to_valid_class() {
        let agent = ScriptedAgent::new(Behaviour::Reply(AdjustedNetworkConfig {
            bandwidth: FieldUpdate::Set(bandwidth("premium", 100 * MBPS)),
            dns: FieldUpdate::Set(DnsConfig {
                servers: vec!["10.96.0.10".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        }));
        let negotiator = negotiator(agent, AgentFailurePolicy::Abort);
        let draft = negotiator.draft("sandbox-1", &sandbox()).unwrap();

        let negotiated = negotiator.negotiate(draft).await.unwrap();
        assert_eq!(
            negotiated.config.bandwidth.map(|b| b.class),
            Some("premium".to_string())
        );
        assert_eq!(negotiated.config.dns.servers, vec!["10.96.0.10"]);
    }

    #[tokio::test]
    async fn test_agent_naming_unknown_class_is_rejected() {
        let agent = ScriptedAgent::new(Behaviour::Reply(AdjustedNetworkConfig {
            bandwidth: FieldUpdate::Set(bandwidth("platinum", 5 * MBPS)),
            ..Default::default()
        }));
        // Even a lenient failure policy must not let a policy violation through
        let negotiator = negotiator(agent, AgentFailurePolicy::ProceedWithDraft);
        let draft = negotiator.draft("sandbox-1", &sandbox()).unwrap();

        let err = negotiator.negotiate(draft).await.unwrap_err();
        assert!(matches!(
            err,
            QosError::NegotiationRejected { ref sandbox, .. } if sandbox == "web-0"
        ));
    }

    #[tokio::test]
    async fn test_untouched_reply_keeps_draft() {
        let negotiator = negotiator(
            ScriptedAgent::new(Behaviour::Reply(AdjustedNetworkConfig::default())),
            AgentFailurePolicy::Abort,
        );
        let draft = negotiator.draft("sandbox-1", &sandbox()).unwrap();
        let drafted = draft.config().clone();

        let negotiated = negotiator.negotiate(draft).await.unwrap();
        assert_eq!(negotiated.outcome, NegotiationOutcome::Unchanged);
        assert_eq!(negotiated.config, drafted);
    }

    #[test]
    fn test_clear_and_set_fields() {
        let catalog = resolver().catalog().snapshot();
        let draft = NetworkDraftConfig {
            port_mappings: vec![PortMapping {
                container_port: 8080,
                host_port: 80,
                ..Default::default()
            }],
            bandwidth: Some(bandwidth("standard", 10 * MBPS)),
            labels: BTreeMap::from([("tier".to_string(), "a".to_string())]),
            dns: DnsConfig::default(),
        };

        let merged = merge_adjustment(
            "web-0",
            &draft,
            AdjustedNetworkConfig {
                port_mappings: FieldUpdate::Clear,
                bandwidth: FieldUpdate::Clear,
                labels: FieldUpdate::Set(BTreeMap::from([("tier".to_string(), "b".to_string())])),
                dns: FieldUpdate::Untouched,
            },
            &catalog,
        )
        .unwrap();

        assert!(merged.port_mappings.is_empty());
        assert_eq!(merged.bandwidth, None);
        assert_eq!(merged.labels["tier"], "b");
    }

    #[test]
    fn test_empty_class_in_reply_is_rejected() {
        let catalog = resolver().catalog().snapshot();
        let err = merge_adjustment(
            "web-0",
            &NetworkDraftConfig::default(),
            AdjustedNetworkConfig {
                bandwidth: FieldUpdate::Set(bandwidth("", MBPS)),
                ..Default::default()
            },
            &catalog,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "negotiation_rejected");
    }

    #[tokio::test]
    async fn test_class_dropped_by_reload_is_rejected() {
        let resolver = resolver();
        let negotiator = NetworkNegotiator::new(
            resolver.clone(),
            ScriptedAgent::new(Behaviour::Reply(AdjustedNetworkConfig::default())),
            NegotiationOptions {
                failure_policy: AgentFailurePolicy::ProceedWithDraft,
                timeout: Duration::from_millis(100),
            },
        );
        let draft = negotiator.draft("sandbox-1", &sandbox()).unwrap();

        resolver
            .catalog()
            .rebuild_network_catalog(&NetworkPluginConfig::new(vec![
                NetworkConfig {
                    name: LOOPBACK_NETWORK_NAME.to_string(),
                    source: "{}".to_string(),
                },
                NetworkConfig {
                    name: "podnet".to_string(),
                    source: r#"{"name":"podnet","qos":{"premium":{"capacity":2}}}"#.to_string(),
                },
            ]))
            .unwrap();

        let err = negotiator.negotiate(draft).await.unwrap_err();
        assert!(matches!(err, QosError::NegotiationRejected { .. }));
    }
}

mod agent_failures {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_agent_aborts() {
        let negotiator = negotiator(ScriptedAgent::new(Behaviour::Fail), AgentFailurePolicy::Abort);
        let draft = negotiator.draft("sandbox-1", &sandbox()).unwrap();

        let err = negotiator.negotiate(draft).await.unwrap_err();
        assert!(matches!(err, QosError::AgentCall(AgentError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_unreachable_agent_proceeds_with_draft() {
        let negotiator = negotiator(
            ScriptedAgent::new(Behaviour::Fail),
            AgentFailurePolicy::ProceedWithDraft,
        );
        let draft = negotiator.draft("sandbox-1", &sandbox()).unwrap();
        let drafted = draft.config().clone();

        let negotiated = negotiator.negotiate(draft).await.unwrap();
        assert_eq!(negotiated.outcome, NegotiationOutcome::ProceededWithDraft);
        assert_eq!(negotiated.config, drafted);
    }

    #[tokio::test]
    async fn test_hanging_agent_times_out() {
        let negotiator = negotiator(ScriptedAgent::new(Behaviour::Hang), AgentFailurePolicy::Abort);
        let draft = negotiator.draft("sandbox-1", &sandbox()).unwrap();

        let err = negotiator.negotiate(draft).await.unwrap_err();
        assert!(matches!(err, QosError::AgentCall(AgentError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_hanging_agent_proceeds_under_lenient_policy() {
        let negotiator = negotiator(
            ScriptedAgent::new(Behaviour::Hang),
            AgentFailurePolicy::ProceedWithDraft,
        );
        let draft = negotiator.draft("sandbox-1", &sandbox()).unwrap();

        let negotiated = negotiator.negotiate(draft).await.unwrap();
        assert_eq!(negotiated.outcome, NegotiationOutcome::ProceededWithDraft);
    }
}

mod announcements {
    use super::*;

    #[tokio::test]
    async fn test_announce_sends_all_networks() {
        let agent = ScriptedAgent::new(Behaviour::Reply(AdjustedNetworkConfig::default()));
        let negotiator = negotiator(agent.clone(), AgentFailurePolicy::Abort);

        negotiator.announce_network_configs(&plugin_config()).await.unwrap();
        assert_eq!(*agent.announced.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_announce_times_out() {
        let negotiator = negotiator(ScriptedAgent::new(Behaviour::Hang), AgentFailurePolicy::Abort);
        let err = negotiator
            .announce_network_configs(&plugin_config())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(_)));
    }
}
