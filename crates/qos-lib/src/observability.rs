//! Observability for the QoS agent
//!
//! Provides:
//! - Prometheus metrics (catalog reloads, resolution errors, emitted mutations, negotiations)
//! - Structured JSON events with tracing

use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::catalog::Scope;
use crate::error::QosError;
use crate::negotiation::NegotiationOutcome;
use crate::resolver::ConfigMutation;

/// Agent round trips are bounded by the negotiation timeout, so buckets stop at a few seconds
const NEGOTIATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

static GLOBAL_METRICS: OnceLock<QosMetricsInner> = OnceLock::new();

struct QosMetricsInner {
    catalog_rebuilds: IntCounterVec,
    network_classes: IntGauge,
    resolution_errors: IntCounterVec,
    mutations_generated: IntCounterVec,
    negotiations: IntCounterVec,
    negotiation_latency_seconds: Histogram,
}

impl QosMetricsInner {
    fn new() -> Self {
        Self {
            catalog_rebuilds: register_int_counter_vec!(
                "qos_catalog_rebuilds_total",
                "Network catalog rebuilds by result",
                &["result"]
            )
            .expect("Failed to register catalog_rebuilds"),

            network_classes: register_int_gauge!(
                "qos_network_classes",
                "Number of net classes currently advertised"
            )
            .expect("Failed to register network_classes"),

            resolution_errors: register_int_counter_vec!(
                "qos_resolution_errors_total",
                "QoS request resolution failures by error kind",
                &["kind"]
            )
            .expect("Failed to register resolution_errors"),

            mutations_generated: register_int_counter_vec!(
                "qos_mutations_generated_total",
                "Configuration mutations emitted by scope and kind",
                &["scope", "kind"]
            )
            .expect("Failed to register mutations_generated"),

            negotiations: register_int_counter_vec!(
                "qos_network_negotiations_total",
                "Sandbox network negotiations by outcome",
                &["outcome"]
            )
            .expect("Failed to register negotiations"),

            negotiation_latency_seconds: register_histogram!(
                "qos_network_negotiation_latency_seconds",
                "Time spent negotiating a sandbox network with the policy agent",
                NEGOTIATION_BUCKETS.to_vec()
            )
            .expect("Failed to register negotiation_latency_seconds"),
        }
    }
}

/// Handle to the process-wide QoS metrics
///
/// Clones share the same registered collectors.
#[derive(Clone)]
pub struct QosMetrics {
    _private: (),
}

impl Default for QosMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl QosMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(QosMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &QosMetricsInner {
        GLOBAL_METRICS.get_or_init(QosMetricsInner::new)
    }

    /// Record a successful rebuild and the new class count
    pub fn record_catalog_rebuilt(&self, classes: usize) {
        self.inner()
            .catalog_rebuilds
            .with_label_values(&["success"])
            .inc();
        self.inner().network_classes.set(classes as i64);
    }

    pub fn record_catalog_rebuild_failed(&self) {
        self.inner()
            .catalog_rebuilds
            .with_label_values(&["failure"])
            .inc();
    }

    pub fn record_resolution_error(&self, err: &QosError) {
        self.inner()
            .resolution_errors
            .with_label_values(&[err.kind()])
            .inc();
    }

    pub fn record_mutations(&self, scope: Scope, mutations: &[ConfigMutation]) {
        let scope = scope.to_string();
        for mutation in mutations {
            self.inner()
                .mutations_generated
                .with_label_values(&[scope.as_str(), mutation.kind()])
                .inc();
        }
    }

    pub fn record_negotiation(&self, outcome: NegotiationOutcome, duration_secs: f64) {
        self.inner()
            .negotiations
            .with_label_values(&[outcome.as_str()])
            .inc();
        self.inner().negotiation_latency_seconds.observe(duration_secs);
    }

    /// Negotiations that ended in an error rather than a configuration
    pub fn record_negotiation_failed(&self, duration_secs: f64) {
        self.inner().negotiations.with_label_values(&["failed"]).inc();
        self.inner().negotiation_latency_seconds.observe(duration_secs);
    }
}

/// Emits the agent's significant events as structured JSON
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, pod_types: usize, container_types: usize) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            pod_resource_types = pod_types,
            container_resource_types = container_types,
            "QoS agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "QoS agent shutting down"
        );
    }

    pub fn log_catalog_rebuilt(&self, networks: usize, classes: usize) {
        info!(
            event = "catalog_rebuilt",
            node = %self.node_name,
            networks = networks,
            net_classes = classes,
            "Network QoS catalog rebuilt"
        );
    }

    pub fn log_catalog_rebuild_failed(&self, error: &str) {
        warn!(
            event = "catalog_rebuild_failed",
            node = %self.node_name,
            error = %error,
            "Network QoS catalog rebuild failed, previous catalog kept"
        );
    }

    pub fn log_network_negotiated(
        &self,
        sandbox: &str,
        outcome: NegotiationOutcome,
        bandwidth_class: Option<&str>,
    ) {
        match outcome {
            NegotiationOutcome::ProceededWithDraft => {
                warn!(
                    event = "negotiation_fallback",
                    node = %self.node_name,
                    sandbox = %sandbox,
                    bandwidth_class = ?bandwidth_class,
                    "Policy agent unavailable, sandbox network uses the draft"
                );
            }
            _ => {
                info!(
                    event = "network_negotiated",
                    node = %self.node_name,
                    sandbox = %sandbox,
                    outcome = outcome.as_str(),
                    bandwidth_class = ?bandwidth_class,
                    "Sandbox network negotiated"
                );
            }
        }
    }
}
