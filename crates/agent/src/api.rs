//! HTTP API for QoS advertisement, resolution, negotiation, health and metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use qos_lib::{
    catalog::Scope,
    error::{CatalogParseError, QosError},
    health::ComponentStatus,
    models::{ContainerConfig, PodSandboxConfig, ResourceType},
    negotiation::NegotiatedNetwork,
    resolver::ConfigMutation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::state::{AppState, ReloadSummary};

/// Error body returned for every failed QoS call
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl From<QosError> for ApiError {
    fn from(err: QosError) -> Self {
        let status = match err {
            QosError::AgentCall(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            status,
            body: ErrorBody {
                error: err.to_string(),
                kind: err.kind().to_string(),
            },
        }
    }
}

impl From<CatalogParseError> for ApiError {
    fn from(err: CatalogParseError) -> Self {
        QosError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Record a resolution failure before handing it back to the caller
fn fail(state: &AppState, err: QosError) -> ApiError {
    state.metrics.record_resolution_error(&err);
    debug!(kind = err.kind(), error = %err, "QoS request rejected");
    err.into()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MutationsResponse {
    pub mutations: Vec<ConfigMutation>,
}

#[derive(Debug, Deserialize)]
pub struct ContainerMutationsRequest {
    pub container: ContainerConfig,
    pub sandbox: PodSandboxConfig,
}

#[derive(Debug, Deserialize)]
pub struct SandboxNetworkRequest {
    pub sandbox_id: String,
    pub sandbox: PodSandboxConfig,
}

/// Health check response - 200 while operational, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn get_pod_qos_resources_info(State(state): State<Arc<AppState>>) -> Json<Vec<ResourceType>> {
    Json(state.catalog().advertise_pod_resources())
}

async fn get_container_qos_resources_info(State(state): State<Arc<AppState>>) -> Json<Vec<ResourceType>> {
    Json(state.catalog().advertise_container_resources())
}

async fn sandbox_mutations(
    State(state): State<Arc<AppState>>,
    Json(sandbox): Json<PodSandboxConfig>,
) -> Result<Json<MutationsResponse>, ApiError> {
    let mutations = state
        .resolver
        .generate_sandbox_mutations(&sandbox)
        .map_err(|e| fail(&state, e))?;
    state.metrics.record_mutations(Scope::Pod, &mutations);

    Ok(Json(MutationsResponse { mutations }))
}

async fn container_mutations(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ContainerMutationsRequest>,
) -> Result<Json<MutationsResponse>, ApiError> {
    let mutations = state
        .resolver
        .generate_container_mutations(&request.container, &request.sandbox)
        .map_err(|e| fail(&state, e))?;
    state.metrics.record_mutations(Scope::Container, &mutations);

    Ok(Json(MutationsResponse { mutations }))
}

/// Draft the sandbox network and run it past the policy agent
async fn sandbox_network(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SandboxNetworkRequest>,
) -> Result<Json<NegotiatedNetwork>, ApiError> {
    let draft = state
        .negotiator
        .draft(&request.sandbox_id, &request.sandbox)
        .map_err(|e| fail(&state, e))?;

    let started = Instant::now();
    let negotiated = match state.negotiator.negotiate(draft).await {
        Ok(negotiated) => negotiated,
        Err(e) => {
            state
                .metrics
                .record_negotiation_failed(started.elapsed().as_secs_f64());
            return Err(fail(&state, e));
        }
    };

    state
        .metrics
        .record_negotiation(negotiated.outcome, started.elapsed().as_secs_f64());
    state.logger.log_network_negotiated(
        &request.sandbox.metadata.name,
        negotiated.outcome,
        negotiated.config.bandwidth.as_ref().map(|b| b.class.as_str()),
    );

    Ok(Json(negotiated))
}

async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<ReloadSummary>, ApiError> {
    info!(dir = %state.config.cni_conf_dir.display(), "Network config reload requested");
    let summary = state.reload_network_config().await?;
    Ok(Json(summary))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/qos/pod-resources", get(get_pod_qos_resources_info))
        .route("/v1/qos/container-resources", get(get_container_qos_resources_info))
        .route("/v1/qos/sandbox-mutations", post(sandbox_mutations))
        .route("/v1/qos/container-mutations", post(container_mutations))
        .route("/v1/qos/sandbox-network", post(sandbox_network))
        .route("/v1/qos/reload", post(reload))
        .with_state(state)
}

pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
