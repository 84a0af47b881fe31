//! API client for the node QoS agent

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use url::Url;

/// A call the agent answered with an error status
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{kind}: {message} (HTTP {status})")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },
}

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (kind, message) = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => (err.kind, err.error),
                Err(_) => ("http_error".to_string(), body),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                kind,
                message,
            }
            .into());
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceClass {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceType {
    pub name: String,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default)]
    pub classes: Vec<ResourceClass>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mutation {
    pub kind: String,
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_io: Option<BlockIo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockIo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_read_bps: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_write_bps: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationList {
    pub mutations: Vec<Mutation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthLimits {
    #[serde(default)]
    pub ingress_rate: u64,
    #[serde(default)]
    pub ingress_burst: u64,
    #[serde(default)]
    pub egress_rate: u64,
    #[serde(default)]
    pub egress_burst: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bandwidth {
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<BandwidthLimits>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortMapping {
    #[serde(default)]
    pub protocol: String,
    pub container_port: u16,
    #[serde(default)]
    pub host_port: u16,
    #[serde(default)]
    pub host_ip: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub searches: Vec<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub bandwidth: Option<Bandwidth>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub dns: DnsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiatedNetwork {
    pub config: NetworkConfig,
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadSummary {
    pub networks: usize,
    pub net_classes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub components: HashMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_decodes_resource_types() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/qos/pod-resources")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"name":"net","mutable":false,"classes":[{"name":"gold","capacity":4}]}]"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let types: Vec<ResourceType> = client.get("v1/qos/pod-resources").await.unwrap();

        mock.assert_async().await;
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].classes[0].capacity, Some(4));
    }

    #[tokio::test]
    async fn test_error_body_becomes_client_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/qos/container-mutations")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"unknown rdt class \"platinum\"","kind":"unknown_class"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .post::<MutationList, _>("v1/qos/container-mutations", &serde_json::json!({}))
            .await
            .unwrap_err();

        match err.downcast_ref::<ClientError>() {
            Some(ClientError::Api { status, kind, .. }) => {
                assert_eq!(*status, 422);
                assert_eq!(kind, "unknown_class");
            }
            None => panic!("unexpected error: {err}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_body("upstream down")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.get::<HealthResponse>("healthz").await.unwrap_err();
        assert!(err.to_string().contains("http_error"));
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn test_mutation_shapes() {
        let list: MutationList = serde_json::from_str(
            r#"{"mutations":[
                {"kind":"rdt","class":"gold"},
                {"kind":"block_io","class":"fast","block_io":{"weight":800}},
                {"kind":"vendor","resource":"dummy-1","class":"class-a"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(list.mutations[1].block_io.as_ref().unwrap().weight, Some(800));
        assert_eq!(list.mutations[2].resource.as_deref(), Some("dummy-1"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
