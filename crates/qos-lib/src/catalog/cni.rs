//! CNI bandwidth class extraction
//!
//! The network plugin exposes its configured networks as an ordered list. The
//! first entry is the attachment the plugin always installs; the second is
//! the first configured network, whose raw configuration carries the `qos`
//! section describing the bandwidth classes a sandbox may request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::CatalogParseError;

/// Name of the network the plugin always installs ahead of configured ones
pub const LOOPBACK_NETWORK_NAME: &str = "cni-loopback";

const LOOPBACK_NETWORK_SOURCE: &str =
    r#"{"cniVersion":"0.3.1","name":"cni-loopback","plugins":[{"type":"loopback"}]}"#;

/// File extensions the plugin loads from its configuration directory
const CONF_EXTENSIONS: &[&str] = &["conf", "conflist", "json"];

/// Bandwidth capability passed to the CNI bandwidth plugin (bits per second)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthLimits {
    #[serde(default, alias = "IngressRate")]
    pub ingress_rate: u64,
    #[serde(default, alias = "IngressBurst")]
    pub ingress_burst: u64,
    #[serde(default, alias = "EgressRate")]
    pub egress_rate: u64,
    #[serde(default, alias = "EgressBurst")]
    pub egress_burst: u64,
}

/// One network bandwidth class as declared in the plugin configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CniQosClass {
    /// Max number of simultaneous pods that can use this class, `None` when unbounded
    #[serde(default, alias = "Capacity")]
    pub capacity: Option<u64>,
    #[serde(default, alias = "BandWidth", alias = "bandWidth")]
    pub bandwidth: Option<BandwidthLimits>,
}

/// One logical network as loaded by the plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    /// Raw configuration text
    pub source: String,
}

/// The network plugin's live configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPluginConfig {
    pub networks: Vec<NetworkConfig>,
}

#[derive(Deserialize)]
struct QosSection {
    #[serde(default)]
    qos: Option<BTreeMap<String, CniQosClass>>,
}

#[derive(Deserialize)]
struct NetworkName {
    #[serde(default)]
    name: String,
}

impl NetworkPluginConfig {
    pub fn new(networks: Vec<NetworkConfig>) -> Self {
        Self { networks }
    }

    /// Load the plugin configuration from a CNI configuration directory
    ///
    /// The loopback network is always entry 0, followed by at most
    /// `max_conf_num` configuration files in lexical order.
    pub async fn load_dir(dir: &Path, max_conf_num: usize) -> Result<Self, CatalogParseError> {
        let io_err = |source| CatalogParseError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            let is_conf = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| CONF_EXTENSIONS.contains(&ext))
                .unwrap_or(false);
            if is_conf {
                files.push(path);
            }
        }
        files.sort();

        let mut networks = vec![NetworkConfig {
            name: LOOPBACK_NETWORK_NAME.to_string(),
            source: LOOPBACK_NETWORK_SOURCE.to_string(),
        }];

        for path in files.into_iter().take(max_conf_num) {
            let source = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| CatalogParseError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
            let parsed: NetworkName =
                serde_json::from_str(&source).map_err(|e| CatalogParseError::Decode {
                    raw: source.clone(),
                    source: e,
                })?;
            debug!(path = %path.display(), network = %parsed.name, "Loaded CNI network config");
            networks.push(NetworkConfig {
                name: parsed.name,
                source,
            });
        }

        Ok(Self { networks })
    }
}

/// Recover the class -> bandwidth mapping from the plugin's configuration
pub fn extract_bandwidth_classes(
    plugin_config: &NetworkPluginConfig,
) -> Result<BTreeMap<String, CniQosClass>, CatalogParseError> {
    if plugin_config.networks.len() < 2 {
        return Err(CatalogParseError::NotEnoughNetworks {
            found: plugin_config.networks.len(),
        });
    }
    let raw = &plugin_config.networks[1].source;

    debug!(config = %raw, "Parsing CNI QoS config");
    let section: QosSection = serde_json::from_str(raw).map_err(|source| {
        warn!(config = %raw, error = %source, "Failed to parse CNI QoS config");
        CatalogParseError::Decode {
            raw: raw.clone(),
            source,
        }
    })?;

    let classes = section.qos.unwrap_or_default();
    info!(
        network = %plugin_config.networks[1].name,
        classes = classes.len(),
        "Parsed CNI QoS config"
    );
    Ok(classes)
}
