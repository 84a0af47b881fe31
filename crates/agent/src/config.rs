//! Agent configuration
//!
//! Read from an optional file named by `QOS_CONFIG_FILE`, overlaid by
//! `QOS_`-prefixed environment variables (`__` separates nested keys, e.g.
//! `QOS_RDT__ENABLED=true`).

use anyhow::{Context, Result};
use qos_lib::backend::BackendSpec;
use qos_lib::negotiation::{AgentFailurePolicy, NegotiationOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_FILE_ENV: &str = "QOS_CONFIG_FILE";

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Port of the HTTP API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding the CNI network configuration files
    #[serde(default = "default_cni_conf_dir")]
    pub cni_conf_dir: PathBuf,

    /// Max number of configuration files loaded from `cni_conf_dir`
    #[serde(default = "default_cni_max_conf_num")]
    pub cni_max_conf_num: usize,

    #[serde(default)]
    pub ignore_rdt_not_enabled_errors: bool,

    #[serde(default)]
    pub ignore_blockio_not_enabled_errors: bool,

    /// Required: what to do when the policy agent fails
    pub agent_failure_policy: AgentFailurePolicy,

    #[serde(default = "default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,

    #[serde(default)]
    pub rdt: BackendSpec,

    #[serde(default)]
    pub blockio: BackendSpec,

    /// Register the demo vendor resource types
    #[serde(default)]
    pub placeholder_resources: bool,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_cni_conf_dir() -> PathBuf {
    PathBuf::from("/etc/cni/net.d")
}

fn default_cni_max_conf_num() -> usize {
    1
}

fn default_agent_timeout_ms() -> u64 {
    2000
}

impl AgentConfig {
    /// Load configuration from the environment and the optional config file
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("QOS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read agent configuration")?;

        config
            .try_deserialize()
            .context("Invalid agent configuration (agent_failure_policy must be set)")
    }

    pub fn negotiation_options(&self) -> NegotiationOptions {
        NegotiationOptions {
            failure_policy: self.agent_failure_policy,
            timeout: Duration::from_millis(self.agent_timeout_ms),
        }
    }
}
