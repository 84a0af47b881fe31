//! QoS resource advertisement commands

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, ResourceType};
use crate::output::{print_table, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Pod,
    Container,
}

impl ScopeArg {
    fn path(&self) -> &'static str {
        match self {
            ScopeArg::Pod => "v1/qos/pod-resources",
            ScopeArg::Container => "v1/qos/container-resources",
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ScopeArg::Pod => "pod",
            ScopeArg::Container => "container",
        }
    }
}

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Scope")]
    scope: &'static str,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Classes")]
    classes: String,
}

#[derive(Serialize)]
struct ScopedResources<'a> {
    scope: &'static str,
    resources: &'a [ResourceType],
}

/// Show the QoS resource types the node advertises
pub async fn list_resources(
    client: &ApiClient,
    scope: Option<ScopeArg>,
    format: OutputFormat,
) -> Result<()> {
    let scopes = match scope {
        Some(scope) => vec![scope],
        None => vec![ScopeArg::Pod, ScopeArg::Container],
    };

    let mut fetched = Vec::new();
    for scope in scopes {
        let resources: Vec<ResourceType> = client.get(scope.path()).await?;
        fetched.push((scope, resources));
    }

    let rows: Vec<ResourceRow> = fetched
        .iter()
        .flat_map(|(scope, resources)| {
            resources.iter().map(move |r| ResourceRow {
                scope: scope.as_str(),
                resource: r.name.clone(),
                classes: format_classes(r),
            })
        })
        .collect();
    let raw: Vec<ScopedResources<'_>> = fetched
        .iter()
        .map(|(scope, resources)| ScopedResources {
            scope: scope.as_str(),
            resources,
        })
        .collect();

    print_table(&rows, &raw, format)
}

/// "gold(4), silver" - capacities in parentheses when bounded
fn format_classes(resource: &ResourceType) -> String {
    resource
        .classes
        .iter()
        .map(|c| match c.capacity {
            Some(capacity) => format!("{}({})", c.name, capacity),
            None => c.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
