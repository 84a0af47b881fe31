//! Placeholder vendor resource types
//!
//! Not backed by any enforcement back-end. They exist so the generic
//! resolution path can be exercised end to end on hosts without vendor
//! plugins, and are only registered when the daemon is configured to.

use super::{ResourceTypeSource, Scope};
use crate::models::ResourceType;

#[derive(Debug, Clone, Default)]
pub struct PlaceholderResources;

impl ResourceTypeSource for PlaceholderResources {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn resource_types(&self, scope: Scope) -> Vec<ResourceType> {
        match scope {
            Scope::Pod => vec![
                ResourceType::fixed("podres-1", ["qos-a", "qos-b", "qos-c", "qos-d"]),
                ResourceType::fixed("podres-2", ["cls-1", "cls-2", "cls-3", "cls-4", "cls-5"]),
            ],
            Scope::Container => vec![
                ResourceType::fixed("dummy-1", ["class-a", "class-b", "class-c", "class-d"]),
                ResourceType::fixed("dummy-2", ["platinum", "gold", "silver", "bronze"]),
            ],
        }
    }
}
