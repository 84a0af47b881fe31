//! Node daemon serving QoS advertisement, resolution and network negotiation

pub mod api;
pub mod config;
pub mod state;
pub mod watcher;
