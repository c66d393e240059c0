use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::error::{Result, ShardstoreError};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_ip: IpAddr,
    pub port: u16,
    /// Root directory; each node keeps its chunks in a subdirectory named after its id.
    pub storage_path: String,
    pub initial_nodes: usize,
    /// Capacity of nodes added at runtime.
    pub node_capacity: u64,
    /// Start with partially used nodes of random capacity instead of empty ones.
    pub randomize_capacity: bool,
    /// Grow the pool by one node this many seconds after startup.
    pub add_node_after_secs: Option<u64>,
    pub max_upload_size: u64,
}

impl Config {
    pub fn new(bind_ip: IpAddr, port: u16) -> Self {
        Self {
            bind_ip,
            port,
            storage_path: "storage".to_string(),
            initial_nodes: 6,
            node_capacity: 30 * MIB,
            randomize_capacity: true,
            add_node_after_secs: None,
            max_upload_size: 1024 * MIB,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_ip, self.port)
    }

    pub fn add_node_delay(&self) -> Option<Duration> {
        self.add_node_after_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_path.trim().is_empty() {
            return Err(ShardstoreError::InvalidConfig("storage path must not be empty".to_string()));
        }

        if self.node_capacity == 0 {
            return Err(ShardstoreError::InvalidConfig("node capacity must be positive".to_string()));
        }

        if self.max_upload_size == 0 {
            return Err(ShardstoreError::InvalidConfig("max upload size must be positive".to_string()));
        }

        if self.initial_nodes == 0 && self.add_node_after_secs.is_none() {
            tracing::warn!("Starting without storage nodes, uploads will fail until a node is added");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)
    }
}

impl From<&Config> for storage::EngineConfig {
    fn from(config: &Config) -> Self {
        storage::EngineConfig {
            initial_nodes: config.initial_nodes,
            node_capacity: config.node_capacity,
            initial_capacity: if config.randomize_capacity {
                storage::InitialCapacity::Randomized
            } else {
                storage::InitialCapacity::Fixed
            },
        }
    }
}

impl From<&Config> for api::Config {
    fn from(config: &Config) -> Self {
        api::Config {
            bind_ip: config.bind_ip,
            port: config.port,
            max_upload_size: config.max_upload_size,
        }
    }
}
