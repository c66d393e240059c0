mod error;
mod handlers;
mod server;

pub use error::{ApiError, ApiResult};
pub use server::Server;

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_ip: IpAddr,
    pub port: u16,
    pub max_upload_size: u64,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_ip, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileQuery {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub name: String,
    pub size: u64,
    pub nodes: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStats {
    pub id: usize,
    pub free_space_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub nodes: Vec<NodeStats>,
    pub objects: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNodeResponse {
    pub id: usize,
}
