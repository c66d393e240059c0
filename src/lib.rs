pub mod config;
pub mod error;
pub mod service;

pub use config::Config;
pub use error::{Result, ShardstoreError};
pub use service::Service;

// Re-export key types from workspace crates
pub use api;
pub use storage;
