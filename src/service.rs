use std::sync::Arc;
use std::time::Duration;
use storage::{CancellationToken, DiskProvisioner, DistributionEngine};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Result, ShardstoreError};

/// One shardstore process: the distribution engine and the HTTP API in
/// front of it.
pub struct Service {
    config: Config,
    engine: Arc<DistributionEngine>,
    api_server: Arc<api::Server>,
}

impl Service {
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing shardstore at {}", config.bind_address());

        let provisioner = Arc::new(DiskProvisioner::new(&config.storage_path));
        let engine = Arc::new(DistributionEngine::new((&config).into(), provisioner).await?);

        let api_server = Arc::new(api::Server::new((&config).into(), engine.clone()));

        Ok(Self {
            config,
            engine,
            api_server,
        })
    }

    pub fn engine(&self) -> &Arc<DistributionEngine> {
        &self.engine
    }

    /// Run until the API server stops or Ctrl-C is received.
    pub async fn start(self) -> Result<()> {
        info!("Starting shardstore services");

        let shutdown = CancellationToken::new();

        let mut api_task = {
            let api = self.api_server.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { api.start(shutdown).await })
        };

        if let Some(delay) = self.config.add_node_delay() {
            let engine = self.engine.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { Self::add_node_after(engine, delay, shutdown).await });
        }

        tokio::select! {
            result = &mut api_task => {
                shutdown.cancel();
                error!("API server stopped: {:?}", result);
                flatten(result)?;
                Err(ShardstoreError::Task("API server exited unexpectedly".to_string()))
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutdown requested, draining requests");
                shutdown.cancel();
                flatten(api_task.await)
            }
        }
    }

    async fn add_node_after(engine: Arc<DistributionEngine>, delay: Duration, shutdown: CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                if let Err(e) = engine.add_node().await {
                    error!("Failed to add storage node: {}", e);
                }
            }
            _ = shutdown.cancelled() => {}
        }
    }
}

fn flatten(result: std::result::Result<api::ApiResult<()>, tokio::task::JoinError>) -> Result<()> {
    match result {
        Ok(inner) => inner.map_err(ShardstoreError::from),
        Err(e) => Err(ShardstoreError::Task(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        Config {
            storage_path: dir.path().to_string_lossy().into_owned(),
            initial_nodes: 3,
            randomize_capacity: false,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_service_builds_node_pool() {
        let dir = TempDir::new().unwrap();
        let service = Service::new(test_config(&dir)).await.unwrap();

        assert_eq!(service.engine().node_count().await, 3);
        assert_eq!(service.engine().stats().await, vec![1.0, 1.0, 1.0]);
        assert!(dir.path().join("2").is_dir());
    }

    #[tokio::test]
    async fn test_delayed_node_is_added() {
        let dir = TempDir::new().unwrap();
        let service = Service::new(test_config(&dir)).await.unwrap();

        Service::add_node_after(service.engine().clone(), Duration::from_millis(10), CancellationToken::new()).await;

        assert_eq!(service.engine().node_count().await, 4);
    }

    #[tokio::test]
    async fn test_delayed_node_skipped_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let service = Service::new(test_config(&dir)).await.unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        Service::add_node_after(service.engine().clone(), Duration::from_secs(3600), shutdown).await;

        assert_eq!(service.engine().node_count().await, 3);
    }
}
