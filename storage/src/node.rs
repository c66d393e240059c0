use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Byte source a chunk is copied from.
pub type ObjectReader<'a> = dyn AsyncRead + Send + Unpin + 'a;

/// Open handle on a stored chunk. Dropping it closes the underlying resource.
pub type ChunkReader = Box<dyn AsyncRead + Send + Unpin>;

/// A storage backend holding chunks of objects under their object name.
///
/// The id is also the node's index in the engine's node collection, so it
/// must stay stable for the lifetime of the node.
#[async_trait]
pub trait Node: Send + Sync {
    fn id(&self) -> usize;

    /// Persist exactly `size` bytes read from `reader` under `name`.
    ///
    /// Fails with [`StorageError::AlreadyExists`](crate::StorageError::AlreadyExists)
    /// if this node already holds data for `name`. Used space grows only when
    /// the whole chunk was written.
    async fn store(
        &self,
        name: &str,
        size: u64,
        reader: &mut ObjectReader<'_>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Open the chunk stored under `name`, returning it with its size in bytes.
    async fn get(&self, name: &str) -> Result<(ChunkReader, u64)>;

    async fn remove(&self, name: &str) -> Result<()>;

    /// Free fraction of the node's capacity in `[0, 1]`, `0` for a node
    /// without capacity.
    fn free_space_ratio(&self) -> f64;

    fn used_space(&self) -> u64;

    fn total_space(&self) -> u64;
}

/// Builds nodes for the engine, both at startup and when the pool grows.
#[async_trait]
pub trait NodeProvisioner: Send + Sync {
    async fn provision(&self, id: usize, used_space: u64, total_space: u64) -> Result<Arc<dyn Node>>;
}

pub(crate) fn ratio(used_space: u64, total_space: u64) -> f64 {
    if total_space == 0 {
        return 0.0;
    }

    (1.0 - used_space as f64 / total_space as f64).clamp(0.0, 1.0)
}
