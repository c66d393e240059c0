use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::node::{Node, NodeProvisioner, ObjectReader};
use crate::object::ObjectMeta;
use crate::placement;
use crate::registry::ObjectRegistry;
use crate::stream::{ObjectStream, PieceSender};
use crate::{Result, StorageError};

const MIB: u64 = 1024 * 1024;

/// Size of the pieces a chunk is cut into on the way back to the reader.
const PIECE_SIZE: usize = 64 * 1024;

/// Pieces buffered between the chunk reader task and the consumer.
const STREAM_BUFFER: usize = 8;

/// Capacity given to the nodes created at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialCapacity {
    /// Empty nodes of `node_capacity` bytes.
    Fixed,
    /// Partially used nodes of random size, so a fresh pool is uneven:
    /// 5..15 MiB used out of 20..50 MiB.
    Randomized,
}

impl InitialCapacity {
    fn sample(self, node_capacity: u64) -> (u64, u64) {
        match self {
            InitialCapacity::Fixed => (0, node_capacity),
            InitialCapacity::Randomized => {
                let mut rng = rand::thread_rng();
                let used = 5 * MIB + rng.gen_range(0..10 * MIB) + 1;
                let total = 20 * MIB + rng.gen_range(0..30 * MIB) + 1;
                (used, total)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_nodes: usize,
    /// Capacity of nodes added at runtime, and of startup nodes when
    /// `initial_capacity` is `Fixed`.
    pub node_capacity: u64,
    pub initial_capacity: InitialCapacity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_nodes: 6,
            node_capacity: 30 * MIB,
            initial_capacity: InitialCapacity::Randomized,
        }
    }
}

type NodeList = Arc<RwLock<Vec<Arc<dyn Node>>>>;

/// Spreads objects over a growing pool of nodes and reassembles them on read.
///
/// The node list and the object registry sit behind separate locks, and
/// neither is held while chunk data is moving.
pub struct DistributionEngine {
    config: EngineConfig,
    provisioner: Arc<dyn NodeProvisioner>,
    nodes: NodeList,
    registry: ObjectRegistry,
}

impl DistributionEngine {
    pub async fn new(config: EngineConfig, provisioner: Arc<dyn NodeProvisioner>) -> Result<Self> {
        let mut nodes = Vec::with_capacity(config.initial_nodes);

        for id in 0..config.initial_nodes {
            let (used_space, total_space) = config.initial_capacity.sample(config.node_capacity);
            let node = provisioner.provision(id, used_space, total_space).await?;
            nodes.push(node);
        }

        Self::with_nodes(config, provisioner, nodes)
    }

    /// Build an engine over nodes created elsewhere. Each node's id must
    /// match its position in `nodes`.
    pub fn with_nodes(
        config: EngineConfig,
        provisioner: Arc<dyn NodeProvisioner>,
        nodes: Vec<Arc<dyn Node>>,
    ) -> Result<Self> {
        if let Some((index, node)) = nodes.iter().enumerate().find(|(i, n)| n.id() != *i) {
            return Err(StorageError::Internal(format!(
                "node at position {} reports id {}",
                index,
                node.id()
            )));
        }

        tracing::info!("Distribution engine started with {} nodes", nodes.len());

        Ok(Self {
            config,
            provisioner,
            nodes: Arc::new(RwLock::new(nodes)),
            registry: ObjectRegistry::new(),
        })
    }

    /// Store `size` bytes from `reader` under `name`, spread over the pool.
    ///
    /// Either the whole object is stored or none of it is: chunks already
    /// written are removed again when a later node fails or the returned
    /// future is dropped before completing. The name stays reserved after a
    /// failure.
    pub async fn store(
        &self,
        name: &str,
        size: u64,
        reader: &mut ObjectReader<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if size == 0 {
            return Err(StorageError::EmptyInput);
        }

        self.registry.begin_upload(name)?;

        let nodes = self.snapshot().await;
        if nodes.is_empty() {
            return Err(StorageError::Internal("no storage nodes available".to_string()));
        }

        let ratios: Vec<f64> = nodes.iter().map(|node| node.free_space_ratio()).collect();
        let split = placement::split(size, &ratios);
        if split.iter().map(|&chunk| u128::from(chunk)).sum::<u128>() != u128::from(size) {
            return Err(StorageError::Internal(format!(
                "cannot place {} bytes, pool reports no free space",
                size
            )));
        }

        let mut written = WrittenChunks::new(name);

        // chunks come off one sequential stream, so node order is byte order
        for (node, chunk_size) in nodes.iter().zip(split) {
            if chunk_size == 0 {
                continue;
            }

            let result = if cancel.is_cancelled() {
                Err(StorageError::Cancelled)
            } else {
                let mut range = (&mut *reader).take(chunk_size);
                node.store(name, chunk_size, &mut range, cancel).await
            };

            if let Err(e) = result {
                written.roll_back().await;
                return Err(match e {
                    StorageError::Cancelled => e,
                    e => e.on_node(node.id(), name),
                });
            }

            written.push(node.clone());
        }

        let written = written.commit();
        tracing::info!("Stored object {} ({} bytes) on nodes {:?}", name, size, written);
        self.registry.complete(name, size, written);

        Ok(())
    }

    /// Open a stored object for reading.
    ///
    /// Only an unknown or incomplete object fails here. Chunks are fetched
    /// by a background task, and problems reading them show up as errors on
    /// the returned stream.
    pub fn load(&self, name: &str, cancel: &CancellationToken) -> Result<(ObjectStream, u64)> {
        let meta = match self.registry.lookup(name) {
            Some(meta) if !meta.is_placeholder() => meta,
            _ => return Err(StorageError::NotFound(name.to_string())),
        };

        let total_size = meta.total_size;
        let (tx, stream) = ObjectStream::channel(STREAM_BUFFER);

        tokio::spawn(produce(self.nodes.clone(), meta, tx, cancel.clone()));

        Ok((stream, total_size))
    }

    /// Free space ratio of every node, in node order.
    pub async fn stats(&self) -> Vec<f64> {
        self.nodes
            .read()
            .await
            .iter()
            .map(|node| node.free_space_ratio())
            .collect()
    }

    /// Grow the pool by one empty node and return its id.
    pub async fn add_node(&self) -> Result<usize> {
        let mut nodes = self.nodes.write().await;
        let id = nodes.len();

        let node = self
            .provisioner
            .provision(id, 0, self.config.node_capacity)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create storage node {}: {}", id, e);
                e
            })?;

        nodes.push(node);
        tracing::info!("Storage node {} added", id);

        Ok(id)
    }

    pub async fn node(&self, id: usize) -> Option<Arc<dyn Node>> {
        self.nodes.read().await.get(id).cloned()
    }

    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub fn object_meta(&self, name: &str) -> Option<ObjectMeta> {
        self.registry.lookup(name)
    }

    pub fn object_count(&self) -> usize {
        self.registry.len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn snapshot(&self) -> Vec<Arc<dyn Node>> {
        self.nodes.read().await.clone()
    }
}

/// Chunks written so far by one `store` call.
///
/// Anything not committed is removed again: inline by `roll_back`, or from a
/// spawned task when the store future is dropped partway through.
struct WrittenChunks {
    name: String,
    nodes: Vec<Arc<dyn Node>>,
}

impl WrittenChunks {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: Vec::new(),
        }
    }

    fn push(&mut self, node: Arc<dyn Node>) {
        self.nodes.push(node);
    }

    fn commit(mut self) -> Vec<usize> {
        self.nodes.drain(..).map(|node| node.id()).collect()
    }

    async fn roll_back(mut self) {
        // pop one at a time so an interrupted rollback leaves the rest to `drop`
        while let Some(node) = self.nodes.pop() {
            remove_chunk(node.as_ref(), &self.name).await;
        }
    }
}

impl Drop for WrittenChunks {
    fn drop(&mut self) {
        if self.nodes.is_empty() {
            return;
        }

        let name = std::mem::take(&mut self.name);
        let nodes = std::mem::take(&mut self.nodes);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("Store of {} interrupted, rolling back {} chunks", name, nodes.len());
                handle.spawn(async move {
                    for node in nodes {
                        remove_chunk(node.as_ref(), &name).await;
                    }
                });
            }
            Err(_) => {
                tracing::error!("Store of {} interrupted outside a runtime, {} chunks left behind", name, nodes.len());
            }
        }
    }
}

async fn remove_chunk(node: &dyn Node, name: &str) {
    if let Err(e) = node.remove(name).await {
        tracing::warn!("Failed to remove {} from node {} during rollback: {}", name, node.id(), e);
    }
}

async fn produce(nodes: NodeList, meta: ObjectMeta, mut tx: PieceSender, cancel: CancellationToken) {
    for &index in &meta.nodes {
        let node = nodes.read().await.get(index).cloned();

        let result = match node {
            Some(node) => send_chunk(node.as_ref(), &meta.name, &mut tx, &cancel).await,
            None => Err(StorageError::Internal(format!("node {} is not registered", index))),
        };

        if let Err(e) = result {
            if tx.is_closed() {
                tracing::debug!("Reader of {} went away before node {} was sent", meta.name, index);
                return;
            }

            tracing::warn!("Failed to stream {}: {}", meta.name, e);
            if tx.send(Err(io::Error::other(e))).await.is_err() {
                tracing::debug!("Reader of {} went away before the error was sent", meta.name);
            }
            return;
        }
    }
}

async fn send_chunk(
    node: &dyn Node,
    name: &str,
    tx: &mut PieceSender,
    cancel: &CancellationToken,
) -> Result<()> {
    let (chunk, size) = node.get(name).await.map_err(|e| e.on_node(node.id(), name))?;
    let mut pieces = ReaderStream::with_capacity(chunk, PIECE_SIZE);
    let mut copied = 0u64;

    loop {
        let piece = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StorageError::Cancelled),
            piece = pieces.next() => piece,
        };

        let Some(piece) = piece else { break };
        let piece: Bytes = piece.map_err(|e| StorageError::Io(e).on_node(node.id(), name))?;

        copied += piece.len() as u64;
        tx.send(Ok(piece))
            .await
            .map_err(|_| StorageError::Internal("object stream closed".to_string()))?;
    }

    if copied != size {
        return Err(StorageError::SizeMismatch {
            expected: size,
            actual: copied,
        }
        .on_node(node.id(), name));
    }

    Ok(())
}
