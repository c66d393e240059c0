mod disk;
mod engine;
mod node;
mod object;
mod placement;
mod registry;
mod stream;

pub use disk::{DiskNode, DiskProvisioner};
pub use engine::{DistributionEngine, EngineConfig, InitialCapacity};
pub use node::{ChunkReader, Node, NodeProvisioner, ObjectReader};
pub use object::ObjectMeta;
pub use placement::split;
pub use registry::ObjectRegistry;
pub use stream::ObjectStream;

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Empty input")]
    EmptyInput,

    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Node {node} failed for {name}: {source}")]
    Node {
        node: usize,
        name: String,
        #[source]
        source: Box<StorageError>,
    },
}

impl StorageError {
    pub(crate) fn on_node(self, node: usize, name: &str) -> Self {
        StorageError::Node {
            node,
            name: name.to_string(),
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through any `Node` wrapping.
    pub fn root_cause(&self) -> &StorageError {
        match self {
            StorageError::Node { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
