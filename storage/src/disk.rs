use async_trait::async_trait;
use parking_lot::RwLock;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::node::{self, ChunkReader, Node, NodeProvisioner, ObjectReader};
use crate::{Result, StorageError};

#[derive(Debug)]
struct Capacity {
    used: u64,
    total: u64,
}

/// Node keeping each chunk as a plain file at `<root>/<id>/<name>`.
///
/// Capacity is bookkeeping only: it starts from the values the node was
/// created with and is not reconciled with the files already on disk.
#[derive(Debug)]
pub struct DiskNode {
    id: usize,
    directory: PathBuf,
    capacity: RwLock<Capacity>,
}

impl DiskNode {
    pub async fn new<P: AsRef<Path>>(root: P, id: usize, used_space: u64, total_space: u64) -> Result<Self> {
        let directory = root.as_ref().join(id.to_string());
        fs::create_dir_all(&directory).await?;

        tracing::debug!("Disk node {} ready at {:?}", id, directory);

        Ok(Self {
            id,
            directory,
            capacity: RwLock::new(Capacity {
                used: used_space,
                total: total_space,
            }),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn chunk_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.directory.join(name))
    }

}

/// Chunk file that is deleted on drop unless `keep` was called, so a store
/// that fails or is dropped mid-copy leaves nothing behind.
struct PartialChunk<'a> {
    path: &'a Path,
    node: usize,
    kept: bool,
}

impl<'a> PartialChunk<'a> {
    fn new(path: &'a Path, node: usize) -> Self {
        Self { path, node, kept: false }
    }

    fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for PartialChunk<'_> {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        if let Err(e) = std::fs::remove_file(self.path) {
            tracing::warn!("Failed to discard partial chunk {:?} on node {}: {}", self.path, self.node, e);
        }
    }
}

#[async_trait]
impl Node for DiskNode {
    fn id(&self) -> usize {
        self.id
    }

    async fn store(
        &self,
        name: &str,
        size: u64,
        reader: &mut ObjectReader<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let path = self.chunk_path(name)?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(format!("{} on node {}", name, self.id)));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };
        let partial = PartialChunk::new(&path, self.id);

        let copied = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StorageError::Cancelled),
            result = copy_exact(reader, &mut file, size) => result,
        };

        drop(file);
        copied?;
        partial.keep();

        self.capacity.write().used += size;

        Ok(())
    }

    async fn get(&self, name: &str) -> Result<(ChunkReader, u64)> {
        let path = self.chunk_path(name)?;

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{} on node {}", name, self.id)));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let size = file.metadata().await?.len();

        Ok((Box::new(file), size))
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let path = self.chunk_path(name)?;

        let size = match fs::metadata(&path).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{} on node {}", name, self.id)));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        fs::remove_file(&path).await?;

        let mut capacity = self.capacity.write();
        capacity.used = capacity.used.saturating_sub(size);

        Ok(())
    }

    fn free_space_ratio(&self) -> f64 {
        let capacity = self.capacity.read();
        node::ratio(capacity.used, capacity.total)
    }

    fn used_space(&self) -> u64 {
        self.capacity.read().used
    }

    fn total_space(&self) -> u64 {
        self.capacity.read().total
    }
}

async fn copy_exact(reader: &mut ObjectReader<'_>, file: &mut File, size: u64) -> Result<()> {
    let mut limited = reader.take(size);
    let copied = tokio::io::copy(&mut limited, file).await?;

    if copied != size {
        return Err(StorageError::SizeMismatch {
            expected: size,
            actual: copied,
        });
    }

    file.flush().await?;
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(StorageError::InvalidName(name.to_string()));
    }

    Ok(())
}

/// Provisions [`DiskNode`]s under a shared root directory.
#[derive(Debug, Clone)]
pub struct DiskProvisioner {
    root: PathBuf,
}

impl DiskProvisioner {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl NodeProvisioner for DiskProvisioner {
    async fn provision(&self, id: usize, used_space: u64, total_space: u64) -> Result<Arc<dyn Node>> {
        let node = DiskNode::new(&self.root, id, used_space, total_space).await?;
        Ok(Arc::new(node))
    }
}
