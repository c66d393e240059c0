use parking_lot::Mutex;
use std::collections::HashMap;

use crate::object::ObjectMeta;
use crate::{Result, StorageError};

/// In-memory index of object name to chunk placement.
///
/// A single lock covers the whole map; it is only held for the duration of
/// one map operation.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: Mutex<HashMap<String, ObjectMeta>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name` for an upload.
    ///
    /// Fails if the name is known in any state, including an upload that
    /// never completed.
    pub fn begin_upload(&self, name: &str) -> Result<()> {
        let mut objects = self.objects.lock();
        if objects.contains_key(name) {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }

        objects.insert(name.to_string(), ObjectMeta::placeholder(name));
        Ok(())
    }

    pub fn complete(&self, name: &str, total_size: u64, nodes: Vec<usize>) {
        self.objects
            .lock()
            .insert(name.to_string(), ObjectMeta::stored(name, total_size, nodes));
    }

    pub fn lookup(&self, name: &str) -> Option<ObjectMeta> {
        self.objects.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
