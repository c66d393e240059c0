use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placement record of one named object.
///
/// An entry with `total_size == 0` and no nodes is a placeholder for an
/// upload that has not completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub total_size: u64,
    /// Node indices holding the object's chunks, in byte order.
    pub nodes: Vec<usize>,
    pub created_at: DateTime<Utc>,
}

impl ObjectMeta {
    pub fn placeholder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            total_size: 0,
            nodes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn stored(name: &str, total_size: u64, nodes: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            total_size,
            nodes,
            created_at: Utc::now(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.total_size == 0 && self.nodes.is_empty()
    }
}
