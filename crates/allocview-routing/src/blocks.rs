//! Cluster-wide blocks.

use serde::{Deserialize, Serialize};

/// Operation class a block applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockLevel {
    Read,
    Write,
    MetadataRead,
    MetadataWrite,
}

/// A block installed on the whole cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterBlock {
    pub id: u32,
    pub description: String,
    pub levels: Vec<BlockLevel>,
    #[serde(default)]
    pub retryable: bool,
}

impl ClusterBlock {
    pub fn blocks(&self, level: BlockLevel) -> bool {
        self.levels.contains(&level)
    }
}

/// Global blocks of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterBlocks {
    global: Vec<ClusterBlock>,
}

impl ClusterBlocks {
    pub fn new(global: Vec<ClusterBlock>) -> Self {
        Self { global }
    }

    /// First global block covering `level`, if any.
    pub fn global_blocked(&self, level: BlockLevel) -> Option<&ClusterBlock> {
        self.global.iter().find(|b| b.blocks(level))
    }

    pub fn global(&self) -> &[ClusterBlock] {
        &self.global
    }
}
