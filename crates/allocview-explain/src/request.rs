//! Explain request fields and validation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExplainError, ExplainResult};
use crate::locator::ShardTarget;

/// What the caller wants explained.
///
/// Leaving `index`, `shard`, `primary` and `current_node` all unset asks
/// for any unassigned shard; setting any of them addresses a specific
/// copy, which then needs `index`, `shard` and `primary`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainRequest {
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub shard: Option<u32>,
    #[serde(default)]
    pub primary: Option<bool>,
    #[serde(default)]
    pub current_node: Option<String>,
    #[serde(default)]
    pub include_yes_decisions: bool,
    #[serde(default)]
    pub include_disk_info: bool,
}

impl ExplainRequest {
    /// Explain any unassigned shard.
    pub fn any_unassigned() -> Self {
        Self::default()
    }

    /// Explain a specific shard copy.
    pub fn for_shard(index: impl Into<String>, shard: u32, primary: bool) -> Self {
        Self {
            index: Some(index.into()),
            shard: Some(shard),
            primary: Some(primary),
            ..Self::default()
        }
    }

    pub fn on_node(mut self, node: impl Into<String>) -> Self {
        self.current_node = Some(node.into());
        self
    }

    pub fn with_yes_decisions(mut self, include: bool) -> Self {
        self.include_yes_decisions = include;
        self
    }

    pub fn with_disk_info(mut self, include: bool) -> Self {
        self.include_disk_info = include;
        self
    }

    pub fn use_any_unassigned_shard(&self) -> bool {
        self.index.is_none() && self.shard.is_none() && self.primary.is_none() && self.current_node.is_none()
    }

    /// Check the addressing fields, reporting every missing one.
    pub fn validate(&self) -> ExplainResult<()> {
        self.target().map(|_| ())
    }

    /// Resolve the addressing mode.
    pub fn target(&self) -> ExplainResult<ShardTarget> {
        if self.use_any_unassigned_shard() {
            return Ok(ShardTarget::AnyUnassigned);
        }

        let mut errors = Vec::new();
        if self.index.is_none() {
            errors.push("index must be specified".to_string());
        }
        if self.shard.is_none() {
            errors.push("shard must be specified".to_string());
        }
        if self.primary.is_none() {
            errors.push("primary must be specified".to_string());
        }

        match (&self.index, self.shard, self.primary) {
            (Some(index), Some(shard), Some(primary)) => Ok(ShardTarget::Specific {
                index: index.clone(),
                shard,
                primary,
                current_node: self.current_node.clone(),
            }),
            _ => Err(ExplainError::Validation(errors)),
        }
    }
}

impl fmt::Display for ExplainRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.use_any_unassigned_shard() {
            f.write_str("useAnyUnassignedShard=true")?;
        } else {
            write!(f, "index={}", self.index.as_deref().unwrap_or("null"))?;
            match self.shard {
                Some(shard) => write!(f, ",shard={shard}")?,
                None => f.write_str(",shard=null")?,
            }
            match self.primary {
                Some(primary) => write!(f, ",primary?={primary}")?,
                None => f.write_str(",primary?=null")?,
            }
            if let Some(node) = &self.current_node {
                write!(f, ",currentNode={node}")?;
            }
        }
        write!(f, ",includeYesDecisions?={}", self.include_yes_decisions)
    }
}
