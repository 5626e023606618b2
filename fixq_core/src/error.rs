//! Error types for fixq
//!
//! Structural errors (broken graph, broken quant groups, sentinel misuse) are
//! fatal for the pipeline. Classification problems in a compiled artifact are
//! not errors: they are reported through [`crate::inspector::InspectionReport`].

use thiserror::Error;

/// Main error type for fixq operations
#[derive(Debug, Error)]
pub enum FixqError {
    #[error("Node '{0}' already exists in graph")]
    DuplicateNode(String),

    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    #[error("Operation not permitted on the head sentinel")]
    HeadSentinel,

    #[error("Node slot {0} is not linked into the node list")]
    DetachedNode(usize),

    #[error("Position space exhausted while inserting '{0}'")]
    PositionSpaceExhausted(String),

    #[error("Node list was modified during traversal (expected revision {expected}, found {found})")]
    ConcurrentModification { expected: u64, found: u64 },

    #[error("No quant group registered for node '{0}'")]
    MissingQuantGroup(String),

    #[error("Quant group {group:?} disagrees on quantization (quantized: {quantized:?}, not quantized: {not_quantized:?})")]
    InconsistentQuantGroup {
        group: Vec<String>,
        quantized: Vec<String>,
        not_quantized: Vec<String>,
    },

    #[error("Node '{node}' already belongs to quant group {existing:?}")]
    GroupConflict { node: String, existing: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Compiler error: {0}")]
    Compiler(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FixqError {
    pub fn config(msg: impl Into<String>) -> Self {
        FixqError::Config(msg.into())
    }

    pub fn compiler(msg: impl Into<String>) -> Self {
        FixqError::Compiler(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        FixqError::InvalidInput(msg.into())
    }

    /// Structural errors indicate the graph or quant model diverged and must abort the pipeline
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            FixqError::DuplicateNode(_)
                | FixqError::NodeNotFound(_)
                | FixqError::HeadSentinel
                | FixqError::DetachedNode(_)
                | FixqError::PositionSpaceExhausted(_)
                | FixqError::ConcurrentModification { .. }
                | FixqError::MissingQuantGroup(_)
                | FixqError::InconsistentQuantGroup { .. }
                | FixqError::GroupConflict { .. }
        )
    }
}

/// Result type for fixq operations
pub type FixqResult<T> = Result<T, FixqError>;
