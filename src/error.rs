//! Error types for the render pipeline.
//!
//! Tree-consistency faults abort the frame that hits them. Measurement,
//! growth, and color faults are recovered where they occur and never show up
//! here.

use thiserror::Error;

use crate::types::NodeId;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("node {0} has no layout counterpart")]
    MissingOracleNode(NodeId),

    #[error("node {0} cannot have children")]
    NotAContainer(NodeId),

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("node {node} is not a {expected} node")]
    WrongKind { node: NodeId, expected: &'static str },

    #[error("attaching {child} under {parent} would create a cycle")]
    WouldCycle { parent: NodeId, child: NodeId },

    #[error("the root node cannot be {0}")]
    RootImmutable(&'static str),

    #[error("layout engine error: {0}")]
    Oracle(String),

    #[error("invalid props: {0}")]
    InvalidProps(#[from] serde_json::Error),

    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;

impl From<taffy::TaffyError> for RenderError {
    fn from(e: taffy::TaffyError) -> Self {
        RenderError::Oracle(format!("{e:?}"))
    }
}
