use thiserror::Error;

use crate::selector::SelectorError;
use crate::NodeId;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    #[error("hierarchy error: {0}")]
    Hierarchy(String),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error("fixture error: {0}")]
    Fixture(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
