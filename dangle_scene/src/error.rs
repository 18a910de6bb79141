use dangle_ids::NodeID;
use thiserror::Error;

pub type SceneResult<T> = std::result::Result<T, SceneError>;

/// Errors raised by the host scene graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("node {0} not found")]
    NodeNotFound(NodeID),

    #[error("name `{0}` is already taken")]
    NameTaken(String),

    #[error("invalid node name `{0}`")]
    InvalidName(String),

    #[error("parenting {child} under {parent} would create a cycle")]
    Cycle { child: NodeID, parent: NodeID },

    #[error("destination `{0}` already has an incoming connection")]
    AlreadyConnected(String),

    #[error("`{from}` is not connected to `{to}`")]
    NotConnected { from: String, to: String },

    #[error("node `{0}` is locked")]
    Locked(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}
