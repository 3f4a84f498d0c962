use mapmerge_types::NodeId;

/// Errors from scene access.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SceneError {
    /// The node does not exist in this scene (never did, or was removed).
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// An entity was expected but the node is a primitive.
    #[error("node {0} is not an entity")]
    NotAnEntity(NodeId),

    /// A primitive was expected but the node is an entity.
    #[error("node {0} is not a primitive")]
    NotAPrimitive(NodeId),

    /// The scene already holds as many nodes as a [`NodeId`] can address.
    #[error("node limit reached: {0} nodes")]
    NodeLimit(usize),
}

/// Result alias for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;
