//! Error types for the merge crate.

use mapmerge_diff::EntityDifferenceKind;
use mapmerge_types::{NodeRef, SceneId};

/// Errors that can occur while building or applying a merge.
///
/// Genuine merge conflicts are never errors; they are reported as conflict
/// actions. Everything here means the inputs were inconsistent or the
/// caller broke a contract.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The two comparison results were computed against different bases.
    #[error("the base scene of the two comparison results must be the same (source side: {source_base:?}, target side: {target_base:?})")]
    BaseSceneMismatch {
        source_base: SceneId,
        target_base: SceneId,
    },

    /// The target scene passed in is not the one the target comparison
    /// was computed for.
    #[error("target scene {actual:?} does not match the compared scene {expected:?}")]
    TargetSceneMismatch { expected: SceneId, actual: SceneId },

    /// A comparison result lists the same entity twice.
    #[error("entity {entity} appears more than once in the {side} comparison")]
    DuplicateEntityDifference { entity: String, side: &'static str },

    /// The difference kinds of the two sides cannot both be true for one base.
    #[error("entity {entity} is marked as {source_kind} in source, but as {target_kind} in target")]
    InconsistentDifferences {
        entity: String,
        source_kind: EntityDifferenceKind,
        target_kind: EntityDifferenceKind,
    },

    /// The target has no entity of this name although it did not change it.
    #[error("entity {0} is not present in the target scene")]
    TargetEntityNotFound(String),

    /// An extension toggle that has no implementation was enabled.
    #[error("{0} is not supported yet")]
    NotSupported(&'static str),

    /// The executor met a conflict nobody resolved.
    #[error("conflict action at index {index} is unresolved")]
    UnresolvedConflict { index: usize },

    /// An action handle points into a scene the executor was not given.
    #[error("node {node} does not belong to scene {expected:?}")]
    ForeignNode { node: NodeRef, expected: SceneId },

    /// Scene access failed while applying actions.
    #[error("scene error: {0}")]
    Scene(#[from] mapmerge_scene::SceneError),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
