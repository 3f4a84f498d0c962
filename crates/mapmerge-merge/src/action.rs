//! Merge actions: inert descriptions of edits to the target scene.
//!
//! Actions never touch a scene themselves. An executor (see
//! [`apply_actions`](crate::apply_actions)) or an editor applies them after
//! every conflict has been resolved.

use std::fmt;

use serde::{Deserialize, Serialize};

use mapmerge_diff::{KeyValueDifference, KeyValueDifferenceKind};
use mapmerge_types::{NodeRef, SceneId};

/// Variant tag of a [`MergeAction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    AddEntity,
    RemoveEntity,
    AddChild,
    RemoveChild,
    SetKeyValue,
    RemoveKeyValue,
    EntityConflict,
    KeyValueConflict,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AddEntity => "add entity",
            Self::RemoveEntity => "remove entity",
            Self::AddChild => "add child",
            Self::RemoveChild => "remove child",
            Self::SetKeyValue => "set key value",
            Self::RemoveKeyValue => "remove key value",
            Self::EntityConflict => "entity conflict",
            Self::KeyValueConflict => "key value conflict",
        };
        write!(f, "{name}")
    }
}

/// How a conflict has been decided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionType {
    /// Nobody decided yet. Conflicts start out here.
    #[default]
    Unresolved,
    /// Import the source change, overriding the target.
    ApplySourceChange,
    /// Keep the target as it is.
    RejectSourceChange,
}

/// A whole-entity conflict: one side removed an entity the other modified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConflictResolution {
    conflicting_entity: NodeRef,
    source_action: Box<MergeAction>,
    resolution: ResolutionType,
}

impl EntityConflictResolution {
    pub fn new(conflicting_entity: NodeRef, source_action: MergeAction) -> Self {
        Self {
            conflicting_entity,
            source_action: Box::new(source_action),
            resolution: ResolutionType::Unresolved,
        }
    }

    /// The target entity the conflict is about, or the base entity when the
    /// target removed it.
    pub fn conflicting_entity(&self) -> NodeRef {
        self.conflicting_entity
    }

    /// What happens to the target if the source change is accepted.
    pub fn source_action(&self) -> &MergeAction {
        &self.source_action
    }

    pub fn resolution(&self) -> ResolutionType {
        self.resolution
    }

    pub fn resolve(&mut self, resolution: ResolutionType) {
        self.resolution = resolution;
    }
}

/// Both sides changed the same key of the same entity to different outcomes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueConflictResolution {
    conflicting_entity: NodeRef,
    source_action: Box<MergeAction>,
    target_action: Box<MergeAction>,
    resolution: ResolutionType,
}

impl KeyValueConflictResolution {
    pub fn new(
        conflicting_entity: NodeRef,
        source_action: MergeAction,
        target_action: MergeAction,
    ) -> Self {
        Self {
            conflicting_entity,
            source_action: Box::new(source_action),
            target_action: Box::new(target_action),
            resolution: ResolutionType::Unresolved,
        }
    }

    /// The entity in the target scene both changes apply to.
    pub fn conflicting_entity(&self) -> NodeRef {
        self.conflicting_entity
    }

    /// The change the source made, expressed against the target entity.
    pub fn source_action(&self) -> &MergeAction {
        &self.source_action
    }

    /// The change the target made. Already present in the target scene.
    pub fn target_action(&self) -> &MergeAction {
        &self.target_action
    }

    pub fn resolution(&self) -> ResolutionType {
        self.resolution
    }

    pub fn resolve(&mut self, resolution: ResolutionType) {
        self.resolution = resolution;
    }
}

/// One step of a merge.
///
/// Handles are non-owning. Entity and child handles of add actions point
/// into the source scene; every other handle points into the target scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeAction {
    /// Copy a source entity (with its primitives) into the target scene.
    AddEntity { entity: NodeRef, target: SceneId },
    /// Remove a target entity.
    RemoveEntity { entity: NodeRef },
    /// Copy a source primitive into a target entity.
    AddChild { child: NodeRef, parent: NodeRef },
    /// Remove a target primitive.
    RemoveChild { child: NodeRef },
    /// Add or change a key on a target entity.
    SetKeyValue {
        entity: NodeRef,
        key: String,
        value: String,
    },
    /// Remove a key from a target entity.
    RemoveKeyValue { entity: NodeRef, key: String },
    EntityConflict(EntityConflictResolution),
    KeyValueConflict(KeyValueConflictResolution),
}

impl MergeAction {
    /// The action that brings `diff` about on `entity`.
    pub fn for_key_value_difference(diff: &KeyValueDifference, entity: NodeRef) -> Self {
        match diff.kind {
            KeyValueDifferenceKind::KeyValueAdded | KeyValueDifferenceKind::KeyValueChanged => {
                Self::SetKeyValue {
                    entity,
                    key: diff.key.clone(),
                    value: diff.value.clone(),
                }
            }
            KeyValueDifferenceKind::KeyValueRemoved => Self::RemoveKeyValue {
                entity,
                key: diff.key.clone(),
            },
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Self::AddEntity { .. } => ActionType::AddEntity,
            Self::RemoveEntity { .. } => ActionType::RemoveEntity,
            Self::AddChild { .. } => ActionType::AddChild,
            Self::RemoveChild { .. } => ActionType::RemoveChild,
            Self::SetKeyValue { .. } => ActionType::SetKeyValue,
            Self::RemoveKeyValue { .. } => ActionType::RemoveKeyValue,
            Self::EntityConflict(_) => ActionType::EntityConflict,
            Self::KeyValueConflict(_) => ActionType::KeyValueConflict,
        }
    }

    /// The node a UI should highlight for this action.
    pub fn affected_node(&self) -> NodeRef {
        match self {
            Self::AddEntity { entity, .. }
            | Self::RemoveEntity { entity }
            | Self::SetKeyValue { entity, .. }
            | Self::RemoveKeyValue { entity, .. } => *entity,
            Self::AddChild { child, .. } | Self::RemoveChild { child } => *child,
            Self::EntityConflict(conflict) => conflict.conflicting_entity(),
            Self::KeyValueConflict(conflict) => conflict.conflicting_entity(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::EntityConflict(_) | Self::KeyValueConflict(_))
    }

    /// The resolution state of a conflict action, `None` for plain actions.
    pub fn resolution(&self) -> Option<ResolutionType> {
        match self {
            Self::EntityConflict(conflict) => Some(conflict.resolution()),
            Self::KeyValueConflict(conflict) => Some(conflict.resolution()),
            _ => None,
        }
    }

    /// Decide a conflict. Returns `false` (and does nothing) for plain actions.
    pub fn resolve(&mut self, resolution: ResolutionType) -> bool {
        match self {
            Self::EntityConflict(conflict) => conflict.resolve(resolution),
            Self::KeyValueConflict(conflict) => conflict.resolve(resolution),
            _ => return false,
        }
        true
    }
}

impl fmt::Display for MergeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddEntity { entity, .. } => write!(f, "add entity {entity}"),
            Self::RemoveEntity { entity } => write!(f, "remove entity {entity}"),
            Self::AddChild { child, parent } => write!(f, "add child {child} to {parent}"),
            Self::RemoveChild { child } => write!(f, "remove child {child}"),
            Self::SetKeyValue { entity, key, value } => {
                write!(f, "set {key:?} = {value:?} on {entity}")
            }
            Self::RemoveKeyValue { entity, key } => write!(f, "remove {key:?} from {entity}"),
            Self::EntityConflict(conflict) => {
                write!(f, "conflict on {}: {}", conflict.conflicting_entity, conflict.source_action)
            }
            Self::KeyValueConflict(conflict) => write!(
                f,
                "conflict on {}: {} vs {}",
                conflict.conflicting_entity, conflict.source_action, conflict.target_action
            ),
        }
    }
}
