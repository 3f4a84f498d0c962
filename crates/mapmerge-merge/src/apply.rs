//! Reference executor for merge actions.
//!
//! Applies a resolved action list to a [`SceneGraphMut`] target, copying
//! added entities and primitives out of the source scene.

use tracing::{debug, trace};

use mapmerge_scene::{SceneGraph, SceneGraphMut};
use mapmerge_types::{NodeRef, SceneId};

use crate::action::{MergeAction, ResolutionType};
use crate::error::{MergeError, MergeResult};

/// What [`apply_actions`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Actions that changed the target.
    pub applied: usize,
    /// Conflicts resolved as [`ResolutionType::RejectSourceChange`].
    pub skipped: usize,
}

/// Resolve every conflict in `actions` the same way.
///
/// Returns the number of conflicts touched.
pub fn resolve_all(actions: &mut [MergeAction], resolution: ResolutionType) -> usize {
    actions
        .iter_mut()
        .map(|action| action.resolve(resolution))
        .filter(|&resolved| resolved)
        .count()
}

/// Apply `actions` to `target` in order.
///
/// Every conflict must be resolved and every handle must point into the
/// scene its role requires (`source` for added content, `target` for
/// everything else). Both are checked before the first edit, so a contract
/// violation leaves the target untouched. A scene error during application
/// (for example a handle to a node that was deleted in the meantime) aborts
/// with the actions before it already applied.
pub fn apply_actions(
    actions: &[MergeAction],
    source: &dyn SceneGraph,
    target: &mut dyn SceneGraphMut,
) -> MergeResult<ApplySummary> {
    let source_scene = source.scene_id();
    let target_scene = target.scene_id();

    for (index, action) in actions.iter().enumerate() {
        if action.resolution() == Some(ResolutionType::Unresolved) {
            return Err(MergeError::UnresolvedConflict { index });
        }
        if let Some(effective) = effective_action(action) {
            check_scenes(effective, source_scene, target_scene)?;
        }
    }

    let mut summary = ApplySummary::default();
    for action in actions {
        match effective_action(action) {
            Some(effective) => {
                apply_one(effective, source, target)?;
                trace!(action = %effective, "applied merge action");
                summary.applied += 1;
            }
            None => summary.skipped += 1,
        }
    }

    debug!(
        target = %target_scene.short_id(),
        applied = summary.applied,
        skipped = summary.skipped,
        "applied merge actions"
    );

    Ok(summary)
}

/// The plain action a (possibly resolved) action stands for, `None` if the
/// source change was rejected.
fn effective_action(action: &MergeAction) -> Option<&MergeAction> {
    let (resolution, source_action) = match action {
        MergeAction::EntityConflict(conflict) => (conflict.resolution(), conflict.source_action()),
        MergeAction::KeyValueConflict(conflict) => {
            (conflict.resolution(), conflict.source_action())
        }
        plain => return Some(plain),
    };
    match resolution {
        ResolutionType::ApplySourceChange => effective_action(source_action),
        ResolutionType::Unresolved | ResolutionType::RejectSourceChange => None,
    }
}

fn expect_scene(node: NodeRef, expected: SceneId) -> MergeResult<()> {
    if node.belongs_to(expected) {
        Ok(())
    } else {
        Err(MergeError::ForeignNode { node, expected })
    }
}

fn check_scenes(action: &MergeAction, source: SceneId, target: SceneId) -> MergeResult<()> {
    match action {
        MergeAction::AddEntity {
            entity,
            target: destination,
        } => {
            expect_scene(*entity, source)?;
            if *destination != target {
                return Err(MergeError::TargetSceneMismatch {
                    expected: *destination,
                    actual: target,
                });
            }
            Ok(())
        }
        MergeAction::AddChild { child, parent } => {
            expect_scene(*child, source)?;
            expect_scene(*parent, target)
        }
        MergeAction::RemoveEntity { entity }
        | MergeAction::SetKeyValue { entity, .. }
        | MergeAction::RemoveKeyValue { entity, .. } => expect_scene(*entity, target),
        MergeAction::RemoveChild { child } => expect_scene(*child, target),
        // Flattened by effective_action.
        MergeAction::EntityConflict(_) | MergeAction::KeyValueConflict(_) => Ok(()),
    }
}

fn apply_one(
    action: &MergeAction,
    source: &dyn SceneGraph,
    target: &mut dyn SceneGraphMut,
) -> MergeResult<()> {
    match action {
        MergeAction::AddEntity { entity, .. } => {
            let snapshot = source.entity_snapshot(entity.node)?;
            target.insert_entity(snapshot)?;
        }
        MergeAction::RemoveEntity { entity } => target.remove_entity(entity.node)?,
        MergeAction::AddChild { child, parent } => {
            let primitive = source.primitive(child.node)?.clone();
            target.add_child(parent.node, primitive)?;
        }
        MergeAction::RemoveChild { child } => target.remove_child(child.node)?,
        MergeAction::SetKeyValue { entity, key, value } => {
            target.set_key_value(entity.node, key, value)?
        }
        MergeAction::RemoveKeyValue { entity, key } => {
            target.remove_key_value(entity.node, key)?;
        }
        MergeAction::EntityConflict(_) | MergeAction::KeyValueConflict(_) => {}
    }
    Ok(())
}
