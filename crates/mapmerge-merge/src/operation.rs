//! The three-way merge operation.
//!
//! [`ThreeWayMergeOperation`] reconciles a base→source and a base→target
//! comparison. Every source-side entity difference is classified against
//! the target-side difference for the same entity name:
//!
//! | source \ target | none     | added    | removed  | modified  |
//! |-----------------|----------|----------|----------|-----------|
//! | added           | add      | add if fingerprints differ | error | error |
//! | removed         | remove   | error    | no-op    | conflict  |
//! | modified        | apply    | error    | conflict | per field |
//!
//! "error" cells cannot happen for two comparisons of the same base; they
//! abort construction.

use std::collections::HashMap;

use tracing::{debug, warn};

use mapmerge_diff::{
    ComparisonResult, EntityDifference, EntityDifferenceKind, KeyValueDifference,
    KeyValueDifferenceKind, PrimitiveDifference, PrimitiveDifferenceKind,
};
use mapmerge_scene::SceneGraph;
use mapmerge_types::{Fingerprint, NodeId, NodeRef, SceneId};

use crate::action::{EntityConflictResolution, KeyValueConflictResolution, MergeAction};
use crate::error::{MergeError, MergeResult};
use crate::settings::MergeSettings;

/// The result of a three-way merge: an ordered, conflict-flagged action list.
///
/// The whole reconciliation runs inside construction; afterwards the
/// operation only hands out its actions. The actions hold handles into the
/// source and target scenes, which must outlive them and must not be edited
/// until the actions have been applied or discarded.
#[derive(Clone, Debug)]
pub struct ThreeWayMergeOperation {
    base_scene: SceneId,
    source_scene: SceneId,
    target_scene: SceneId,
    settings: MergeSettings,
    actions: Vec<MergeAction>,
}

impl ThreeWayMergeOperation {
    /// Merge with default settings. See [`create_with_settings`].
    ///
    /// [`create_with_settings`]: ThreeWayMergeOperation::create_with_settings
    pub fn create_from_comparison_results(
        base_to_source: &ComparisonResult,
        base_to_target: &ComparisonResult,
        target: &dyn SceneGraph,
    ) -> MergeResult<Self> {
        Self::create_with_settings(base_to_source, base_to_target, target, MergeSettings::default())
    }

    /// Reconcile two comparisons of the same base.
    ///
    /// `target` is the scene `base_to_target` was computed for; its live
    /// entities are the ones the resulting actions operate on.
    ///
    /// Fails if the comparisons have different bases, if `target` is not
    /// the compared scene of `base_to_target`, if an enabled setting is not
    /// supported, or if the two comparisons contradict each other. A failed
    /// construction produces no partial result.
    pub fn create_with_settings(
        base_to_source: &ComparisonResult,
        base_to_target: &ComparisonResult,
        target: &dyn SceneGraph,
        settings: MergeSettings,
    ) -> MergeResult<Self> {
        settings.validate()?;

        if base_to_source.base_scene() != base_to_target.base_scene() {
            return Err(MergeError::BaseSceneMismatch {
                source_base: base_to_source.base_scene(),
                target_base: base_to_target.base_scene(),
            });
        }
        if target.scene_id() != base_to_target.source_scene() {
            return Err(MergeError::TargetSceneMismatch {
                expected: base_to_target.source_scene(),
                actual: target.scene_id(),
            });
        }

        let actions = Reconciliation::new(target).run(
            &base_to_source.differing_entities,
            &base_to_target.differing_entities,
        )?;

        let operation = Self {
            base_scene: base_to_source.base_scene(),
            source_scene: base_to_source.source_scene(),
            target_scene: base_to_target.source_scene(),
            settings,
            actions,
        };

        debug!(
            base = %operation.base_scene.short_id(),
            source = %operation.source_scene.short_id(),
            target = %operation.target_scene.short_id(),
            actions = operation.actions.len(),
            conflicts = operation.conflict_count(),
            "three-way merge computed"
        );

        Ok(operation)
    }

    /// The merge actions, in application order.
    pub fn actions(&self) -> &[MergeAction] {
        &self.actions
    }

    /// Take ownership of the action list.
    pub fn into_actions(self) -> Vec<MergeAction> {
        self.actions
    }

    /// Only the conflict actions.
    pub fn conflicts(&self) -> impl Iterator<Item = &MergeAction> {
        self.actions.iter().filter(|action| action.is_conflict())
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts().count()
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflicts().next().is_some()
    }

    pub fn base_scene(&self) -> SceneId {
        self.base_scene
    }

    pub fn source_scene(&self) -> SceneId {
        self.source_scene
    }

    pub fn target_scene(&self) -> SceneId {
        self.target_scene
    }

    pub fn settings(&self) -> &MergeSettings {
        &self.settings
    }

    /// Selection group merging is not implemented; enabling it fails.
    pub fn set_merge_selection_groups(&mut self, enabled: bool) -> MergeResult<()> {
        if enabled {
            return Err(MergeError::NotSupported("selection group merging"));
        }
        self.settings.merge_selection_groups = false;
        Ok(())
    }

    /// Layer merging is not implemented; enabling it fails.
    pub fn set_merge_layers(&mut self, enabled: bool) -> MergeResult<()> {
        if enabled {
            return Err(MergeError::NotSupported("layer merging"));
        }
        self.settings.merge_layers = false;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reconciliation pass
// ---------------------------------------------------------------------------

/// Target primitives of one entity, keyed by fingerprint.
///
/// Several primitives may share a fingerprint; each removal claims one.
struct PrimitivePool {
    by_fingerprint: HashMap<Fingerprint, Vec<NodeId>>,
}

impl PrimitivePool {
    fn collect(scene: &dyn SceneGraph, entity: NodeId) -> MergeResult<Self> {
        let mut by_fingerprint: HashMap<Fingerprint, Vec<NodeId>> = HashMap::new();
        for child in scene.primitives(entity)? {
            by_fingerprint
                .entry(scene.fingerprint(child)?)
                .or_default()
                .push(child);
        }
        Ok(Self { by_fingerprint })
    }

    fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.by_fingerprint
            .get(fingerprint)
            .is_some_and(|nodes| !nodes.is_empty())
    }

    fn take(&mut self, fingerprint: &Fingerprint) -> Option<NodeId> {
        let nodes = self.by_fingerprint.get_mut(fingerprint)?;
        if nodes.is_empty() {
            None
        } else {
            Some(nodes.remove(0))
        }
    }
}

fn index_differences<'d>(
    differences: &'d [EntityDifference],
    side: &'static str,
) -> MergeResult<HashMap<&'d str, &'d EntityDifference>> {
    let mut index = HashMap::with_capacity(differences.len());
    for diff in differences {
        if index.insert(diff.entity_name.as_str(), diff).is_some() {
            return Err(MergeError::DuplicateEntityDifference {
                entity: diff.entity_name.clone(),
                side,
            });
        }
    }
    Ok(index)
}

/// Whether two differing changes to the same key contradict each other.
///
/// Only a removal on both sides agrees; every other combination of
/// differing changes is a conflict.
fn key_value_diff_has_conflicts(source: &KeyValueDifference, target: &KeyValueDifference) -> bool {
    match target.kind {
        KeyValueDifferenceKind::KeyValueRemoved => source.kind != target.kind,
        KeyValueDifferenceKind::KeyValueAdded | KeyValueDifferenceKind::KeyValueChanged => {
            source.kind == KeyValueDifferenceKind::KeyValueRemoved || source.value != target.value
        }
    }
}

/// Construction-time state. Dropped as soon as the action list is built.
struct Reconciliation<'a> {
    target: &'a dyn SceneGraph,
    target_scene: SceneId,
    /// Live target entities by name.
    target_entities: HashMap<String, NodeId>,
    actions: Vec<MergeAction>,
}

impl<'a> Reconciliation<'a> {
    fn new(target: &'a dyn SceneGraph) -> Self {
        let target_entities = target
            .entities()
            .into_iter()
            .filter_map(|id| target.entity_name(id).map(|name| (name, id)))
            .collect();

        Self {
            target,
            target_scene: target.scene_id(),
            target_entities,
            actions: Vec::new(),
        }
    }

    fn run(
        mut self,
        source_diffs: &[EntityDifference],
        target_diffs: &[EntityDifference],
    ) -> MergeResult<Vec<MergeAction>> {
        // Built for duplicate detection; the pass follows list order.
        index_differences(source_diffs, "source")?;
        let target_index = index_differences(target_diffs, "target")?;

        for source_diff in source_diffs {
            match target_index.get(source_diff.entity_name.as_str()) {
                None => self.accept_source_change(source_diff)?,
                Some(target_diff) => self.reconcile(source_diff, target_diff)?,
            }
        }

        Ok(self.actions)
    }

    fn target_entity(&self, name: &str) -> MergeResult<NodeRef> {
        self.target_entities
            .get(name)
            .map(|&id| self.target.node_ref(id))
            .ok_or_else(|| MergeError::TargetEntityNotFound(name.to_string()))
    }

    fn target_node(&self, node: NodeRef) -> MergeResult<NodeId> {
        if !node.belongs_to(self.target_scene) {
            return Err(MergeError::ForeignNode {
                node,
                expected: self.target_scene,
            });
        }
        Ok(node.node)
    }

    /// The target did not touch this entity: take the source change as is.
    fn accept_source_change(&mut self, source_diff: &EntityDifference) -> MergeResult<()> {
        match source_diff.kind {
            EntityDifferenceKind::EntityMissingInSource => {
                let entity = self.target_entity(&source_diff.entity_name)?;
                self.actions.push(MergeAction::RemoveEntity { entity });
            }
            EntityDifferenceKind::EntityMissingInBase => {
                self.actions.push(MergeAction::AddEntity {
                    entity: source_diff.node,
                    target: self.target_scene,
                });
            }
            EntityDifferenceKind::EntityPresentButDifferent => {
                let entity = self.target_entity(&source_diff.entity_name)?;
                let mut pool = PrimitivePool::collect(self.target, entity.node)?;

                for primitive_diff in &source_diff.differing_children {
                    self.accept_primitive_change(primitive_diff, entity, &mut pool);
                }
                for key_value_diff in &source_diff.differing_key_values {
                    self.actions
                        .push(MergeAction::for_key_value_difference(key_value_diff, entity));
                }
            }
        }
        Ok(())
    }

    fn accept_primitive_change(
        &mut self,
        primitive_diff: &PrimitiveDifference,
        entity: NodeRef,
        pool: &mut PrimitivePool,
    ) {
        match primitive_diff.kind {
            PrimitiveDifferenceKind::PrimitiveAdded => {
                self.actions.push(MergeAction::AddChild {
                    child: primitive_diff.node,
                    parent: entity,
                });
            }
            PrimitiveDifferenceKind::PrimitiveRemoved => match pool.take(&primitive_diff.fingerprint) {
                Some(child) => self.actions.push(MergeAction::RemoveChild {
                    child: self.target.node_ref(child),
                }),
                None => warn!(
                    entity = %entity,
                    primitive = %primitive_diff.fingerprint.short_hex(),
                    "removed primitive is already missing in the target"
                ),
            },
        }
    }

    /// Both sides changed the entity: classify the pair of difference kinds.
    fn reconcile(
        &mut self,
        source_diff: &EntityDifference,
        target_diff: &EntityDifference,
    ) -> MergeResult<()> {
        use EntityDifferenceKind::*;

        let inconsistent = || MergeError::InconsistentDifferences {
            entity: source_diff.entity_name.clone(),
            source_kind: source_diff.kind,
            target_kind: target_diff.kind,
        };

        match (source_diff.kind, target_diff.kind) {
            // The target cannot remove or modify what the source says was not in the base.
            (EntityMissingInBase, EntityMissingInSource | EntityPresentButDifferent) => {
                Err(inconsistent())
            }
            (EntityMissingInBase, EntityMissingInBase) => {
                // Identical additions converge. Different content under the
                // same name is imported as well, leaving two entities of
                // that name for the caller to sort out.
                if source_diff.fingerprint != target_diff.fingerprint {
                    self.actions.push(MergeAction::AddEntity {
                        entity: source_diff.node,
                        target: self.target_scene,
                    });
                }
                Ok(())
            }
            // The target cannot add what the source says was in the base.
            (EntityMissingInSource, EntityMissingInBase) => Err(inconsistent()),
            (EntityMissingInSource, EntityMissingInSource) => Ok(()),
            (EntityMissingInSource, EntityPresentButDifferent) => {
                debug!(entity = %source_diff.entity_name, "removed in source, modified in target");
                self.actions
                    .push(MergeAction::EntityConflict(EntityConflictResolution::new(
                        target_diff.node,
                        MergeAction::RemoveEntity {
                            entity: target_diff.node,
                        },
                    )));
                Ok(())
            }
            (EntityPresentButDifferent, EntityMissingInBase) => Err(inconsistent()),
            (EntityPresentButDifferent, EntityMissingInSource) => {
                // Accepting the source change re-adds the entity. The target
                // difference refers to the base entity here, since the
                // target no longer has one.
                debug!(entity = %source_diff.entity_name, "modified in source, removed in target");
                self.actions
                    .push(MergeAction::EntityConflict(EntityConflictResolution::new(
                        target_diff.node,
                        MergeAction::AddEntity {
                            entity: source_diff.node,
                            target: self.target_scene,
                        },
                    )));
                Ok(())
            }
            (EntityPresentButDifferent, EntityPresentButDifferent) => {
                self.reconcile_modification(source_diff, target_diff)
            }
        }
    }

    /// Both sides modified the entity: reconcile primitives and key/values.
    fn reconcile_modification(
        &mut self,
        source_diff: &EntityDifference,
        target_diff: &EntityDifference,
    ) -> MergeResult<()> {
        let entity = target_diff.node;
        let mut pool = PrimitivePool::collect(self.target, self.target_node(entity)?)?;

        // Primitives have no identity beyond their content; a change the
        // target already has (or already undid) is a no-op.
        for primitive_diff in &source_diff.differing_children {
            match primitive_diff.kind {
                PrimitiveDifferenceKind::PrimitiveAdded => {
                    if !pool.contains(&primitive_diff.fingerprint) {
                        self.actions.push(MergeAction::AddChild {
                            child: primitive_diff.node,
                            parent: entity,
                        });
                    }
                }
                PrimitiveDifferenceKind::PrimitiveRemoved => {
                    if let Some(child) = pool.take(&primitive_diff.fingerprint) {
                        self.actions.push(MergeAction::RemoveChild {
                            child: self.target.node_ref(child),
                        });
                    }
                }
            }
        }

        for source_kv in &source_diff.differing_key_values {
            let target_kv = target_diff
                .differing_key_values
                .iter()
                .find(|candidate| candidate.same_key(source_kv));

            match target_kv {
                None => self
                    .actions
                    .push(MergeAction::for_key_value_difference(source_kv, entity)),
                Some(target_kv) if target_kv == source_kv => {}
                Some(target_kv) if !key_value_diff_has_conflicts(source_kv, target_kv) => self
                    .actions
                    .push(MergeAction::for_key_value_difference(source_kv, entity)),
                Some(target_kv) => {
                    debug!(
                        entity = %source_diff.entity_name,
                        key = %source_kv.key,
                        "conflicting key value change"
                    );
                    self.actions
                        .push(MergeAction::KeyValueConflict(KeyValueConflictResolution::new(
                            entity,
                            MergeAction::for_key_value_difference(source_kv, entity),
                            MergeAction::for_key_value_difference(target_kv, entity),
                        )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionType, ResolutionType};
    use mapmerge_diff::compare_scenes;
    use mapmerge_scene::{EntitySnapshot, InMemoryScene, Primitive, SceneGraphMut};

    fn brush(x: f64) -> Primitive {
        Primitive::cuboid([x, 0.0, 0.0], [x + 16.0, 16.0, 16.0], "textures/common/caulk")
    }

    /// Base scene with a world entity (two brushes) and `light_1`.
    fn base_scene() -> InMemoryScene {
        let mut scene = InMemoryScene::new();
        scene
            .insert_entity(
                EntitySnapshot::new()
                    .with_key_value("classname", "worldspawn")
                    .with_primitive(brush(0.0))
                    .with_primitive(brush(32.0)),
            )
            .unwrap();
        scene
            .insert_entity(
                EntitySnapshot::named("light", "light_1").with_key_value("brightness", "5"),
            )
            .unwrap();
        scene
            .insert_entity(EntitySnapshot::named("func_static", "door_1").with_primitive(brush(64.0)))
            .unwrap();
        scene
    }

    struct Fixture {
        base: InMemoryScene,
        source: InMemoryScene,
        target: InMemoryScene,
    }

    impl Fixture {
        fn new() -> Self {
            let base = base_scene();
            let source = base.clone_as_new();
            let target = base.clone_as_new();
            Self {
                base,
                source,
                target,
            }
        }

        fn merge(&self) -> MergeResult<ThreeWayMergeOperation> {
            let base_to_source = compare_scenes(&self.base, &self.source).unwrap();
            let base_to_target = compare_scenes(&self.base, &self.target).unwrap();
            ThreeWayMergeOperation::create_from_comparison_results(
                &base_to_source,
                &base_to_target,
                &self.target,
            )
        }

        fn entity(scene: &InMemoryScene, name: &str) -> NodeId {
            scene.find_entity(name).unwrap()
        }
    }

    // -- preconditions ------------------------------------------------------

    #[test]
    fn different_bases_are_rejected() {
        let fixture = Fixture::new();
        let other_base = base_scene();
        let base_to_source = compare_scenes(&fixture.base, &fixture.source).unwrap();
        let base_to_target = compare_scenes(&other_base, &fixture.target).unwrap();

        let result = ThreeWayMergeOperation::create_from_comparison_results(
            &base_to_source,
            &base_to_target,
            &fixture.target,
        );
        assert!(matches!(result, Err(MergeError::BaseSceneMismatch { .. })));
    }

    #[test]
    fn wrong_target_scene_is_rejected() {
        let fixture = Fixture::new();
        let base_to_source = compare_scenes(&fixture.base, &fixture.source).unwrap();
        let base_to_target = compare_scenes(&fixture.base, &fixture.target).unwrap();

        let result = ThreeWayMergeOperation::create_from_comparison_results(
            &base_to_source,
            &base_to_target,
            &fixture.source,
        );
        assert!(matches!(result, Err(MergeError::TargetSceneMismatch { .. })));
    }

    #[test]
    fn unsupported_settings_are_rejected() {
        let fixture = Fixture::new();
        let base_to_source = compare_scenes(&fixture.base, &fixture.source).unwrap();
        let base_to_target = compare_scenes(&fixture.base, &fixture.target).unwrap();

        let result = ThreeWayMergeOperation::create_with_settings(
            &base_to_source,
            &base_to_target,
            &fixture.target,
            MergeSettings {
                merge_layers: true,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(MergeError::NotSupported(_))));
    }

    #[test]
    fn toggles_refuse_to_enable() {
        let mut operation = Fixture::new().merge().unwrap();
        assert!(operation.set_merge_selection_groups(false).is_ok());
        assert!(operation.set_merge_layers(false).is_ok());
        assert!(matches!(
            operation.set_merge_selection_groups(true),
            Err(MergeError::NotSupported(_))
        ));
        assert!(matches!(
            operation.set_merge_layers(true),
            Err(MergeError::NotSupported(_))
        ));
        assert_eq!(operation.settings(), &MergeSettings::default());
    }

    #[test]
    fn no_changes_no_actions() {
        let fixture = Fixture::new();
        let operation = fixture.merge().unwrap();
        assert!(operation.actions().is_empty());
        assert!(!operation.has_conflicts());
        assert_eq!(operation.base_scene(), fixture.base.scene_id());
        assert_eq!(operation.source_scene(), fixture.source.scene_id());
        assert_eq!(operation.target_scene(), fixture.target.scene_id());
    }

    // -- source-only changes ------------------------------------------------

    #[test]
    fn source_only_key_value_change_is_accepted() {
        let mut fixture = Fixture::new();
        let light = Fixture::entity(&fixture.source, "light_1");
        fixture.source.set_key_value(light, "brightness", "7").unwrap();

        let operation = fixture.merge().unwrap();
        let target_light = fixture.target.node_ref(Fixture::entity(&fixture.target, "light_1"));
        assert_eq!(
            operation.actions(),
            &[MergeAction::SetKeyValue {
                entity: target_light,
                key: "brightness".into(),
                value: "7".into(),
            }]
        );
    }

    #[test]
    fn source_only_entity_removal_targets_live_entity() {
        let mut fixture = Fixture::new();
        let door = Fixture::entity(&fixture.source, "door_1");
        fixture.source.remove_entity(door).unwrap();

        let operation = fixture.merge().unwrap();
        let target_door = fixture.target.node_ref(Fixture::entity(&fixture.target, "door_1"));
        assert_eq!(
            operation.actions(),
            &[MergeAction::RemoveEntity {
                entity: target_door
            }]
        );
    }

    #[test]
    fn source_only_entity_addition() {
        let mut fixture = Fixture::new();
        let torch = fixture
            .source
            .insert_entity(EntitySnapshot::named("light_torch", "torch_2"))
            .unwrap();

        let operation = fixture.merge().unwrap();
        assert_eq!(
            operation.actions(),
            &[MergeAction::AddEntity {
                entity: fixture.source.node_ref(torch),
                target: fixture.target.scene_id(),
            }]
        );
    }

    #[test]
    fn source_only_modification_orders_primitives_before_key_values() {
        let mut fixture = Fixture::new();
        let world = Fixture::entity(&fixture.source, "worldspawn");
        fixture.source.set_key_value(world, "music", "ambient").unwrap();
        let removed = fixture.source.primitives(world).unwrap()[1];
        fixture.source.remove_child(removed).unwrap();
        let added = fixture.source.add_child(world, brush(128.0)).unwrap();

        let operation = fixture.merge().unwrap();
        let target_world = Fixture::entity(&fixture.target, "worldspawn");
        let target_removed = fixture.target.primitives(target_world).unwrap()[1];

        let types: Vec<ActionType> = operation.actions().iter().map(|a| a.action_type()).collect();
        assert_eq!(
            types,
            vec![ActionType::AddChild, ActionType::RemoveChild, ActionType::SetKeyValue]
        );
        assert_eq!(
            operation.actions()[0],
            MergeAction::AddChild {
                child: fixture.source.node_ref(added),
                parent: fixture.target.node_ref(target_world),
            }
        );
        assert_eq!(
            operation.actions()[1],
            MergeAction::RemoveChild {
                child: fixture.target.node_ref(target_removed)
            }
        );
        assert!(!operation.has_conflicts());
    }

    #[test]
    fn source_modification_of_entity_missing_in_target_fails() {
        let fixture = Fixture::new();
        let base_to_target = compare_scenes(&fixture.base, &fixture.target).unwrap();
        let base_to_source = ComparisonResult::new(fixture.base.scene_id(), fixture.source.scene_id())
            .with_entities(vec![EntityDifference::modified(
                "ghost",
                fixture.source.node_ref(NodeId::new(0)),
                Fingerprint::null(),
            )]);

        let result = ThreeWayMergeOperation::create_from_comparison_results(
            &base_to_source,
            &base_to_target,
            &fixture.target,
        );
        assert!(matches!(result, Err(MergeError::TargetEntityNotFound(name)) if name == "ghost"));
    }

    #[test]
    fn removal_of_primitive_already_gone_from_target_is_skipped() {
        let fixture = Fixture::new();
        let base_to_target = compare_scenes(&fixture.base, &fixture.target).unwrap();
        let light = Fixture::entity(&fixture.source, "light_1");
        let base_to_source = ComparisonResult::new(fixture.base.scene_id(), fixture.source.scene_id())
            .with_entities(vec![EntityDifference::modified(
                "light_1",
                fixture.source.node_ref(light),
                Fingerprint::null(),
            )
            .with_children(vec![PrimitiveDifference::removed(
                brush(512.0).fingerprint(),
                fixture.base.node_ref(light),
            )])]);

        let operation = ThreeWayMergeOperation::create_from_comparison_results(
            &base_to_source,
            &base_to_target,
            &fixture.target,
        )
        .unwrap();
        assert!(operation.actions().is_empty());
    }

    #[test]
    fn duplicate_primitives_are_claimed_one_per_removal() {
        let mut base = base_scene();
        let door = Fixture::entity(&base, "door_1");
        base.add_child(door, brush(64.0)).unwrap();
        let source = base.clone_as_new();
        let target = base.clone_as_new();

        let target_door = Fixture::entity(&target, "door_1");
        let target_copies = target.primitives(target_door).unwrap();
        assert_eq!(target_copies.len(), 2);

        let base_to_target = compare_scenes(&base, &target).unwrap();
        let base_to_source = ComparisonResult::new(base.scene_id(), source.scene_id())
            .with_entities(vec![EntityDifference::modified(
                "door_1",
                source.node_ref(door),
                Fingerprint::null(),
            )
            .with_children(vec![PrimitiveDifference::removed(
                brush(64.0).fingerprint(),
                base.node_ref(target_copies[0]),
            )])]);

        let operation =
            ThreeWayMergeOperation::create_from_comparison_results(&base_to_source, &base_to_target, &target)
                .unwrap();
        assert_eq!(
            operation.actions(),
            &[MergeAction::RemoveChild {
                child: target.node_ref(target_copies[0])
            }]
        );
    }

    // -- entity-level classification ----------------------------------------

    #[test]
    fn both_removed_is_a_no_op() {
        let mut fixture = Fixture::new();
        let door = Fixture::entity(&fixture.base, "door_1");
        fixture.source.remove_entity(door).unwrap();
        fixture.target.remove_entity(door).unwrap();

        assert!(fixture.merge().unwrap().actions().is_empty());
    }

    #[test]
    fn identical_additions_are_a_no_op() {
        let mut fixture = Fixture::new();
        let torch = EntitySnapshot::named("light_torch", "torch_2").with_primitive(brush(256.0));
        fixture.source.insert_entity(torch.clone()).unwrap();
        fixture.target.insert_entity(torch).unwrap();

        assert!(fixture.merge().unwrap().actions().is_empty());
    }

    #[test]
    fn different_additions_with_same_name_add_source_version() {
        let mut fixture = Fixture::new();
        let source_torch = fixture
            .source
            .insert_entity(
                EntitySnapshot::named("light_torch", "torch_2").with_primitive(brush(256.0)),
            )
            .unwrap();
        fixture
            .target
            .insert_entity(
                EntitySnapshot::named("light_torch", "torch_2").with_primitive(brush(512.0)),
            )
            .unwrap();

        let operation = fixture.merge().unwrap();
        assert_eq!(
            operation.actions(),
            &[MergeAction::AddEntity {
                entity: fixture.source.node_ref(source_torch),
                target: fixture.target.scene_id(),
            }]
        );
        assert!(!operation.has_conflicts());
    }

    #[test]
    fn removed_in_source_modified_in_target_conflicts() {
        let mut fixture = Fixture::new();
        let light = Fixture::entity(&fixture.base, "light_1");
        fixture.source.remove_entity(light).unwrap();
        fixture.target.set_key_value(light, "brightness", "9").unwrap();

        let operation = fixture.merge().unwrap();
        let target_light = fixture.target.node_ref(light);
        assert_eq!(operation.conflict_count(), 1);
        match &operation.actions()[0] {
            MergeAction::EntityConflict(conflict) => {
                assert_eq!(conflict.conflicting_entity(), target_light);
                assert_eq!(
                    conflict.source_action(),
                    &MergeAction::RemoveEntity {
                        entity: target_light
                    }
                );
                assert_eq!(conflict.resolution(), ResolutionType::Unresolved);
            }
            other => panic!("expected entity conflict, got {other:?}"),
        }
    }

    #[test]
    fn modified_in_source_removed_in_target_conflicts() {
        let mut fixture = Fixture::new();
        let light = Fixture::entity(&fixture.base, "light_1");
        fixture.source.set_key_value(light, "brightness", "7").unwrap();
        fixture.target.remove_entity(light).unwrap();

        let operation = fixture.merge().unwrap();
        assert_eq!(operation.actions().len(), 1);
        match &operation.actions()[0] {
            MergeAction::EntityConflict(conflict) => {
                assert_eq!(conflict.conflicting_entity(), fixture.base.node_ref(light));
                assert_eq!(
                    conflict.source_action(),
                    &MergeAction::AddEntity {
                        entity: fixture.source.node_ref(light),
                        target: fixture.target.scene_id(),
                    }
                );
            }
            other => panic!("expected entity conflict, got {other:?}"),
        }
    }

    fn hand_made_merge(
        fixture: &Fixture,
        source: EntityDifference,
        target: EntityDifference,
    ) -> MergeResult<ThreeWayMergeOperation> {
        let base_to_source = ComparisonResult::new(fixture.base.scene_id(), fixture.source.scene_id())
            .with_entities(vec![source]);
        let base_to_target = ComparisonResult::new(fixture.base.scene_id(), fixture.target.scene_id())
            .with_entities(vec![target]);
        ThreeWayMergeOperation::create_from_comparison_results(
            &base_to_source,
            &base_to_target,
            &fixture.target,
        )
    }

    #[test]
    fn impossible_combinations_abort() {
        use EntityDifferenceKind::*;

        let fixture = Fixture::new();
        let source_node = fixture.source.node_ref(NodeId::new(0));
        let target_node = fixture.target.node_ref(NodeId::new(0));
        let make = |kind: EntityDifferenceKind, node: NodeRef| match kind {
            EntityMissingInBase => EntityDifference::added("x", node, Fingerprint::null()),
            EntityMissingInSource => EntityDifference::removed("x", node, Fingerprint::null()),
            EntityPresentButDifferent => EntityDifference::modified("x", node, Fingerprint::null()),
        };

        for (source_kind, target_kind) in [
            (EntityMissingInBase, EntityMissingInSource),
            (EntityMissingInBase, EntityPresentButDifferent),
            (EntityMissingInSource, EntityMissingInBase),
            (EntityPresentButDifferent, EntityMissingInBase),
        ] {
            let result = hand_made_merge(
                &fixture,
                make(source_kind, source_node),
                make(target_kind, target_node),
            );
            match result {
                Err(MergeError::InconsistentDifferences {
                    entity,
                    source_kind: s,
                    target_kind: t,
                }) => {
                    assert_eq!(entity, "x");
                    assert_eq!(s, source_kind);
                    assert_eq!(t, target_kind);
                }
                other => panic!("expected inconsistency for {source_kind}/{target_kind}, got {other:?}"),
            }
        }
    }

    #[test]
    fn inconsistency_message_names_entity() {
        let fixture = Fixture::new();
        let err = hand_made_merge(
            &fixture,
            EntityDifference::modified("light_1", fixture.source.node_ref(NodeId::new(1)), Fingerprint::null()),
            EntityDifference::added("light_1", fixture.target.node_ref(NodeId::new(1)), Fingerprint::null()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "entity light_1 is marked as modified in source, but as added in target"
        );
    }

    #[test]
    fn duplicate_differences_are_rejected() {
        let fixture = Fixture::new();
        let node = fixture.source.node_ref(NodeId::new(0));
        let base_to_source = ComparisonResult::new(fixture.base.scene_id(), fixture.source.scene_id())
            .with_entities(vec![
                EntityDifference::added("dup", node, Fingerprint::null()),
                EntityDifference::added("dup", node, Fingerprint::null()),
            ]);
        let base_to_target = ComparisonResult::new(fixture.base.scene_id(), fixture.target.scene_id());

        let result = ThreeWayMergeOperation::create_from_comparison_results(
            &base_to_source,
            &base_to_target,
            &fixture.target,
        );
        assert!(matches!(
            result,
            Err(MergeError::DuplicateEntityDifference { side: "source", .. })
        ));
    }

    // -- per-field reconciliation -------------------------------------------

    #[test]
    fn same_key_different_values_conflict() {
        let mut fixture = Fixture::new();
        let light = Fixture::entity(&fixture.base, "light_1");
        fixture.source.set_key_value(light, "brightness", "7").unwrap();
        fixture.target.set_key_value(light, "brightness", "9").unwrap();

        let operation = fixture.merge().unwrap();
        assert_eq!(operation.actions().len(), 1);
        let target_light = fixture.target.node_ref(light);
        match &operation.actions()[0] {
            MergeAction::KeyValueConflict(conflict) => {
                assert_eq!(conflict.conflicting_entity(), target_light);
                assert_eq!(
                    conflict.source_action(),
                    &MergeAction::SetKeyValue {
                        entity: target_light,
                        key: "brightness".into(),
                        value: "7".into(),
                    }
                );
                assert_eq!(
                    conflict.target_action(),
                    &MergeAction::SetKeyValue {
                        entity: target_light,
                        key: "brightness".into(),
                        value: "9".into(),
                    }
                );
            }
            other => panic!("expected key value conflict, got {other:?}"),
        }
    }

    #[test]
    fn same_key_same_value_is_a_no_op() {
        let mut fixture = Fixture::new();
        let light = Fixture::entity(&fixture.base, "light_1");
        fixture.source.set_key_value(light, "brightness", "7").unwrap();
        fixture.target.set_key_value(light, "brightness", "7").unwrap();
        fixture.target.set_key_value(light, "color", "1 0 0").unwrap();

        assert!(fixture.merge().unwrap().actions().is_empty());
    }

    #[test]
    fn both_removing_a_key_is_a_no_op() {
        let mut fixture = Fixture::new();
        let light = Fixture::entity(&fixture.base, "light_1");
        fixture.source.remove_key_value(light, "brightness").unwrap();
        fixture.target.remove_key_value(light, "brightness").unwrap();

        assert!(fixture.merge().unwrap().actions().is_empty());
    }

    #[test]
    fn remove_versus_set_conflicts_both_ways() {
        let mut fixture = Fixture::new();
        let light = Fixture::entity(&fixture.base, "light_1");
        fixture.source.remove_key_value(light, "brightness").unwrap();
        fixture.target.set_key_value(light, "brightness", "9").unwrap();
        assert_eq!(fixture.merge().unwrap().conflict_count(), 1);

        let mut fixture = Fixture::new();
        fixture.source.set_key_value(light, "brightness", "9").unwrap();
        fixture.target.remove_key_value(light, "brightness").unwrap();
        assert_eq!(fixture.merge().unwrap().conflict_count(), 1);
    }

    #[test]
    fn unrelated_keys_on_both_sides_merge() {
        let mut fixture = Fixture::new();
        let light = Fixture::entity(&fixture.base, "light_1");
        fixture.source.set_key_value(light, "brightness", "7").unwrap();
        fixture.target.set_key_value(light, "color", "1 0 0").unwrap();

        let operation = fixture.merge().unwrap();
        assert_eq!(
            operation.actions(),
            &[MergeAction::SetKeyValue {
                entity: fixture.target.node_ref(light),
                key: "brightness".into(),
                value: "7".into(),
            }]
        );
    }

    #[test]
    fn key_pairing_ignores_case() {
        let fixture = Fixture::new();
        let light = NodeId::new(3);
        let source = EntityDifference::modified("light_1", fixture.source.node_ref(light), Fingerprint::null())
            .with_key_values(vec![KeyValueDifference::changed("Brightness", "7")]);
        let target = EntityDifference::modified("light_1", fixture.target.node_ref(light), Fingerprint::null())
            .with_key_values(vec![KeyValueDifference::changed("brightness", "9")]);

        let operation = hand_made_merge(&fixture, source, target).unwrap();
        assert_eq!(operation.conflict_count(), 1);
    }

    #[test]
    fn added_and_changed_to_same_value_is_accepted() {
        let fixture = Fixture::new();
        let light = NodeId::new(3);
        let source = EntityDifference::modified("light_1", fixture.source.node_ref(light), Fingerprint::null())
            .with_key_values(vec![KeyValueDifference::added("brightness", "7")]);
        let target = EntityDifference::modified("light_1", fixture.target.node_ref(light), Fingerprint::null())
            .with_key_values(vec![KeyValueDifference::changed("brightness", "7")]);

        let operation = hand_made_merge(&fixture, source, target).unwrap();
        assert_eq!(operation.actions().len(), 1);
        assert_eq!(operation.actions()[0].action_type(), ActionType::SetKeyValue);
    }

    #[test]
    fn primitive_added_on_both_sides_is_not_duplicated() {
        let mut fixture = Fixture::new();
        let world = Fixture::entity(&fixture.base, "worldspawn");
        fixture.source.add_child(world, brush(128.0)).unwrap();
        fixture.target.add_child(world, brush(128.0)).unwrap();
        fixture.target.set_key_value(world, "music", "ambient").unwrap();

        assert!(fixture.merge().unwrap().actions().is_empty());
    }

    #[test]
    fn primitive_removed_on_both_sides_is_a_no_op() {
        let mut fixture = Fixture::new();
        let world = Fixture::entity(&fixture.base, "worldspawn");
        let child = fixture.base.primitives(world).unwrap()[0];
        fixture.source.remove_child(child).unwrap();
        fixture.target.remove_child(child).unwrap();
        fixture.target.add_child(world, brush(200.0)).unwrap();

        assert!(fixture.merge().unwrap().actions().is_empty());
    }

    #[test]
    fn doubly_modified_entity_merges_primitives() {
        let mut fixture = Fixture::new();
        let world = Fixture::entity(&fixture.base, "worldspawn");
        let first = fixture.base.primitives(world).unwrap()[0];

        let source_added = fixture.source.add_child(world, brush(128.0)).unwrap();
        fixture.source.remove_child(first).unwrap();
        fixture.target.add_child(world, brush(300.0)).unwrap();

        let operation = fixture.merge().unwrap();
        assert_eq!(
            operation.actions(),
            &[
                MergeAction::AddChild {
                    child: fixture.source.node_ref(source_added),
                    parent: fixture.target.node_ref(world),
                },
                MergeAction::RemoveChild {
                    child: fixture.target.node_ref(first),
                },
            ]
        );
    }

    #[test]
    fn actions_follow_source_difference_order() {
        let mut fixture = Fixture::new();
        let door = Fixture::entity(&fixture.base, "door_1");
        let light = Fixture::entity(&fixture.base, "light_1");
        fixture.source.remove_entity(door).unwrap();
        fixture.source.set_key_value(light, "brightness", "7").unwrap();
        let torch = fixture
            .source
            .insert_entity(EntitySnapshot::named("light_torch", "torch_2"))
            .unwrap();

        let operation = fixture.merge().unwrap();
        // compare_scenes reports light_1, torch_2 (source order) then door_1.
        assert_eq!(
            operation.actions(),
            &[
                MergeAction::SetKeyValue {
                    entity: fixture.target.node_ref(light),
                    key: "brightness".into(),
                    value: "7".into(),
                },
                MergeAction::AddEntity {
                    entity: fixture.source.node_ref(torch),
                    target: fixture.target.scene_id(),
                },
                MergeAction::RemoveEntity {
                    entity: fixture.target.node_ref(door),
                },
            ]
        );
    }

    #[test]
    fn into_actions_transfers_the_list() {
        let mut fixture = Fixture::new();
        let light = Fixture::entity(&fixture.base, "light_1");
        fixture.source.set_key_value(light, "brightness", "7").unwrap();
        fixture.target.set_key_value(light, "brightness", "9").unwrap();

        let operation = fixture.merge().unwrap();
        let conflicts: Vec<MergeAction> = operation.conflicts().cloned().collect();
        let actions = operation.into_actions();
        assert_eq!(actions, conflicts);
    }
}
