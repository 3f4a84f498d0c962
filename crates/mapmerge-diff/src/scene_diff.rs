//! Scene-level diff: compare a scene against a base and describe every
//! changed entity.
//!
//! Entities are matched by name. Entities with equal fingerprints are
//! unchanged. For modified entities, primitives are compared as fingerprint
//! multisets (they have no identity of their own) and key/values are
//! compared with [`diff_key_values`].

use std::collections::HashMap;

use tracing::debug;

use mapmerge_scene::SceneGraph;
use mapmerge_types::{Fingerprint, NodeId};

use crate::comparison::{ComparisonResult, EntityDifference, PrimitiveDifference};
use crate::error::{DiffError, DiffResult};
use crate::key_values::diff_key_values;

/// Named entities of a scene, in scene order, plus a name index.
struct EntityIndex {
    ordered: Vec<(String, NodeId)>,
    by_name: HashMap<String, NodeId>,
}

impl EntityIndex {
    fn build(scene: &dyn SceneGraph) -> DiffResult<Self> {
        let mut ordered = Vec::new();
        let mut by_name = HashMap::new();

        for id in scene.entities() {
            // Unnamed entities cannot be matched across scenes.
            let Some(name) = scene.entity_name(id) else {
                continue;
            };
            if by_name.insert(name.clone(), id).is_some() {
                return Err(DiffError::DuplicateEntityName {
                    scene: scene.scene_id(),
                    name,
                });
            }
            ordered.push((name, id));
        }

        Ok(Self { ordered, by_name })
    }
}

/// Compare `compared` against `base`.
///
/// Added and modified entities are reported in `compared` order, followed by
/// removed entities in `base` order.
pub fn compare_scenes(
    base: &dyn SceneGraph,
    compared: &dyn SceneGraph,
) -> DiffResult<ComparisonResult> {
    let base_index = EntityIndex::build(base)?;
    let compared_index = EntityIndex::build(compared)?;

    let mut differences = Vec::new();

    for (name, id) in &compared_index.ordered {
        let fingerprint = compared.fingerprint(*id)?;

        match base_index.by_name.get(name) {
            None => {
                differences.push(EntityDifference::added(
                    name.clone(),
                    compared.node_ref(*id),
                    fingerprint,
                ));
            }
            Some(&base_id) => {
                if base.fingerprint(base_id)? == fingerprint {
                    continue;
                }
                differences.push(
                    EntityDifference::modified(name.clone(), compared.node_ref(*id), fingerprint)
                        .with_children(diff_primitives(base, base_id, compared, *id)?)
                        .with_key_values(diff_key_values(
                            &base.key_values(base_id)?,
                            &compared.key_values(*id)?,
                        )),
                );
            }
        }
    }

    for (name, base_id) in &base_index.ordered {
        if !compared_index.by_name.contains_key(name) {
            differences.push(EntityDifference::removed(
                name.clone(),
                base.node_ref(*base_id),
                base.fingerprint(*base_id)?,
            ));
        }
    }

    debug!(
        base = %base.scene_id().short_id(),
        compared = %compared.scene_id().short_id(),
        differences = differences.len(),
        "compared scenes"
    );

    Ok(ComparisonResult::new(base.scene_id(), compared.scene_id()).with_entities(differences))
}

fn primitive_fingerprints(
    scene: &dyn SceneGraph,
    entity: NodeId,
) -> DiffResult<Vec<(Fingerprint, NodeId)>> {
    scene
        .primitives(entity)?
        .into_iter()
        .map(|id| Ok((scene.fingerprint(id)?, id)))
        .collect()
}

/// Multiset difference of the primitive fingerprints of two entity versions.
fn diff_primitives(
    base: &dyn SceneGraph,
    base_entity: NodeId,
    compared: &dyn SceneGraph,
    compared_entity: NodeId,
) -> DiffResult<Vec<PrimitiveDifference>> {
    let base_children = primitive_fingerprints(base, base_entity)?;
    let compared_children = primitive_fingerprints(compared, compared_entity)?;

    let mut changes = Vec::new();

    let mut base_pool: HashMap<Fingerprint, usize> = HashMap::new();
    for (fingerprint, _) in &base_children {
        *base_pool.entry(*fingerprint).or_default() += 1;
    }
    for (fingerprint, id) in &compared_children {
        match base_pool.get_mut(fingerprint) {
            Some(count) if *count > 0 => *count -= 1,
            _ => changes.push(PrimitiveDifference::added(
                *fingerprint,
                compared.node_ref(*id),
            )),
        }
    }

    let mut compared_pool: HashMap<Fingerprint, usize> = HashMap::new();
    for (fingerprint, _) in &compared_children {
        *compared_pool.entry(*fingerprint).or_default() += 1;
    }
    for (fingerprint, id) in &base_children {
        match compared_pool.get_mut(fingerprint) {
            Some(count) if *count > 0 => *count -= 1,
            _ => changes.push(PrimitiveDifference::removed(*fingerprint, base.node_ref(*id))),
        }
    }

    Ok(changes)
}
