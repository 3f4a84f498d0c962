//! The comparison result model.
//!
//! Differences are always described from the point of view of the compared
//! ("source") scene relative to the base scene. Node handles are non-owning;
//! both scenes must outlive the result and anything derived from it.

use serde::{Deserialize, Serialize};

use mapmerge_types::{Fingerprint, NodeRef, SceneId};

// ---------------------------------------------------------------------------
// KeyValueDifference
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyValueDifferenceKind {
    /// The key is missing in the base.
    KeyValueAdded,
    /// The key exists in both scenes with different values.
    KeyValueChanged,
    /// The key is missing in the compared scene.
    KeyValueRemoved,
}

impl std::fmt::Display for KeyValueDifferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyValueAdded => write!(f, "added"),
            Self::KeyValueChanged => write!(f, "changed"),
            Self::KeyValueRemoved => write!(f, "removed"),
        }
    }
}

/// One changed key of a modified entity.
///
/// Equality compares the key exactly. Callers that pair differences by key
/// do so case-insensitively.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueDifference {
    pub key: String,
    /// The new value. Empty for removals.
    pub value: String,
    pub kind: KeyValueDifferenceKind,
}

impl KeyValueDifference {
    pub fn added(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind: KeyValueDifferenceKind::KeyValueAdded,
        }
    }

    pub fn changed(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind: KeyValueDifferenceKind::KeyValueChanged,
        }
    }

    pub fn removed(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: String::new(),
            kind: KeyValueDifferenceKind::KeyValueRemoved,
        }
    }

    /// Returns `true` if both differences target the same key (ignoring case).
    pub fn same_key(&self, other: &KeyValueDifference) -> bool {
        self.key.eq_ignore_ascii_case(&other.key)
    }
}

// ---------------------------------------------------------------------------
// PrimitiveDifference
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveDifferenceKind {
    PrimitiveAdded,
    PrimitiveRemoved,
}

/// One primitive added to or removed from a modified entity.
///
/// For additions `node` lives in the compared scene; for removals it is the
/// primitive in the base scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveDifference {
    pub kind: PrimitiveDifferenceKind,
    pub fingerprint: Fingerprint,
    pub node: NodeRef,
}

impl PrimitiveDifference {
    pub fn added(fingerprint: Fingerprint, node: NodeRef) -> Self {
        Self {
            kind: PrimitiveDifferenceKind::PrimitiveAdded,
            fingerprint,
            node,
        }
    }

    pub fn removed(fingerprint: Fingerprint, node: NodeRef) -> Self {
        Self {
            kind: PrimitiveDifferenceKind::PrimitiveRemoved,
            fingerprint,
            node,
        }
    }
}

// ---------------------------------------------------------------------------
// EntityDifference
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityDifferenceKind {
    /// The entity was added (it is missing in the base).
    EntityMissingInBase,
    /// The entity was removed (it is missing in the compared scene).
    EntityMissingInSource,
    /// The entity exists in both scenes with different content.
    EntityPresentButDifferent,
}

impl std::fmt::Display for EntityDifferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntityMissingInBase => write!(f, "added"),
            Self::EntityMissingInSource => write!(f, "removed"),
            Self::EntityPresentButDifferent => write!(f, "modified"),
        }
    }
}

/// One changed entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDifference {
    pub entity_name: String,
    pub kind: EntityDifferenceKind,
    /// The entity in the compared scene; the base entity for removals.
    pub node: NodeRef,
    /// Fingerprint of `node`.
    pub fingerprint: Fingerprint,
    /// Primitive changes, only populated for modified entities.
    pub differing_children: Vec<PrimitiveDifference>,
    /// Key/value changes, only populated for modified entities.
    pub differing_key_values: Vec<KeyValueDifference>,
}

impl EntityDifference {
    pub fn added(name: impl Into<String>, node: NodeRef, fingerprint: Fingerprint) -> Self {
        Self::new(name, EntityDifferenceKind::EntityMissingInBase, node, fingerprint)
    }

    pub fn removed(name: impl Into<String>, base_node: NodeRef, fingerprint: Fingerprint) -> Self {
        Self::new(name, EntityDifferenceKind::EntityMissingInSource, base_node, fingerprint)
    }

    pub fn modified(name: impl Into<String>, node: NodeRef, fingerprint: Fingerprint) -> Self {
        Self::new(
            name,
            EntityDifferenceKind::EntityPresentButDifferent,
            node,
            fingerprint,
        )
    }

    fn new(
        name: impl Into<String>,
        kind: EntityDifferenceKind,
        node: NodeRef,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            entity_name: name.into(),
            kind,
            node,
            fingerprint,
            differing_children: Vec::new(),
            differing_key_values: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<PrimitiveDifference>) -> Self {
        self.differing_children = children;
        self
    }

    pub fn with_key_values(mut self, key_values: Vec<KeyValueDifference>) -> Self {
        self.differing_key_values = key_values;
        self
    }
}

// ---------------------------------------------------------------------------
// ComparisonResult
// ---------------------------------------------------------------------------

/// All differences of one scene against a base scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    base_scene: SceneId,
    source_scene: SceneId,
    /// Changed entities, in the order the comparator reported them.
    pub differing_entities: Vec<EntityDifference>,
}

impl ComparisonResult {
    /// An empty comparison between `base_scene` and `source_scene`.
    pub fn new(base_scene: SceneId, source_scene: SceneId) -> Self {
        Self {
            base_scene,
            source_scene,
            differing_entities: Vec::new(),
        }
    }

    pub fn with_entities(mut self, entities: Vec<EntityDifference>) -> Self {
        self.differing_entities = entities;
        self
    }

    /// The scene both sides were compared against.
    pub fn base_scene(&self) -> SceneId {
        self.base_scene
    }

    /// The compared scene.
    pub fn source_scene(&self) -> SceneId {
        self.source_scene
    }

    /// Returns `true` if the scenes are equal.
    pub fn is_empty(&self) -> bool {
        self.differing_entities.is_empty()
    }

    /// Number of differing entities.
    pub fn len(&self) -> usize {
        self.differing_entities.len()
    }

    /// The difference for the entity called `name`, if any.
    pub fn find_entity(&self, name: &str) -> Option<&EntityDifference> {
        self.differing_entities
            .iter()
            .find(|diff| diff.entity_name == name)
    }

    /// Number of entity differences of the given kind.
    pub fn count(&self, kind: EntityDifferenceKind) -> usize {
        self.differing_entities
            .iter()
            .filter(|diff| diff.kind == kind)
            .count()
    }
}
