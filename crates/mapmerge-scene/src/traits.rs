use mapmerge_types::{Fingerprint, NodeId, NodeRef, SceneId};

use crate::error::SceneResult;
use crate::node::{EntitySnapshot, Primitive};

/// Read access to one scene.
///
/// All implementations must satisfy these invariants:
/// - `entities()` and `primitives()` return nodes in a stable order.
/// - Fingerprints depend only on node content, never on position or on
///   which scene the node lives in.
/// - Key lookups are case-insensitive.
pub trait SceneGraph {
    /// Identity of this scene root.
    fn scene_id(&self) -> SceneId;

    /// All entity nodes, in scene order.
    fn entities(&self) -> Vec<NodeId>;

    /// Primitive children of `entity`, in child order.
    fn primitives(&self, entity: NodeId) -> SceneResult<Vec<NodeId>>;

    /// Geometry of a primitive node.
    fn primitive(&self, node: NodeId) -> SceneResult<&Primitive>;

    /// Content fingerprint of an entity or primitive node.
    fn fingerprint(&self, node: NodeId) -> SceneResult<Fingerprint>;

    /// Value of `key` on `entity`, matched case-insensitively.
    fn key_value(&self, entity: NodeId, key: &str) -> SceneResult<Option<&str>>;

    /// All key/value pairs of `entity`, in insertion order.
    fn key_values(&self, entity: NodeId) -> SceneResult<Vec<(&str, &str)>>;

    /// The owning entity of a primitive, `None` for entities.
    fn parent(&self, node: NodeId) -> SceneResult<Option<NodeId>>;

    /// Stable name of an entity.
    ///
    /// The `name` key when present. The world entity usually carries no
    /// name and is reported as `worldspawn`. Returns `None` for nodes that
    /// are not named entities.
    fn entity_name(&self, entity: NodeId) -> Option<String> {
        if let Ok(Some(name)) = self.key_value(entity, "name") {
            return Some(name.to_string());
        }
        match self.key_value(entity, "classname") {
            Ok(Some(classname)) if classname.eq_ignore_ascii_case("worldspawn") => {
                Some("worldspawn".to_string())
            }
            _ => None,
        }
    }

    /// Find an entity by name (linear scan).
    fn find_entity(&self, name: &str) -> Option<NodeId> {
        self.entities()
            .into_iter()
            .find(|&id| self.entity_name(id).as_deref() == Some(name))
    }

    /// Detached copy of an entity and its primitives.
    fn entity_snapshot(&self, entity: NodeId) -> SceneResult<EntitySnapshot> {
        let key_values = self
            .key_values(entity)?
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let primitives = self
            .primitives(entity)?
            .into_iter()
            .map(|id| self.primitive(id).cloned())
            .collect::<SceneResult<Vec<_>>>()?;
        Ok(EntitySnapshot {
            key_values,
            primitives,
        })
    }

    /// Handle for `node` in this scene.
    fn node_ref(&self, node: NodeId) -> NodeRef {
        NodeRef::new(self.scene_id(), node)
    }
}

/// Write access to one scene, used to apply merge results.
pub trait SceneGraphMut: SceneGraph {
    /// Insert a new entity (with its primitives) at the end of the scene.
    fn insert_entity(&mut self, snapshot: EntitySnapshot) -> SceneResult<NodeId>;

    /// Remove an entity together with all of its primitives.
    fn remove_entity(&mut self, entity: NodeId) -> SceneResult<()>;

    /// Append a primitive child to `entity`.
    fn add_child(&mut self, entity: NodeId, primitive: Primitive) -> SceneResult<NodeId>;

    /// Remove a primitive from its entity.
    fn remove_child(&mut self, node: NodeId) -> SceneResult<()>;

    /// Set `key` to `value`, replacing any existing value of the same key
    /// (case-insensitive).
    fn set_key_value(&mut self, entity: NodeId, key: &str, value: &str) -> SceneResult<()>;

    /// Remove `key`. Returns `true` if the key was present.
    fn remove_key_value(&mut self, entity: NodeId, key: &str) -> SceneResult<bool>;
}
