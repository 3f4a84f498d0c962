use tracing::trace;

use mapmerge_types::{Fingerprint, NodeId, SceneId};

use crate::error::{SceneError, SceneResult};
use crate::node::{entity_fingerprint, EntitySnapshot, Primitive};
use crate::traits::{SceneGraph, SceneGraphMut};

#[derive(Clone, Debug)]
struct EntityNode {
    key_values: Vec<(String, String)>,
    children: Vec<NodeId>,
}

#[derive(Clone, Debug)]
struct PrimitiveNode {
    parent: NodeId,
    primitive: Primitive,
    fingerprint: Fingerprint,
}

#[derive(Clone, Debug)]
enum SceneNode {
    Entity(EntityNode),
    Primitive(PrimitiveNode),
}

/// In-memory, slot-vector scene.
///
/// Intended for tests and embedding. Node ids index into a slot vector and
/// are never reused within one scene, so a stale [`NodeId`] resolves to
/// [`SceneError::NodeNotFound`] instead of to an unrelated node.
#[derive(Debug)]
pub struct InMemoryScene {
    id: SceneId,
    nodes: Vec<Option<SceneNode>>,
    entities: Vec<NodeId>,
}

impl InMemoryScene {
    /// Create a new empty scene with a fresh id.
    pub fn new() -> Self {
        Self::with_id(SceneId::new())
    }

    /// Create a new empty scene with the given id.
    pub fn with_id(id: SceneId) -> Self {
        Self {
            id,
            nodes: Vec::new(),
            entities: Vec::new(),
        }
    }

    /// Deep copy of this scene under a fresh id.
    ///
    /// Node ids are preserved, which makes it easy to derive a "source" and
    /// a "target" scene from a common base and edit the same entities.
    pub fn clone_as_new(&self) -> Self {
        Self {
            id: SceneId::new(),
            nodes: self.nodes.clone(),
            entities: self.entities.clone(),
        }
    }

    /// Number of entities in the scene.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of live primitives in the scene.
    pub fn primitive_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Some(SceneNode::Primitive(_))))
            .count()
    }

    fn next_id(&self) -> SceneResult<NodeId> {
        node_id_at(self.nodes.len())
    }

    fn node(&self, id: NodeId) -> SceneResult<&SceneNode> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(SceneError::NodeNotFound(id))
    }

    fn entity(&self, id: NodeId) -> SceneResult<&EntityNode> {
        match self.node(id)? {
            SceneNode::Entity(entity) => Ok(entity),
            SceneNode::Primitive(_) => Err(SceneError::NotAnEntity(id)),
        }
    }

    fn entity_mut(&mut self, id: NodeId) -> SceneResult<&mut EntityNode> {
        match self.nodes.get_mut(id.index()).and_then(Option::as_mut) {
            Some(SceneNode::Entity(entity)) => Ok(entity),
            Some(SceneNode::Primitive(_)) => Err(SceneError::NotAnEntity(id)),
            None => Err(SceneError::NodeNotFound(id)),
        }
    }

    fn primitive_node(&self, id: NodeId) -> SceneResult<&PrimitiveNode> {
        match self.node(id)? {
            SceneNode::Primitive(primitive) => Ok(primitive),
            SceneNode::Entity(_) => Err(SceneError::NotAPrimitive(id)),
        }
    }

    fn push_primitive(&mut self, parent: NodeId, primitive: Primitive) -> SceneResult<NodeId> {
        let id = self.next_id()?;
        let fingerprint = primitive.fingerprint();
        self.nodes.push(Some(SceneNode::Primitive(PrimitiveNode {
            parent,
            primitive,
            fingerprint,
        })));
        Ok(id)
    }
}

/// Id of the node stored at slot `index`.
fn node_id_at(index: usize) -> SceneResult<NodeId> {
    u32::try_from(index)
        .map(NodeId::new)
        .map_err(|_| SceneError::NodeLimit(index))
}

impl Default for InMemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph for InMemoryScene {
    fn scene_id(&self) -> SceneId {
        self.id
    }

    fn entities(&self) -> Vec<NodeId> {
        self.entities.clone()
    }

    fn primitives(&self, entity: NodeId) -> SceneResult<Vec<NodeId>> {
        Ok(self.entity(entity)?.children.clone())
    }

    fn primitive(&self, node: NodeId) -> SceneResult<&Primitive> {
        Ok(&self.primitive_node(node)?.primitive)
    }

    fn fingerprint(&self, node: NodeId) -> SceneResult<Fingerprint> {
        match self.node(node)? {
            SceneNode::Primitive(primitive) => Ok(primitive.fingerprint),
            SceneNode::Entity(entity) => {
                let children = entity
                    .children
                    .iter()
                    .map(|&child| Ok(self.primitive_node(child)?.fingerprint))
                    .collect::<SceneResult<Vec<_>>>()?;
                Ok(entity_fingerprint(
                    entity.key_values.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                    children,
                ))
            }
        }
    }

    fn key_value(&self, entity: NodeId, key: &str) -> SceneResult<Option<&str>> {
        Ok(self
            .entity(entity)?
            .key_values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str()))
    }

    fn key_values(&self, entity: NodeId) -> SceneResult<Vec<(&str, &str)>> {
        Ok(self
            .entity(entity)?
            .key_values
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect())
    }

    fn parent(&self, node: NodeId) -> SceneResult<Option<NodeId>> {
        match self.node(node)? {
            SceneNode::Primitive(primitive) => Ok(Some(primitive.parent)),
            SceneNode::Entity(_) => Ok(None),
        }
    }
}

impl SceneGraphMut for InMemoryScene {
    fn insert_entity(&mut self, snapshot: EntitySnapshot) -> SceneResult<NodeId> {
        let id = self.next_id()?;
        self.nodes.push(Some(SceneNode::Entity(EntityNode {
            key_values: snapshot.key_values,
            children: Vec::new(),
        })));
        self.entities.push(id);

        for primitive in snapshot.primitives {
            self.add_child(id, primitive)?;
        }

        trace!(scene = %self.id.short_id(), entity = %id, "inserted entity");
        Ok(id)
    }

    fn remove_entity(&mut self, entity: NodeId) -> SceneResult<()> {
        let children = self.entity(entity)?.children.clone();
        for child in children {
            self.nodes[child.index()] = None;
        }
        self.nodes[entity.index()] = None;
        self.entities.retain(|&id| id != entity);

        trace!(scene = %self.id.short_id(), entity = %entity, "removed entity");
        Ok(())
    }

    fn add_child(&mut self, entity: NodeId, primitive: Primitive) -> SceneResult<NodeId> {
        // Validate before allocating the node id.
        self.entity(entity)?;
        let id = self.push_primitive(entity, primitive)?;
        self.entity_mut(entity)?.children.push(id);
        Ok(id)
    }

    fn remove_child(&mut self, node: NodeId) -> SceneResult<()> {
        let parent = self.primitive_node(node)?.parent;
        self.entity_mut(parent)?.children.retain(|&id| id != node);
        self.nodes[node.index()] = None;
        Ok(())
    }

    fn set_key_value(&mut self, entity: NodeId, key: &str, value: &str) -> SceneResult<()> {
        let entity = self.entity_mut(entity)?;
        match entity
            .key_values
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some((_, existing)) => *existing = value.to_string(),
            None => entity.key_values.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn remove_key_value(&mut self, entity: NodeId, key: &str) -> SceneResult<bool> {
        let entity = self.entity_mut(entity)?;
        let before = entity.key_values.len();
        entity.key_values.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        Ok(entity.key_values.len() != before)
    }
}
