//! Scene graph arena.
//!
//! Nodes live in a flat vector and refer to each other by [`NodeId`]. Entity
//! nodes only carry an [`EntityId`]; the entity itself lives in the city's
//! arena, so hit testing resolves ids instead of walking parent links.

use glam::{Mat4, Vec3};
use skillcity_assets::{GeometryHandle, MaterialHandle};
use skillcity_common::{Color, EntityId, Transform};
use skillcity_entity::InstancedBatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient { color: Color, intensity: f32 },
    Directional {
        direction: Vec3,
        color: Color,
        intensity: f32,
        cast_shadow: bool,
    },
    Point { color: Color, intensity: f32, range: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    Empty,
    Mesh {
        geometry: GeometryHandle,
        material: MaterialHandle,
        cast_shadow: bool,
    },
    Batch(InstancedBatch),
    Light(Light),
    /// The entity arena owns the entity's transform; nodes holding one keep
    /// an identity transform.
    Entity(EntityId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub transform: Transform,
    pub content: NodeContent,
}

#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub const ROOT: NodeId = NodeId(0);

    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: "city".into(),
                parent: None,
                children: Vec::new(),
                transform: Transform::default(),
                content: NodeContent::Empty,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// Attach a new node under `parent`. An unknown parent attaches to the
    /// root instead.
    pub fn add(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        transform: Transform,
        content: NodeContent,
    ) -> NodeId {
        let parent = if self.get(parent).is_some() { parent } else { Self::ROOT };
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
            transform,
            content,
        });
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    /// Convenience for a named empty group under the root.
    pub fn group(&mut self, name: impl Into<String>) -> NodeId {
        self.add(Self::ROOT, name, Transform::default(), NodeContent::Empty)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Depth-first pre-order from the root; children in insertion order.
    pub fn traverse(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.get(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    /// Node transform composed with all its ancestors.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node) = current.and_then(|n| self.get(n)) {
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    /// Entity ids in traversal order.
    pub fn entity_order(&self) -> Vec<EntityId> {
        self.traverse()
            .into_iter()
            .filter_map(|id| match self.get(id)?.content {
                NodeContent::Entity(entity) => Some(entity),
                _ => None,
            })
            .collect()
    }

    pub fn lights(&self) -> impl Iterator<Item = (NodeId, &Light)> {
        self.nodes.iter().enumerate().filter_map(|(i, node)| match &node.content {
            NodeContent::Light(light) => Some((NodeId(i as u32), light)),
            _ => None,
        })
    }

    /// Remove everything but an empty root.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[0].children.clear();
    }
}
