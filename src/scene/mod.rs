//! # Scene Model
//!
//! The graph being viewed lives outside the viewer. A [`SceneModel`] exposes it
//! as a per-frame [`SceneSnapshot`]: node and edge views with stable indices,
//! positions in model coordinates, visibility, color and a "selected" flag the
//! viewer may also write back.
//!
//! Model coordinates are divided by the snapshot's distance scale to obtain
//! world units; see [`SceneSnapshot::world_position`].
//!
//! [`GraphScene`] is an in-memory implementation used by the demo and tests.

pub mod graph_scene;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use cgmath::{InnerSpace, Vector3, Zero};

use crate::settings::Rgba;

pub use graph_scene::GraphScene;

/// Identity of a scene model, shared by every view over it.
pub type SceneId = u64;

/// Model units per world unit unless the scene says otherwise.
pub const DEFAULT_DISTANCE_SCALE: f32 = 178.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Node,
    Edge,
}

/// Reference to one node or edge by its scene index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementRef {
    pub kind: ElementKind,
    pub index: u32,
}

impl ElementRef {
    pub fn node(index: u32) -> Self {
        Self {
            kind: ElementKind::Node,
            index,
        }
    }

    pub fn edge(index: u32) -> Self {
        Self {
            kind: ElementKind::Edge,
            index,
        }
    }

    pub fn is_node(&self) -> bool {
        self.kind == ElementKind::Node
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ElementKind::Node => write!(f, "node {}", self.index),
            ElementKind::Edge => write!(f, "edge {}", self.index),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub index: u32,
    /// Position in model coordinates.
    pub position: Vector3<f32>,
    pub color: Rgba,
    pub visible: bool,
    pub selected: bool,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeView {
    pub index: u32,
    pub source: u32,
    pub target: u32,
    pub color: Rgba,
    pub visible: bool,
    pub selected: bool,
}

/// Read-only copy of a scene taken at the start of a frame.
#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    pub revision: u64,
    pub distance_scale: f32,
    /// Orbit pivot requested by the scene, in model coordinates.
    pub camera_origin: Option<Vector3<f32>>,
    nodes: Vec<NodeView>,
    edges: Vec<EdgeView>,
    node_slots: HashMap<u32, usize>,
    edge_slots: HashMap<u32, usize>,
}

impl SceneSnapshot {
    pub fn new(
        revision: u64,
        distance_scale: f32,
        camera_origin: Option<Vector3<f32>>,
        nodes: Vec<NodeView>,
        edges: Vec<EdgeView>,
    ) -> Self {
        let node_slots = nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (node.index, slot))
            .collect();
        let edge_slots = edges
            .iter()
            .enumerate()
            .map(|(slot, edge)| (edge.index, slot))
            .collect();
        let distance_scale = if distance_scale.is_finite() && distance_scale > 0.0 {
            distance_scale
        } else {
            log::warn!(
                "Invalid distance scale {}, using {}",
                distance_scale,
                DEFAULT_DISTANCE_SCALE
            );
            DEFAULT_DISTANCE_SCALE
        };
        Self {
            revision,
            distance_scale,
            camera_origin,
            nodes,
            edges,
            node_slots,
            edge_slots,
        }
    }

    /// A snapshot with nothing in it, as seen from a torn-down scene.
    pub fn empty() -> Self {
        Self::new(0, DEFAULT_DISTANCE_SCALE, None, Vec::new(), Vec::new())
    }

    pub fn nodes(&self) -> &[NodeView] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeView] {
        &self.edges
    }

    pub fn node(&self, index: u32) -> Option<&NodeView> {
        self.node_slots.get(&index).map(|&slot| &self.nodes[slot])
    }

    pub fn edge(&self, index: u32) -> Option<&EdgeView> {
        self.edge_slots.get(&index).map(|&slot| &self.edges[slot])
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Converts model coordinates to world units.
    pub fn to_world(&self, model: Vector3<f32>) -> Vector3<f32> {
        model / self.distance_scale
    }

    pub fn world_position(&self, node: &NodeView) -> Vector3<f32> {
        self.to_world(node.position)
    }

    /// Camera origin in world units.
    pub fn world_camera_origin(&self) -> Option<Vector3<f32>> {
        self.camera_origin.map(|origin| self.to_world(origin))
    }

    /// Both endpoints of an edge, or `None` if either index is stale.
    pub fn edge_endpoints(&self, edge: &EdgeView) -> Option<(&NodeView, &NodeView)> {
        let source = self.node(edge.source);
        let target = self.node(edge.target);
        match (source, target) {
            (Some(source), Some(target)) => Some((source, target)),
            _ => {
                log::warn!(
                    "Edge {} references missing node ({} -> {}), skipping",
                    edge.index,
                    edge.source,
                    edge.target
                );
                None
            }
        }
    }

    /// Average world position of visible nodes and the radius enclosing them.
    pub fn bounding_sphere(&self) -> Option<(Vector3<f32>, f32)> {
        let positions: Vec<Vector3<f32>> = self
            .nodes
            .iter()
            .filter(|node| node.visible)
            .map(|node| self.world_position(node))
            .collect();
        if positions.is_empty() {
            return None;
        }
        let center = positions.iter().fold(Vector3::zero(), |sum, p| sum + *p)
            / positions.len() as f32;
        let radius = positions
            .iter()
            .map(|p| (*p - center).magnitude())
            .fold(0.0f32, f32::max);
        Some((center, radius))
    }
}

/// The external graph a view renders.
pub trait SceneModel: Send + Sync {
    fn scene_id(&self) -> SceneId;

    /// Copies the current state for one frame.
    fn snapshot(&self) -> SceneSnapshot;

    /// Writes the "selected" flag. Returns false if the element doesn't exist.
    fn set_selected(&mut self, element: ElementRef, selected: bool) -> bool;

    fn is_selected(&self, element: ElementRef) -> bool;
}

/// A scene model shared between views and the host.
pub type SharedScene = Arc<RwLock<dyn SceneModel>>;

/// Wraps a scene model for sharing.
pub fn share<S: SceneModel + 'static>(scene: S) -> SharedScene {
    Arc::new(RwLock::new(scene))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn node(index: u32, x: f32) -> NodeView {
        NodeView {
            index,
            position: Vector3::new(x, 0.0, 0.0),
            color: [1.0; 4],
            visible: true,
            selected: false,
            label: None,
        }
    }

    #[test]
    fn test_world_position_uses_distance_scale() {
        let snapshot = SceneSnapshot::new(1, 100.0, None, vec![node(3, 250.0)], vec![]);
        let n = snapshot.node(3).unwrap();
        assert_relative_eq!(snapshot.world_position(n).x, 2.5);
    }

    #[test]
    fn test_stale_edge_has_no_endpoints() {
        let edge = EdgeView {
            index: 0,
            source: 1,
            target: 99,
            color: [1.0; 4],
            visible: true,
            selected: false,
        };
        let snapshot = SceneSnapshot::new(1, 1.0, None, vec![node(1, 0.0)], vec![edge.clone()]);
        assert!(snapshot.edge_endpoints(&edge).is_none());
    }

    #[test]
    fn test_bounding_sphere_ignores_hidden_nodes() {
        let mut hidden = node(2, 1000.0);
        hidden.visible = false;
        let snapshot =
            SceneSnapshot::new(1, 1.0, None, vec![node(0, -1.0), node(1, 1.0), hidden], vec![]);
        let (center, radius) = snapshot.bounding_sphere().unwrap();
        assert_relative_eq!(center.x, 0.0);
        assert_relative_eq!(radius, 1.0);
        assert!(SceneSnapshot::empty().bounding_sphere().is_none());
    }

    #[test]
    fn test_invalid_distance_scale_falls_back() {
        let snapshot = SceneSnapshot::new(1, 0.0, None, vec![], vec![]);
        assert_eq!(snapshot.distance_scale, DEFAULT_DISTANCE_SCALE);
    }
}
