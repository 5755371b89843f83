//! In-memory graph implementing [`SceneModel`].

use std::sync::atomic::{AtomicU64, Ordering};

use cgmath::Vector3;
use indexmap::IndexMap;

use super::{
    EdgeView, ElementKind, ElementRef, NodeView, SceneId, SceneModel, SceneSnapshot,
    DEFAULT_DISTANCE_SCALE,
};
use crate::settings::Rgba;

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);

const DEFAULT_COLOR: Rgba = [0.67, 0.67, 0.67, 1.0];

/// A mutable graph with stable, never-reused node and edge indices.
///
/// Iteration order is insertion order, so snapshots are deterministic.
#[derive(Debug)]
pub struct GraphScene {
    id: SceneId,
    revision: u64,
    distance_scale: f32,
    camera_origin: Option<Vector3<f32>>,
    nodes: IndexMap<u32, NodeView>,
    edges: IndexMap<u32, EdgeView>,
    next_node: u32,
    next_edge: u32,
}

impl Default for GraphScene {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphScene {
    pub fn new() -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            revision: 0,
            distance_scale: DEFAULT_DISTANCE_SCALE,
            camera_origin: None,
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            next_node: 0,
            next_edge: 0,
        }
    }

    pub fn with_distance_scale(mut self, distance_scale: f32) -> Self {
        self.distance_scale = distance_scale;
        self
    }

    /// Adds a visible node at a model-space position and returns its index.
    pub fn add_node(&mut self, position: Vector3<f32>) -> u32 {
        let index = self.next_node;
        self.next_node += 1;
        self.nodes.insert(
            index,
            NodeView {
                index,
                position,
                color: DEFAULT_COLOR,
                visible: true,
                selected: false,
                label: None,
            },
        );
        self.touch();
        index
    }

    pub fn add_labeled_node(&mut self, position: Vector3<f32>, label: impl Into<String>) -> u32 {
        let index = self.add_node(position);
        if let Some(node) = self.nodes.get_mut(&index) {
            node.label = Some(label.into());
        }
        index
    }

    /// Adds an edge between two existing nodes. Self-loops and parallel edges are allowed.
    pub fn add_edge(&mut self, source: u32, target: u32) -> Option<u32> {
        if !self.nodes.contains_key(&source) || !self.nodes.contains_key(&target) {
            log::warn!("Cannot add edge {} -> {}: missing endpoint", source, target);
            return None;
        }
        let index = self.next_edge;
        self.next_edge += 1;
        self.edges.insert(
            index,
            EdgeView {
                index,
                source,
                target,
                color: DEFAULT_COLOR,
                visible: true,
                selected: false,
            },
        );
        self.touch();
        Some(index)
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node(&mut self, index: u32) -> bool {
        if self.nodes.shift_remove(&index).is_none() {
            return false;
        }
        self.edges
            .retain(|_, edge| edge.source != index && edge.target != index);
        self.touch();
        true
    }

    pub fn remove_edge(&mut self, index: u32) -> bool {
        let removed = self.edges.shift_remove(&index).is_some();
        if removed {
            self.touch();
        }
        removed
    }

    pub fn set_node_position(&mut self, index: u32, position: Vector3<f32>) -> bool {
        self.update_node(index, |node| node.position = position)
    }

    pub fn set_node_color(&mut self, index: u32, color: Rgba) -> bool {
        self.update_node(index, |node| node.color = color)
    }

    pub fn set_node_visible(&mut self, index: u32, visible: bool) -> bool {
        self.update_node(index, |node| node.visible = visible)
    }

    pub fn set_edge_color(&mut self, index: u32, color: Rgba) -> bool {
        self.update_edge(index, |edge| edge.color = color)
    }

    pub fn set_edge_visible(&mut self, index: u32, visible: bool) -> bool {
        self.update_edge(index, |edge| edge.visible = visible)
    }

    /// Sets the orbit pivot views should center on, in model coordinates.
    pub fn set_camera_origin(&mut self, origin: Option<Vector3<f32>>) {
        self.camera_origin = origin;
        self.touch();
    }

    pub fn node(&self, index: u32) -> Option<&NodeView> {
        self.nodes.get(&index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn selected_nodes(&self) -> Vec<u32> {
        self.nodes
            .values()
            .filter(|node| node.selected)
            .map(|node| node.index)
            .collect()
    }

    pub fn selected_edges(&self) -> Vec<u32> {
        self.edges
            .values()
            .filter(|edge| edge.selected)
            .map(|edge| edge.index)
            .collect()
    }

    fn update_node(&mut self, index: u32, f: impl FnOnce(&mut NodeView)) -> bool {
        match self.nodes.get_mut(&index) {
            Some(node) => {
                f(node);
                self.touch();
                true
            }
            None => false,
        }
    }

    fn update_edge(&mut self, index: u32, f: impl FnOnce(&mut EdgeView)) -> bool {
        match self.edges.get_mut(&index) {
            Some(edge) => {
                f(edge);
                self.touch();
                true
            }
            None => false,
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

impl SceneModel for GraphScene {
    fn scene_id(&self) -> SceneId {
        self.id
    }

    fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot::new(
            self.revision,
            self.distance_scale,
            self.camera_origin,
            self.nodes.values().cloned().collect(),
            self.edges.values().cloned().collect(),
        )
    }

    fn set_selected(&mut self, element: ElementRef, selected: bool) -> bool {
        match element.kind {
            ElementKind::Node => self.update_node(element.index, |node| node.selected = selected),
            ElementKind::Edge => self.update_edge(element.index, |edge| edge.selected = selected),
        }
    }

    fn is_selected(&self, element: ElementRef) -> bool {
        match element.kind {
            ElementKind::Node => self.nodes.get(&element.index).is_some_and(|n| n.selected),
            ElementKind::Edge => self.edges.get(&element.index).is_some_and(|e| e.selected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_stable_after_removal() {
        let mut scene = GraphScene::new();
        let a = scene.add_node(Vector3::new(0.0, 0.0, 0.0));
        let b = scene.add_node(Vector3::new(1.0, 0.0, 0.0));
        let c = scene.add_node(Vector3::new(2.0, 0.0, 0.0));
        scene.add_edge(a, b);
        scene.add_edge(b, c);

        assert!(scene.remove_node(b));
        let d = scene.add_node(Vector3::new(3.0, 0.0, 0.0));
        assert_ne!(d, b);
        assert_eq!(scene.edge_count(), 0);
        assert!(scene.node(c).is_some());
    }

    #[test]
    fn test_add_edge_rejects_missing_endpoint() {
        let mut scene = GraphScene::new();
        let a = scene.add_node(Vector3::new(0.0, 0.0, 0.0));
        assert!(scene.add_edge(a, 42).is_none());
        assert!(scene.add_edge(a, a).is_some());
    }

    #[test]
    fn test_selection_flags_round_trip_through_snapshot() {
        let mut scene = GraphScene::new();
        let a = scene.add_node(Vector3::new(0.0, 0.0, 0.0));
        let b = scene.add_node(Vector3::new(1.0, 0.0, 0.0));
        let e = scene.add_edge(a, b).unwrap();

        assert!(scene.set_selected(ElementRef::node(b), true));
        assert!(scene.set_selected(ElementRef::edge(e), true));
        assert!(!scene.set_selected(ElementRef::node(99), true));

        let snapshot = scene.snapshot();
        assert!(snapshot.node(b).unwrap().selected);
        assert!(!snapshot.node(a).unwrap().selected);
        assert!(snapshot.edges()[0].selected);
        assert_eq!(scene.selected_nodes(), vec![b]);
    }

    #[test]
    fn test_revision_increases_on_mutation() {
        let mut scene = GraphScene::new();
        let before = scene.snapshot().revision;
        scene.add_node(Vector3::new(0.0, 0.0, 0.0));
        assert!(scene.snapshot().revision > before);
    }

    #[test]
    fn test_scene_ids_are_unique() {
        assert_ne!(GraphScene::new().scene_id(), GraphScene::new().scene_id());
    }
}
