//! # Object Picking System
//!
//! Maps a screen point or rectangle to the graph elements under it, using the
//! camera that will render the frame.
//!
//! ## How it works
//!
//! 1. **Project**: node centers and edge polylines are projected to pixels
//!    with a [`ScreenProjector`]
//! 2. **Test**: nodes are screen-space disks sized from their world radius,
//!    edges are screen-space segments widened by a pixel tolerance
//! 3. **Order**: hits are sorted by view depth, then nodes before edges, then
//!    by lowest index, so equal inputs always give the same answer
//!
//! A point pick answers with the closest node under the pointer, and only
//! falls back to the closest edge when no node is hit. Selected nodes are
//! drawn larger and are picked at that larger radius.
//!
//! Hidden elements, and geometry entirely behind the near plane, are never
//! hit. Nothing is cached between calls; an empty scene just gives no hits.
//!
//! ## Usage
//!
//! ```no_run
//! # use netview3d::gfx::picking::{ObjectPicker, PickBuffer};
//! # use netview3d::gfx::camera::ScreenProjector;
//! # use netview3d::scene::SceneSnapshot;
//! # fn demo(picker: &ObjectPicker, projector: &ScreenProjector, scene: &SceneSnapshot) {
//! let mut buffer = PickBuffer::default();
//! let curves = picker.edge_curves(scene);
//! if let Some(hit) = picker.pick_point(cgmath::Point2::new(120.0, 80.0), projector, scene, &curves, &mut buffer) {
//!     println!("Pointer is over {}", hit.element);
//! }
//! # }
//! ```

use std::cmp::Ordering;

use cgmath::{InnerSpace, MetricSpace, Point2, Vector2, Vector3};
use indexmap::IndexSet;

use crate::gfx::camera::ScreenProjector;
use crate::gfx::geometry::{edge_curves, EdgeCurve, EdgeStyle};
use crate::scene::{ElementKind, ElementRef, SceneSnapshot};
use crate::settings::{PickingSettings, RenderSettings};

/// Axis-aligned screen rectangle with `min <= max` componentwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub min: Point2<f32>,
    pub max: Point2<f32>,
}

impl ScreenRect {
    /// Normalizes two arbitrary corners.
    pub fn from_corners(a: Point2<f32>, b: Point2<f32>) -> Self {
        Self {
            min: Point2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn contains(&self, p: Point2<f32>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Whether a disk overlaps the rectangle.
    pub fn intersects_circle(&self, center: Point2<f32>, radius: f32) -> bool {
        let closest = Point2::new(
            center.x.clamp(self.min.x, self.max.x),
            center.y.clamp(self.min.y, self.max.y),
        );
        closest.distance2(center) <= radius * radius
    }

    /// Whether a segment crosses or lies inside the rectangle (Liang-Barsky clip).
    pub fn intersects_segment(&self, a: Point2<f32>, b: Point2<f32>) -> bool {
        let d = b - a;
        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;
        let checks = [
            (-d.x, a.x - self.min.x),
            (d.x, self.max.x - a.x),
            (-d.y, a.y - self.min.y),
            (d.y, self.max.y - a.y),
        ];
        for (p, q) in checks {
            if p == 0.0 {
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return false;
            }
        }
        true
    }

    /// Corners in drawing order, starting top-left.
    pub fn corners(&self) -> [Point2<f32>; 4] {
        [
            self.min,
            Point2::new(self.max.x, self.min.y),
            self.max,
            Point2::new(self.min.x, self.max.y),
        ]
    }
}

/// What to pick against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickRegion {
    Point(Point2<f32>),
    Rect(ScreenRect),
}

/// One element under the pick region and its view depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub element: ElementRef,
    pub depth: f32,
}

/// Caller-owned, per-frame hit list. Cleared at the start of every pick.
#[derive(Debug, Default)]
pub struct PickBuffer {
    hits: Vec<PickHit>,
}

impl PickBuffer {
    pub fn hits(&self) -> &[PickHit] {
        &self.hits
    }

    pub fn closest(&self) -> Option<PickHit> {
        self.hits.first().copied()
    }

    /// Closest hit of one element kind.
    pub fn closest_of(&self, kind: ElementKind) -> Option<PickHit> {
        self.hits.iter().find(|hit| hit.element.kind == kind).copied()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn clear(&mut self) {
        self.hits.clear();
    }

    fn sort(&mut self) {
        self.hits.sort_by(compare_hits);
    }
}

/// Result of a rectangle pick, nodes and edges kept apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RectPick {
    pub nodes: IndexSet<u32>,
    pub edges: IndexSet<u32>,
}

impl RectPick {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    fn from_buffer(buffer: &PickBuffer) -> Self {
        let mut pick = Self::default();
        for hit in buffer.hits() {
            match hit.element.kind {
                ElementKind::Node => pick.nodes.insert(hit.element.index),
                ElementKind::Edge => pick.edges.insert(hit.element.index),
            };
        }
        pick
    }
}

/// Screen-space picker for nodes (spheres) and edges (polylines).
#[derive(Debug, Clone)]
pub struct ObjectPicker {
    node_radius: f32,
    selected_scale: f32,
    edge_tolerance_px: f32,
    min_node_radius_px: f32,
    edge_style: EdgeStyle,
}

impl Default for ObjectPicker {
    fn default() -> Self {
        Self::new(&PickingSettings::default(), &RenderSettings::default())
    }
}

impl ObjectPicker {
    pub fn new(picking: &PickingSettings, render: &RenderSettings) -> Self {
        Self {
            node_radius: picking.node_radius,
            selected_scale: render.selected_scale,
            edge_tolerance_px: picking.edge_tolerance_px,
            min_node_radius_px: picking.min_node_radius_px,
            edge_style: EdgeStyle::new(picking, render),
        }
    }

    /// Edge polylines exactly as this picker expects them to be rendered.
    pub fn edge_curves(&self, scene: &SceneSnapshot) -> Vec<EdgeCurve> {
        edge_curves(scene, &self.edge_style)
    }

    pub fn edge_style(&self) -> &EdgeStyle {
        &self.edge_style
    }

    /// Fills `buffer` with every element intersecting `region`, closest first.
    pub fn pick(
        &self,
        region: &PickRegion,
        projector: &ScreenProjector,
        scene: &SceneSnapshot,
        curves: &[EdgeCurve],
        buffer: &mut PickBuffer,
    ) {
        buffer.clear();
        if projector.viewport().is_empty() {
            return;
        }
        self.pick_nodes(region, projector, scene, buffer);
        self.pick_edges(region, projector, curves, buffer);
        buffer.sort();
    }

    /// The closest node under a point, or the closest edge if no node is hit.
    pub fn pick_point(
        &self,
        point: Point2<f32>,
        projector: &ScreenProjector,
        scene: &SceneSnapshot,
        curves: &[EdgeCurve],
        buffer: &mut PickBuffer,
    ) -> Option<PickHit> {
        self.pick(&PickRegion::Point(point), projector, scene, curves, buffer);
        buffer
            .closest_of(ElementKind::Node)
            .or_else(|| buffer.closest_of(ElementKind::Edge))
    }

    /// All elements inside a rectangle.
    pub fn pick_rect(
        &self,
        rect: ScreenRect,
        projector: &ScreenProjector,
        scene: &SceneSnapshot,
        curves: &[EdgeCurve],
        buffer: &mut PickBuffer,
    ) -> RectPick {
        self.pick(&PickRegion::Rect(rect), projector, scene, curves, buffer);
        RectPick::from_buffer(buffer)
    }

    fn pick_nodes(
        &self,
        region: &PickRegion,
        projector: &ScreenProjector,
        scene: &SceneSnapshot,
        buffer: &mut PickBuffer,
    ) {
        let znear = projector.projection().znear;
        for node in scene.nodes().iter().filter(|node| node.visible) {
            let world = scene.world_position(node);
            let Some(center) = projector.project(world) else {
                continue;
            };
            if center.depth < znear {
                continue;
            }
            let radius = if node.selected {
                self.node_radius * self.selected_scale
            } else {
                self.node_radius
            };
            let radius_px =
                (radius * projector.pixels_per_unit(center.depth)).max(self.min_node_radius_px);
            let hit = match region {
                PickRegion::Point(p) => center.position.distance2(*p) <= radius_px * radius_px,
                PickRegion::Rect(rect) => rect.intersects_circle(center.position, radius_px),
            };
            if hit {
                buffer.hits.push(PickHit {
                    element: ElementRef::node(node.index),
                    // Front of the sphere, so a node wins over edges entering it.
                    depth: center.depth - radius,
                });
            }
        }
    }

    fn pick_edges(
        &self,
        region: &PickRegion,
        projector: &ScreenProjector,
        curves: &[EdgeCurve],
        buffer: &mut PickBuffer,
    ) {
        let znear = projector.projection().znear;
        for curve in curves {
            let mut best: Option<f32> = None;
            for pair in curve.points.windows(2) {
                let Some((a, b)) = clip_to_near(pair[0], pair[1], projector, znear) else {
                    continue;
                };
                let (Some(sa), Some(sb)) = (projector.project(a), projector.project(b)) else {
                    continue;
                };
                let depth = match region {
                    PickRegion::Point(p) => {
                        let (distance, t) = segment_distance(*p, sa.position, sb.position);
                        (distance <= self.edge_tolerance_px)
                            .then(|| sa.depth + (sb.depth - sa.depth) * t)
                    }
                    PickRegion::Rect(rect) => rect
                        .intersects_segment(sa.position, sb.position)
                        .then(|| sa.depth.min(sb.depth)),
                };
                if let Some(depth) = depth {
                    best = Some(best.map_or(depth, |current| current.min(depth)));
                }
            }
            if let Some(depth) = best {
                buffer.hits.push(PickHit {
                    element: ElementRef::edge(curve.edge),
                    depth,
                });
            }
        }
    }
}

/// Depth, then nodes before edges, then lowest index.
fn compare_hits(a: &PickHit, b: &PickHit) -> Ordering {
    a.depth
        .total_cmp(&b.depth)
        .then(a.element.kind.cmp(&b.element.kind))
        .then(a.element.index.cmp(&b.element.index))
}

/// Trims a world segment to the part in front of the near plane.
fn clip_to_near(
    a: Vector3<f32>,
    b: Vector3<f32>,
    projector: &ScreenProjector,
    znear: f32,
) -> Option<(Vector3<f32>, Vector3<f32>)> {
    let da = projector.depth_of(a);
    let db = projector.depth_of(b);
    match (da >= znear, db >= znear) {
        (true, true) => Some((a, b)),
        (false, false) => None,
        (true, false) => Some((a, a + (b - a) * ((znear - da) / (db - da)))),
        (false, true) => Some((a + (b - a) * ((znear - da) / (db - da)), b)),
    }
}

/// Distance from `p` to segment `ab` and the segment parameter of the closest point.
fn segment_distance(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> (f32, f32) {
    let ab: Vector2<f32> = b - a;
    let length2 = ab.magnitude2();
    let t = if length2 <= f32::EPSILON {
        0.0
    } else {
        ((p - a).dot(ab) / length2).clamp(0.0, 1.0)
    };
    let closest = a + ab * t;
    (closest.distance(p), t)
}
