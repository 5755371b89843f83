//! # Edge Geometry
//!
//! World-space polylines for the visible edges of a snapshot. Rendering and
//! picking both consume these, so what the user sees is exactly what is hit.
//!
//! - A single edge between two nodes is a straight segment.
//! - Several edges between the same pair of nodes fan out as quadratic Bézier
//!   arcs, spread evenly on both sides of the straight line.
//! - A self-loop is a small circle touching its node, with successive loops on
//!   the same node growing outwards.
//!
//! Edges with a missing endpoint are logged and skipped; edges touching a
//! hidden node are hidden with it.

use std::f32::consts::TAU;

use cgmath::{InnerSpace, Vector3};
use indexmap::IndexMap;

use crate::scene::{EdgeView, SceneSnapshot};
use crate::settings::{PickingSettings, RenderSettings};

#[derive(Debug, Clone, Copy)]
pub struct EdgeStyle {
    /// Segments per curved edge.
    pub arc_segments: u32,
    /// Sideways bulge between neighbouring parallel edges, as a fraction of edge length.
    pub arc_spread: f32,
    /// Node radius in world units; self-loops are sized from it.
    pub node_radius: f32,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            arc_segments: 12,
            arc_spread: 0.2,
            node_radius: 0.102,
        }
    }
}

impl EdgeStyle {
    pub fn new(picking: &PickingSettings, render: &RenderSettings) -> Self {
        Self {
            arc_segments: render.arc_segments,
            arc_spread: render.arc_spread,
            node_radius: picking.node_radius,
        }
    }
}

/// One edge as a world-space polyline.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCurve {
    pub edge: u32,
    pub points: Vec<Vector3<f32>>,
}

/// Builds polylines for every drawable edge, in snapshot order.
pub fn edge_curves(snapshot: &SceneSnapshot, style: &EdgeStyle) -> Vec<EdgeCurve> {
    let mut groups: IndexMap<(u32, u32), Vec<&EdgeView>> = IndexMap::new();
    for edge in snapshot.edges().iter().filter(|edge| edge.visible) {
        let Some((source, target)) = snapshot.edge_endpoints(edge) else {
            continue;
        };
        if !source.visible || !target.visible {
            continue;
        }
        let key = (edge.source.min(edge.target), edge.source.max(edge.target));
        groups.entry(key).or_default().push(edge);
    }

    let mut curves = Vec::with_capacity(snapshot.edges().len());
    for ((a, b), edges) in groups {
        let (Some(first), Some(second)) = (snapshot.node(a), snapshot.node(b)) else {
            continue;
        };
        let start = snapshot.world_position(first);
        let end = snapshot.world_position(second);

        if a == b {
            for (slot, edge) in edges.iter().enumerate() {
                curves.push(EdgeCurve {
                    edge: edge.index,
                    points: self_loop(start, slot, style),
                });
            }
            continue;
        }

        let count = edges.len();
        for (slot, edge) in edges.iter().enumerate() {
            let points = if count == 1 {
                vec![start, end]
            } else {
                let offset = slot as f32 - (count - 1) as f32 * 0.5;
                arc(start, end, offset * style.arc_spread, style.arc_segments)
            };
            // Keep each polyline running from its own source to its own target.
            let points = if edge.source == a {
                points
            } else {
                points.into_iter().rev().collect()
            };
            curves.push(EdgeCurve {
                edge: edge.index,
                points,
            });
        }
    }
    curves
}

/// Quadratic Bézier from `start` to `end` whose control point is pushed sideways
/// by `bulge * |end - start|`.
fn arc(start: Vector3<f32>, end: Vector3<f32>, bulge: f32, segments: u32) -> Vec<Vector3<f32>> {
    let chord = end - start;
    let length = chord.magnitude();
    if length <= f32::EPSILON || bulge == 0.0 {
        return vec![start, end];
    }
    let side = perpendicular(chord / length);
    // A quadratic Bézier reaches half of its control offset at the midpoint.
    let control = (start + end) * 0.5 + side * (2.0 * bulge * length);

    let segments = segments.max(2);
    (0..=segments)
        .map(|i| {
            let t = i as f32 / segments as f32;
            let u = 1.0 - t;
            start * (u * u) + control * (2.0 * u * t) + end * (t * t)
        })
        .collect()
}

fn self_loop(center: Vector3<f32>, slot: usize, style: &EdgeStyle) -> Vec<Vector3<f32>> {
    let radius = style.node_radius * (1.5 + slot as f32 * 0.75);
    let up = Vector3::unit_y();
    let side = Vector3::unit_x();
    // Circle touching the node's center from above.
    let loop_center = center + up * radius;
    let segments = style.arc_segments.max(6);
    (0..=segments)
        .map(|i| {
            let angle = -TAU * 0.25 + TAU * i as f32 / segments as f32;
            loop_center + side * (radius * angle.cos()) + up * (radius * angle.sin())
        })
        .collect()
}

/// A unit vector perpendicular to `direction`, horizontal where possible.
fn perpendicular(direction: Vector3<f32>) -> Vector3<f32> {
    let candidate = direction.cross(Vector3::unit_y());
    if candidate.magnitude2() > 1e-4 {
        candidate.normalize()
    } else {
        direction.cross(Vector3::unit_x()).normalize()
    }
}
