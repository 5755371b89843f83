//! Stock render procedures.

use cgmath::{Matrix4, Vector3};

use crate::error::RenderError;
use crate::gfx::geometry::generate_sphere;
use crate::scene::{ElementRef, NodeView};
use crate::settings::Rgba;

use super::backend::{GraphicsBackend, MeshHandle};
use super::pipeline::{FrameContext, RenderProcedure, SceneContext};

/// Clears color and depth.
pub struct ResetProcedure;

impl RenderProcedure for ResetProcedure {
    fn name(&self) -> &'static str {
        "reset"
    }

    fn execute(
        &self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        backend.clear(frame.settings.render.clear_color);
        Ok(())
    }
}

/// Uploads the view-projection for this frame.
pub struct PositionCameraProcedure;

impl RenderProcedure for PositionCameraProcedure {
    fn name(&self) -> &'static str {
        "position camera"
    }

    fn execute(
        &self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        let projection = frame.projector.projection().wgpu_matrix();
        backend.set_camera(frame.camera.uniform(projection));
        Ok(())
    }
}

/// Draws each visible node as a sphere.
///
/// Hovered nodes use the hover color; selected nodes, and nodes inside the
/// drag rectangle, are drawn larger in the selected color.
#[derive(Default)]
pub struct DrawNodesProcedure {
    sphere: Option<MeshHandle>,
}

impl DrawNodesProcedure {
    fn appearance(frame: &FrameContext<'_>, node: &NodeView) -> (Rgba, f32) {
        let render = &frame.settings.render;
        let (hovered, highlighted) = match frame.selection {
            Some(selection) => (
                selection.is_hovered(ElementRef::node(node.index)),
                selection.is_node_highlighted(node.index),
            ),
            None => (false, node.selected),
        };
        let scale = if highlighted { render.selected_scale } else { 1.0 };
        if hovered {
            (render.hover_color, scale)
        } else if highlighted {
            (render.selected_color, scale)
        } else {
            (node.color, scale)
        }
    }
}

impl RenderProcedure for DrawNodesProcedure {
    fn name(&self) -> &'static str {
        "draw nodes"
    }

    fn initialize(
        &mut self,
        ctx: &SceneContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        let render = &ctx.settings.render;
        let sphere = generate_sphere(
            render.sphere_longitude_segments,
            render.sphere_latitude_segments,
        );
        self.sphere = Some(backend.compile_mesh(&sphere)?);
        Ok(())
    }

    fn execute(
        &self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        let Some(sphere) = self.sphere else {
            log::warn!("Node sphere not compiled, skipping nodes");
            return Ok(());
        };
        let radius = frame.settings.picking.node_radius;
        for node in frame.scene.nodes().iter().filter(|node| node.visible) {
            let (color, scale) = Self::appearance(frame, node);
            let transform = Matrix4::from_translation(frame.scene.world_position(node))
                * Matrix4::from_scale(radius * scale);
            backend.draw_mesh(sphere, transform, color)?;
        }
        Ok(())
    }
}

/// Draws the shared edge polylines.
pub struct DrawEdgesProcedure;

impl RenderProcedure for DrawEdgesProcedure {
    fn name(&self) -> &'static str {
        "draw edges"
    }

    fn execute(
        &self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        let render = &frame.settings.render;
        for curve in frame.edges {
            let Some(edge) = frame.scene.edge(curve.edge) else {
                log::warn!("Edge {} has no view in this snapshot, skipping", curve.edge);
                continue;
            };
            let color = match frame.selection {
                Some(selection) if selection.is_hovered(ElementRef::edge(edge.index)) => {
                    render.hover_color
                }
                Some(selection) if selection.is_edge_highlighted(edge.index) => {
                    render.selected_color
                }
                None if edge.selected => render.selected_color,
                _ => edge.color,
            };
            backend.draw_polyline(&curve.points, color, false);
        }
        Ok(())
    }
}

/// Rubber-band rectangle while drag-selecting.
pub struct SelectionBoxProcedure;

impl RenderProcedure for SelectionBoxProcedure {
    fn name(&self) -> &'static str {
        "selection box"
    }

    fn execute(
        &self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        if let Some(rect) = frame.selection.and_then(|s| s.drag_rect) {
            backend.draw_screen_rect(rect, frame.settings.render.selection_box_color);
        }
        Ok(())
    }
}

/// Node labels, anchored above the node and clipped to the viewport.
pub struct LabelsProcedure;

impl RenderProcedure for LabelsProcedure {
    fn name(&self) -> &'static str {
        "labels"
    }

    fn execute(
        &self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        let render = &frame.settings.render;
        let lift = frame.settings.picking.node_radius * render.label_offset;
        let up = frame.camera.up();
        let znear = frame.projector.projection().znear;
        for node in frame.scene.nodes().iter().filter(|node| node.visible) {
            let Some(label) = node.label.as_deref() else {
                continue;
            };
            let anchor: Vector3<f32> = frame.scene.world_position(node) + up * lift;
            let Some(screen) = frame.projector.project(anchor) else {
                continue;
            };
            if screen.depth < znear || !frame.viewport.contains(screen.position) {
                continue;
            }
            backend.draw_label(screen.position, label, render.label_color);
        }
        Ok(())
    }
}

/// Turns on the view's positional light for this frame.
pub struct LightingProcedure;

impl RenderProcedure for LightingProcedure {
    fn name(&self) -> &'static str {
        "lighting"
    }

    fn execute(
        &self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        backend.set_lighting(Some(frame.light));
        Ok(())
    }
}

/// Outline of the linked primary view's frustum at its target depth.
pub struct FrustumOverlayProcedure;

impl RenderProcedure for FrustumOverlayProcedure {
    fn name(&self) -> &'static str {
        "frustum overlay"
    }

    fn execute(
        &self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        if let Some(footprint) = frame.partner_footprint {
            backend.draw_polyline(&footprint.corners, frame.settings.render.frustum_color, true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::{OrbitCamera, Projection, ScreenProjector, Viewport};
    use crate::gfx::geometry::EdgeCurve;
    use crate::gfx::picking::ScreenRect;
    use crate::gfx::rendering::backend::{DrawCommand, RecordingBackend};
    use crate::gfx::rendering::pipeline::GraphicsConfiguration;
    use crate::scene::{GraphScene, SceneModel};
    use crate::selection::SelectionState;
    use crate::settings::ViewerSettings;
    use cgmath::Point2;

    struct Fixture {
        settings: ViewerSettings,
        camera: OrbitCamera,
        projector: ScreenProjector,
        viewport: Viewport,
    }

    impl Fixture {
        fn new() -> Self {
            let settings = ViewerSettings::default();
            let camera = OrbitCamera::from_settings(&settings.camera);
            let viewport = Viewport::new(400.0, 300.0);
            let projection = Projection::from_settings(&settings.camera, viewport);
            let projector = ScreenProjector::new(&camera, &projection, viewport);
            Self {
                settings,
                camera,
                projector,
                viewport,
            }
        }
    }

    fn labeled_scene() -> GraphScene {
        let mut scene = GraphScene::new().with_distance_scale(1.0);
        let a = scene.add_labeled_node(Vector3::new(-0.5, 0.0, 0.0), "alpha");
        let b = scene.add_node(Vector3::new(0.5, 0.0, 0.0));
        scene.add_edge(a, b);
        scene
    }

    #[test]
    fn test_main_configuration_draws_in_order() {
        let fixture = Fixture::new();
        let scene = labeled_scene();
        let snapshot = scene.snapshot();
        let mut config = GraphicsConfiguration::main(&fixture.settings);
        let mut backend = RecordingBackend::new();
        config
            .initialize(
                &SceneContext {
                    settings: &fixture.settings,
                },
                &mut backend,
            )
            .unwrap();

        let curves = config.picker().unwrap().edge_curves(&snapshot);
        let selection = SelectionState {
            drag_rect: Some(ScreenRect::from_corners(
                Point2::new(1.0, 1.0),
                Point2::new(50.0, 40.0),
            )),
            drag_select_mode: true,
            ..Default::default()
        };
        let frame = FrameContext {
            frame: 1,
            viewport: fixture.viewport,
            elapsed: 0.0,
            scene: &snapshot,
            camera: &fixture.camera,
            projector: &fixture.projector,
            selection: Some(&selection),
            edges: &curves,
            partner_footprint: None,
            light: &fixture.settings.light,
            settings: &fixture.settings,
        };

        backend.begin_frame(fixture.viewport).unwrap();
        config.execute(&frame, &mut backend).unwrap();
        backend.end_frame().unwrap();

        let kinds: Vec<&str> = backend
            .last_frame()
            .iter()
            .map(|c| match c {
                DrawCommand::BeginFrame(_) => "begin",
                DrawCommand::Clear(_) => "clear",
                DrawCommand::SetCamera(_) => "camera",
                DrawCommand::DrawMesh { .. } => "mesh",
                DrawCommand::Polyline { .. } => "line",
                DrawCommand::ScreenRect { .. } => "rect",
                DrawCommand::Label { .. } => "label",
                DrawCommand::SetLighting(_) => "light",
                DrawCommand::EndFrame => "end",
                DrawCommand::CompileMesh { .. } => "compile",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["begin", "clear", "camera", "mesh", "mesh", "line", "rect", "label", "light", "end"]
        );
        assert_eq!(backend.last_frame_labels(), vec!["alpha"]);
    }

    #[test]
    fn test_selected_node_is_scaled_and_recolored() {
        let fixture = Fixture::new();
        let mut scene = labeled_scene();
        scene.set_selected(ElementRef::node(1), true);
        let snapshot = scene.snapshot();
        let mut backend = RecordingBackend::new();
        let mut nodes = DrawNodesProcedure::default();
        nodes
            .initialize(
                &SceneContext {
                    settings: &fixture.settings,
                },
                &mut backend,
            )
            .unwrap();

        let frame = FrameContext {
            frame: 1,
            viewport: fixture.viewport,
            elapsed: 0.0,
            scene: &snapshot,
            camera: &fixture.camera,
            projector: &fixture.projector,
            selection: None,
            edges: &[],
            partner_footprint: None,
            light: &fixture.settings.light,
            settings: &fixture.settings,
        };
        backend.begin_frame(fixture.viewport).unwrap();
        nodes.execute(&frame, &mut backend).unwrap();

        let draws: Vec<(f32, Rgba)> = backend
            .last_frame()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::DrawMesh {
                    transform, color, ..
                } => Some((transform.x.x, *color)),
                _ => None,
            })
            .collect();
        let render = &fixture.settings.render;
        let radius = fixture.settings.picking.node_radius;
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].1, snapshot.node(0).unwrap().color);
        assert!((draws[0].0 - radius).abs() < 1e-6);
        assert_eq!(draws[1].1, render.selected_color);
        assert!((draws[1].0 - radius * render.selected_scale).abs() < 1e-6);
    }

    #[test]
    fn test_hovered_selected_node_keeps_its_size() {
        let fixture = Fixture::new();
        let snapshot = labeled_scene().snapshot();
        let mut selection = SelectionState {
            hover: Some(ElementRef::node(1)),
            ..Default::default()
        };
        selection.selected_nodes.insert(1);
        let frame = FrameContext {
            frame: 1,
            viewport: fixture.viewport,
            elapsed: 0.0,
            scene: &snapshot,
            camera: &fixture.camera,
            projector: &fixture.projector,
            selection: Some(&selection),
            edges: &[],
            partner_footprint: None,
            light: &fixture.settings.light,
            settings: &fixture.settings,
        };
        let node = snapshot.node(1).unwrap();
        let render = &fixture.settings.render;
        assert_eq!(
            DrawNodesProcedure::appearance(&frame, node),
            (render.hover_color, render.selected_scale)
        );
    }

    #[test]
    fn test_edge_curve_without_view_is_skipped() {
        let fixture = Fixture::new();
        let snapshot = labeled_scene().snapshot();
        let edges = [
            EdgeCurve {
                edge: 7,
                points: vec![Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, -1.0, 0.0)],
            },
            EdgeCurve {
                edge: 0,
                points: vec![Vector3::new(-0.5, 0.0, 0.0), Vector3::new(0.5, 0.0, 0.0)],
            },
        ];
        let frame = FrameContext {
            frame: 1,
            viewport: fixture.viewport,
            elapsed: 0.0,
            scene: &snapshot,
            camera: &fixture.camera,
            projector: &fixture.projector,
            selection: None,
            edges: &edges,
            partner_footprint: None,
            light: &fixture.settings.light,
            settings: &fixture.settings,
        };
        let mut backend = RecordingBackend::new();
        backend.begin_frame(fixture.viewport).unwrap();
        DrawEdgesProcedure.execute(&frame, &mut backend).unwrap();

        let lines: Vec<&[Vector3<f32>]> = backend
            .last_frame()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Polyline { points, .. } => Some(points.as_slice()),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![edges[1].points.as_slice()]);
    }
}
