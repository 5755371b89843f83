//! # Graph View
//!
//! One rendered view of a shared scene: the per-frame driver that ties input,
//! camera, picking, selection, view linking and the render pipeline together.
//!
//! A primary view runs the `Main` configuration with picking and selection.
//! An overview runs the `Overview` configuration: zoom only, no selection, and
//! it draws the footprint of its linked primary. Pressing or dragging the
//! primary button in the overview asks the primary to re-center on that spot.
//!
//! ## Frame order
//!
//! 1. capture the input snapshot and copy the scene
//! 2. link with a partner, apply recenter requests and the scene's camera origin
//! 3. move the camera (or, with Ctrl held, the light) from input
//! 4. pick against the camera this frame renders with, then resolve selection
//! 5. publish the camera for the partner and render
//!
//! Nothing a frame reads changes while its procedures execute.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use cgmath::{Point2, Vector3};

use crate::coordinator::{
    frustum_footprint, PublishedView, SharedPublishedView, ViewId, ViewRegistry, ViewRole,
};
use crate::error::RenderError;
use crate::gfx::camera::{
    drag_light, CameraController, OrbitCamera, Projection, ScreenProjector, Viewport,
};
use crate::gfx::geometry::{edge_curves, EdgeCurve, EdgeStyle};
use crate::gfx::picking::{ObjectPicker, PickBuffer};
use crate::gfx::rendering::{
    FrameContext, GraphicsBackend, GraphicsConfiguration, SceneContext,
};
use crate::input::{InputAggregator, InputSink, InputSnapshot, MouseButton};
use crate::scene::{ElementRef, SceneId, SceneModel, SceneSnapshot, SharedScene};
use crate::selection::{FramePicks, PickRequest, SelectionController, SelectionPhase, SelectionState};
use crate::settings::{LightConfig, ViewerSettings};

/// What the host knows about the frame it is asking for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Drawable size in physical pixels.
    pub viewport: Viewport,
    /// Seconds since the host started driving frames.
    pub elapsed: f32,
}

/// Summary of one drawn frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub hover: Option<ElementRef>,
    pub selected_nodes: usize,
    pub selected_edges: usize,
    /// Hits of the last picking query this frame ran.
    pub pick_hits: usize,
    pub linked: bool,
}

pub struct GraphView {
    id: ViewId,
    role: ViewRole,
    scene: SharedScene,
    scene_id: SceneId,
    registry: Arc<ViewRegistry>,
    settings: ViewerSettings,
    config: GraphicsConfiguration,
    input: InputAggregator,
    controller: CameraController,
    camera: OrbitCamera,
    projection: Projection,
    selection: Option<SelectionController>,
    pick_buffer: PickBuffer,
    published: SharedPublishedView,
    frame: u64,
    camera_origin: Option<Vector3<f32>>,
    light: LightConfig,
    fitted: bool,
    disposed: bool,
}

impl GraphView {
    /// Interactive view with picking, selection and labels.
    pub fn primary(scene: SharedScene, registry: Arc<ViewRegistry>, settings: ViewerSettings) -> Self {
        let config = GraphicsConfiguration::main(&settings);
        let selection = SelectionController::new(settings.selection);
        Self::new(ViewRole::Primary, scene, registry, settings, config, Some(selection))
    }

    /// Zoom-only view that outlines what its linked primary sees.
    pub fn overview(scene: SharedScene, registry: Arc<ViewRegistry>, settings: ViewerSettings) -> Self {
        let config = GraphicsConfiguration::overview(&settings);
        Self::new(ViewRole::Overview, scene, registry, settings, config, None)
    }

    fn new(
        role: ViewRole,
        scene: SharedScene,
        registry: Arc<ViewRegistry>,
        settings: ViewerSettings,
        config: GraphicsConfiguration,
        selection: Option<SelectionController>,
    ) -> Self {
        let scene_id = scene.read().unwrap_or_else(PoisonError::into_inner).scene_id();
        let camera = OrbitCamera::from_settings(&settings.camera);
        let viewport = Viewport::new(1.0, 1.0);
        let projection = Projection::from_settings(&settings.camera, viewport);
        let published = Arc::new(RwLock::new(PublishedView {
            camera,
            projection,
            viewport,
            frame: 0,
        }));
        let id = registry.register_view(scene_id, role, &published);

        Self {
            id,
            role,
            scene,
            scene_id,
            registry,
            controller: CameraController::new(&settings.camera),
            light: settings.light,
            settings,
            config,
            input: InputAggregator::new(),
            camera,
            projection,
            selection,
            pick_buffer: PickBuffer::default(),
            published,
            frame: 0,
            camera_origin: None,
            fitted: false,
            disposed: false,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn role(&self) -> ViewRole {
        self.role
    }

    pub fn scene_id(&self) -> SceneId {
        self.scene_id
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    /// Direct camera access for hosts; the change shows on the next frame.
    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    /// `None` for an overview.
    pub fn selection(&self) -> Option<&SelectionState> {
        self.selection.as_ref().map(SelectionController::state)
    }

    pub fn selection_phase(&self) -> Option<SelectionPhase> {
        self.selection.as_ref().map(SelectionController::phase)
    }

    /// Where this view's light currently is. Starts at `settings.light`.
    pub fn light(&self) -> &LightConfig {
        &self.light
    }

    pub fn config(&self) -> &GraphicsConfiguration {
        &self.config
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    /// Frames drawn so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Partner view, if currently linked.
    pub fn partner(&self) -> Option<ViewId> {
        self.registry.partner(self.id)
    }

    /// Thread-safe handle the host's event thread feeds.
    pub fn input_sink(&self) -> InputSink {
        self.input.sink()
    }

    /// Draws one frame.
    ///
    /// Backend failures abort the frame and are returned; the view stays
    /// usable and the next call starts a fresh frame.
    pub fn draw(
        &mut self,
        info: &FrameInfo,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<FrameReport, RenderError> {
        if self.disposed {
            return Err(RenderError::ViewDisposed);
        }
        self.frame += 1;

        let input = self.input.capture();
        let snapshot = self.read_scene().snapshot();
        self.projection.resize(info.viewport);

        self.config.initialize(
            &SceneContext {
                settings: &self.settings,
            },
            backend,
        )?;
        if !self.fitted {
            self.fit_in_view(&snapshot);
            self.fitted = true;
        }

        let partner = self.registry.find_link_partner(self.id);
        if let Some(target) = self.registry.take_recenter(self.id) {
            log::debug!("View {} re-centered on {:?}", self.id, target);
            self.camera.set_target(target);
        }
        if self.role == ViewRole::Primary {
            self.sync_camera_origin(&snapshot);
        }
        if let Some(selection) = self.selection.as_mut() {
            selection.sync_from_scene(&snapshot);
        }

        let requests = self
            .controller
            .apply(&input, &mut self.camera, self.config.control_mode());
        if requests.fit_in_view {
            self.fit_in_view(&snapshot);
        }

        let projector = ScreenProjector::new(&self.camera, &self.projection, info.viewport);
        if requests.move_light {
            drag_light(&mut self.light, &input, &projector);
        }
        let edges = match self.config.picker() {
            Some(picker) => picker.edge_curves(&snapshot),
            None => edge_curves(
                &snapshot,
                &EdgeStyle::new(&self.settings.picking, &self.settings.render),
            ),
        };

        match self.role {
            ViewRole::Primary => self.update_selection(&input, &projector, &snapshot, &edges),
            ViewRole::Overview => self.request_partner_recenter(&input, &projector),
        }

        self.publish(info.viewport);
        let footprint = match self.role {
            ViewRole::Overview => self
                .registry
                .partner_view(self.id)
                .and_then(|view| frustum_footprint(&view)),
            ViewRole::Primary => None,
        };

        let result = {
            let frame = FrameContext {
                frame: self.frame,
                viewport: info.viewport,
                elapsed: info.elapsed,
                scene: &snapshot,
                camera: &self.camera,
                projector: &projector,
                selection: self.selection.as_ref().map(SelectionController::state),
                edges: &edges,
                partner_footprint: footprint.as_ref(),
                light: &self.light,
                settings: &self.settings,
            };
            backend
                .begin_frame(info.viewport)
                .and_then(|()| self.config.execute(&frame, backend))
                .and_then(|()| backend.end_frame())
        };
        if let Err(e) = result {
            if matches!(e, RenderError::UnknownMesh(_)) {
                self.config.invalidate();
            }
            log::error!("View {} frame {} failed: {}", self.id, self.frame, e);
            return Err(e);
        }

        let selection = self.selection();
        let report = FrameReport {
            frame: self.frame,
            hover: selection.and_then(|s| s.hover),
            selected_nodes: selection.map_or(0, |s| s.selected_nodes.len()),
            selected_edges: selection.map_or(0, |s| s.selected_edges.len()),
            pick_hits: self.pick_buffer.len(),
            linked: partner.is_some(),
        };
        log::trace!("View {}: {:?}", self.id, report);
        Ok(report)
    }

    /// Detaches input and leaves the registry. The partner stops drawing the
    /// footprint on its next frame. Calling it again does nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.input.detach();
        self.registry.unregister_view(self.id);
        log::debug!("Disposed {:?} view {}", self.role, self.id);
    }

    fn read_scene(&self) -> RwLockReadGuard<'_, dyn SceneModel + 'static> {
        self.scene.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn fit_in_view(&mut self, snapshot: &SceneSnapshot) {
        let Some((center, radius)) = snapshot.bounding_sphere() else {
            return;
        };
        let radius = radius * self.settings.camera.fit_margin + self.settings.picking.node_radius;
        self.camera.fit_to(center, radius, self.settings.camera.fovy);
        log::debug!(
            "View {} fit to {:?}, distance {}",
            self.id,
            center,
            self.camera.distance()
        );
    }

    /// Follows the scene's camera origin when it moves; user navigation in
    /// between is kept.
    fn sync_camera_origin(&mut self, snapshot: &SceneSnapshot) {
        let origin = snapshot.world_camera_origin();
        if origin == self.camera_origin {
            return;
        }
        self.camera_origin = origin;
        if let Some(origin) = origin {
            self.camera.set_target(origin);
        }
    }

    fn update_selection(
        &mut self,
        input: &InputSnapshot,
        projector: &ScreenProjector,
        snapshot: &SceneSnapshot,
        edges: &[EdgeCurve],
    ) {
        let (Some(selection), Some(picker)) = (self.selection.as_mut(), self.config.picker()) else {
            return;
        };
        let request = selection.plan(input);
        let picks = run_picks(
            picker,
            &request,
            projector,
            snapshot,
            edges,
            &mut self.pick_buffer,
        );
        let mut scene = self.scene.write().unwrap_or_else(PoisonError::into_inner);
        selection.resolve(&request, &picks, &mut *scene);
    }

    fn request_partner_recenter(&mut self, input: &InputSnapshot, projector: &ScreenProjector) {
        const BUTTON: MouseButton = MouseButton::Left;
        let dragging = input.is_button_down(BUTTON) && input.pointer_moved();
        if !input.was_button_pressed(BUTTON) && !dragging {
            return;
        }
        let Some(pointer) = input.pointer else {
            return;
        };
        let Some(partner) = self.registry.partner_view(self.id) else {
            return;
        };
        // Keep the partner's target on the plane it is already in.
        let depth = projector.depth_of(partner.camera.target());
        if depth <= 0.0 {
            return;
        }
        if let Some(target) = projector.unproject(pointer, depth) {
            self.registry.request_recenter(self.id, target);
        }
    }

    fn publish(&self, viewport: Viewport) {
        let mut published = self.published.write().unwrap_or_else(PoisonError::into_inner);
        *published = PublishedView {
            camera: self.camera,
            projection: self.projection,
            viewport,
            frame: self.frame,
        };
    }
}

impl Drop for GraphView {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn run_picks(
    picker: &ObjectPicker,
    request: &PickRequest,
    projector: &ScreenProjector,
    snapshot: &SceneSnapshot,
    edges: &[EdgeCurve],
    buffer: &mut PickBuffer,
) -> FramePicks {
    let mut picks = FramePicks::default();
    let point = |position: Option<Point2<f32>>, buffer: &mut PickBuffer| {
        position.and_then(|p| picker.pick_point(p, projector, snapshot, edges, buffer))
    };
    picks.hover = point(request.hover, buffer);
    picks.click = point(request.click, buffer);
    picks.rect = request
        .rect
        .map(|rect| picker.pick_rect(rect, projector, snapshot, edges, buffer));
    picks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::rendering::RecordingBackend;
    use crate::input::InputEvent;
    use crate::scene::{share, GraphScene};

    fn info() -> FrameInfo {
        FrameInfo {
            viewport: Viewport::new(640.0, 480.0),
            elapsed: 0.0,
        }
    }

    fn scene() -> SharedScene {
        let mut scene = GraphScene::new().with_distance_scale(1.0);
        let a = scene.add_node(Vector3::new(-1.0, 0.0, 0.0));
        let b = scene.add_node(Vector3::new(1.0, 0.0, 0.0));
        scene.add_edge(a, b);
        share(scene)
    }

    #[test]
    fn test_first_frame_fits_graph() {
        let registry = Arc::new(ViewRegistry::new());
        let mut view = GraphView::primary(scene(), registry, ViewerSettings::default());
        let mut backend = RecordingBackend::new();
        let report = view.draw(&info(), &mut backend).unwrap();

        assert_eq!(report.frame, 1);
        assert!(!report.linked);
        assert!(view.config().is_initialized());
        assert!(view.camera().target().x.abs() < 1e-4);
        assert_eq!(backend.last_frame_mesh_draws(), 2);
    }

    #[test]
    fn test_disposed_view_refuses_to_draw() {
        let registry = Arc::new(ViewRegistry::new());
        let mut view = GraphView::overview(scene(), registry.clone(), ViewerSettings::default());
        let sink = view.input_sink();
        view.dispose();
        view.dispose();

        assert!(registry.views(view.scene_id()).is_empty());
        assert!(!sink.is_attached());
        let mut backend = RecordingBackend::new();
        assert!(matches!(
            view.draw(&info(), &mut backend),
            Err(RenderError::ViewDisposed)
        ));
    }

    #[test]
    fn test_lost_context_fails_frame_only() {
        let registry = Arc::new(ViewRegistry::new());
        let mut view = GraphView::primary(scene(), registry, ViewerSettings::default());
        let mut backend = RecordingBackend {
            lose_context: true,
            ..Default::default()
        };
        assert!(matches!(
            view.draw(&info(), &mut backend),
            Err(RenderError::ContextLost)
        ));
        assert!(view.draw(&info(), &mut backend).is_ok());
    }

    #[test]
    fn test_ctrl_secondary_drag_moves_light_and_keeps_camera() {
        use crate::gfx::rendering::DrawCommand;
        use winit::keyboard::KeyCode;

        let settings = ViewerSettings::default().with_light(LightConfig {
            position: [0.0, 0.0, -3.0, 1.0],
            ..LightConfig::default()
        });
        let registry = Arc::new(ViewRegistry::new());
        let mut view = GraphView::primary(scene(), registry, settings);
        let mut backend = RecordingBackend::new();
        view.draw(&info(), &mut backend).unwrap();
        let eye = view.camera().eye();

        let sink = view.input_sink();
        sink.push(InputEvent::KeyPressed(KeyCode::ControlLeft));
        sink.push(InputEvent::PointerMoved { x: 320.0, y: 240.0 });
        sink.push(InputEvent::ButtonPressed(MouseButton::Right));
        sink.push(InputEvent::PointerMoved { x: 360.0, y: 240.0 });
        view.draw(&info(), &mut backend).unwrap();

        assert_eq!(view.camera().eye(), eye);
        let [x, y, z, w] = view.light().position;
        assert!(x > 0.1);
        assert!(y.abs() < 1e-3);
        assert!((z + 3.0).abs() < 1e-3);
        assert_eq!(w, 1.0);
        let lit = backend.last_frame().iter().find_map(|c| match c {
            DrawCommand::SetLighting(light) => *light,
            _ => None,
        });
        assert_eq!(lit, Some(*view.light()));
        assert_eq!(view.settings().light.position, [0.0, 0.0, -3.0, 1.0]);
    }

    #[test]
    fn test_overview_ignores_orbit_input() {
        let registry = Arc::new(ViewRegistry::new());
        let mut view = GraphView::overview(scene(), registry, ViewerSettings::default());
        let mut backend = RecordingBackend::new();
        view.draw(&info(), &mut backend).unwrap();
        let before = *view.camera();

        let sink = view.input_sink();
        sink.push(InputEvent::KeyPressed(winit::keyboard::KeyCode::KeyW));
        view.draw(&info(), &mut backend).unwrap();
        assert_eq!(view.camera().eye(), before.eye());
    }
}
