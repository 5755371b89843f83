//! # Render Pipeline
//!
//! A [`GraphicsConfiguration`] is an ordered list of [`RenderProcedure`]s plus
//! the capabilities a view needs around them: an optional picker and the
//! camera control mode. The two stock configurations differ only in what
//! they hold.
//!
//! | Main               | Overview          |
//! |--------------------|-------------------|
//! | reset              | reset             |
//! | position camera    | position camera   |
//! | draw nodes         | draw nodes        |
//! | draw edges         | draw edges        |
//! | selection box      | frustum overlay   |
//! | labels             |                   |
//! | lighting           |                   |
//!
//! Order matters: the reset clears before the camera is placed, geometry
//! needs the camera, and the overlays draw on top of geometry. Lighting is a
//! frame-level state that the backend applies when it submits, so it may sit
//! anywhere before `end_frame`.
//!
//! Procedures are initialized once per configuration, on its first frame,
//! and executed every frame with an immutable [`FrameContext`].

use crate::coordinator::FrustumFootprint;
use crate::error::RenderError;
use crate::gfx::camera::{ControlMode, OrbitCamera, ScreenProjector, Viewport};
use crate::gfx::geometry::EdgeCurve;
use crate::gfx::picking::ObjectPicker;
use crate::scene::SceneSnapshot;
use crate::selection::SelectionState;
use crate::settings::{LightConfig, ViewerSettings};

use super::backend::GraphicsBackend;
use super::procedures::{
    DrawEdgesProcedure, DrawNodesProcedure, FrustumOverlayProcedure, LabelsProcedure,
    LightingProcedure, PositionCameraProcedure, ResetProcedure, SelectionBoxProcedure,
};

/// What procedures may use while allocating backend resources.
pub struct SceneContext<'a> {
    pub settings: &'a ViewerSettings,
}

/// Everything one frame draws from. Built by the view after input, camera and
/// selection have settled; nothing in it is mutated while procedures run.
pub struct FrameContext<'a> {
    pub frame: u64,
    pub viewport: Viewport,
    /// Seconds since the host started driving frames.
    pub elapsed: f32,
    pub scene: &'a SceneSnapshot,
    pub camera: &'a OrbitCamera,
    pub projector: &'a ScreenProjector,
    /// `None` for views without selection (the overview).
    pub selection: Option<&'a SelectionState>,
    /// Edge polylines in world units, shared with picking.
    pub edges: &'a [EdgeCurve],
    /// Outline of the linked view's frustum, if any.
    pub partner_footprint: Option<&'a FrustumFootprint>,
    /// The view's light, which can move away from `settings.light`.
    pub light: &'a LightConfig,
    pub settings: &'a ViewerSettings,
}

/// One step of a frame.
pub trait RenderProcedure: Send {
    fn name(&self) -> &'static str;

    /// Allocates backend resources. Called once before the first `execute`.
    fn initialize(
        &mut self,
        _ctx: &SceneContext<'_>,
        _backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        Ok(())
    }

    fn execute(
        &self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError>;
}

pub struct GraphicsConfiguration {
    name: &'static str,
    procedures: Vec<Box<dyn RenderProcedure>>,
    picker: Option<ObjectPicker>,
    control_mode: ControlMode,
    initialized: bool,
}

impl GraphicsConfiguration {
    pub fn new(name: &'static str, control_mode: ControlMode) -> Self {
        Self {
            name,
            procedures: Vec::new(),
            picker: None,
            control_mode,
            initialized: false,
        }
    }

    /// Full interactive pipeline with picking and labels.
    pub fn main(settings: &ViewerSettings) -> Self {
        Self::new("Main", ControlMode::Full)
            .with_picker(ObjectPicker::new(&settings.picking, &settings.render))
            .with_procedure(ResetProcedure)
            .with_procedure(PositionCameraProcedure)
            .with_procedure(DrawNodesProcedure::default())
            .with_procedure(DrawEdgesProcedure)
            .with_procedure(SelectionBoxProcedure)
            .with_procedure(LabelsProcedure)
            .with_procedure(LightingProcedure)
    }

    /// Reduced pipeline drawing the partner's frustum instead of overlays.
    pub fn overview(_settings: &ViewerSettings) -> Self {
        Self::new("Overview", ControlMode::ZoomOnly)
            .with_procedure(ResetProcedure)
            .with_procedure(PositionCameraProcedure)
            .with_procedure(DrawNodesProcedure::default())
            .with_procedure(DrawEdgesProcedure)
            .with_procedure(FrustumOverlayProcedure)
    }

    pub fn with_picker(mut self, picker: ObjectPicker) -> Self {
        self.picker = Some(picker);
        self
    }

    pub fn with_procedure(mut self, procedure: impl RenderProcedure + 'static) -> Self {
        self.procedures.push(Box::new(procedure));
        self.initialized = false;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn picker(&self) -> Option<&ObjectPicker> {
        self.picker.as_ref()
    }

    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn procedure_names(&self) -> Vec<&'static str> {
        self.procedures.iter().map(|p| p.name()).collect()
    }

    /// Initializes every procedure in order. Does nothing once it has succeeded.
    pub fn initialize(
        &mut self,
        ctx: &SceneContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        if self.initialized {
            return Ok(());
        }
        for procedure in &mut self.procedures {
            log::trace!("{}: initializing {}", self.name, procedure.name());
            procedure.initialize(ctx, backend)?;
        }
        self.initialized = true;
        log::debug!(
            "{} configuration ready: {}",
            self.name,
            self.procedure_names().join(", ")
        );
        Ok(())
    }

    /// Forces `initialize` to run again, e.g. after a backend lost its meshes.
    pub fn invalidate(&mut self) {
        self.initialized = false;
    }

    /// Runs every procedure in order, stopping at the first failure.
    pub fn execute(
        &self,
        frame: &FrameContext<'_>,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<(), RenderError> {
        for procedure in &self.procedures {
            procedure.execute(frame, backend).inspect_err(|e| {
                log::error!("{}: {} failed: {}", self.name, procedure.name(), e);
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_configurations_order() {
        let settings = ViewerSettings::default();
        let main = GraphicsConfiguration::main(&settings);
        assert_eq!(
            main.procedure_names(),
            vec![
                "reset",
                "position camera",
                "draw nodes",
                "draw edges",
                "selection box",
                "labels",
                "lighting"
            ]
        );
        assert!(main.picker().is_some());
        assert_eq!(main.control_mode(), ControlMode::Full);

        let overview = GraphicsConfiguration::overview(&settings);
        assert_eq!(
            overview.procedure_names(),
            vec!["reset", "position camera", "draw nodes", "draw edges", "frustum overlay"]
        );
        assert!(overview.picker().is_none());
        assert_eq!(overview.control_mode(), ControlMode::ZoomOnly);
    }
}
