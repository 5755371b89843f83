//! # Graphics Backend
//!
//! The drawing surface render procedures talk to. A backend is driven once per
//! frame as
//!
//! ```text
//! begin_frame → clear / set_camera / set_lighting / draw_* … → end_frame
//! ```
//!
//! Meshes are compiled once (from a procedure's `initialize`) and drawn by
//! handle afterwards. World-space draws use the camera set for the frame;
//! screen rectangles and labels are in pixels with the origin at the top-left.
//!
//! [`RenderEngine`](super::render_engine::RenderEngine) is the wgpu backend.
//! [`RecordingBackend`] keeps every call as a [`DrawCommand`] and is what
//! headless hosts and tests use.

use cgmath::{Matrix4, Point2, Vector3};

use crate::error::RenderError;
use crate::gfx::camera::{CameraUniform, Viewport};
use crate::gfx::geometry::MeshData;
use crate::gfx::picking::ScreenRect;
use crate::settings::{LightConfig, Rgba};

/// Handle to a mesh compiled by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

pub trait GraphicsBackend {
    /// Starts a frame for a viewport. Lighting is off until set.
    fn begin_frame(&mut self, viewport: Viewport) -> Result<(), RenderError>;

    fn clear(&mut self, color: Rgba);

    fn set_camera(&mut self, camera: CameraUniform);

    /// Enables lighting for lit meshes this frame, or turns it off.
    fn set_lighting(&mut self, light: Option<&LightConfig>);

    fn compile_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, RenderError>;

    fn draw_mesh(
        &mut self,
        mesh: MeshHandle,
        transform: Matrix4<f32>,
        color: Rgba,
    ) -> Result<(), RenderError>;

    fn draw_polyline(&mut self, points: &[Vector3<f32>], color: Rgba, closed: bool);

    fn draw_screen_rect(&mut self, rect: ScreenRect, color: Rgba);

    fn draw_label(&mut self, position: Point2<f32>, text: &str, color: Rgba);

    /// Submits the frame.
    fn end_frame(&mut self) -> Result<(), RenderError>;
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    BeginFrame(Viewport),
    Clear(Rgba),
    SetCamera(CameraUniform),
    SetLighting(Option<LightConfig>),
    CompileMesh {
        handle: MeshHandle,
        triangles: usize,
    },
    DrawMesh {
        mesh: MeshHandle,
        transform: Matrix4<f32>,
        color: Rgba,
    },
    Polyline {
        points: Vec<Vector3<f32>>,
        color: Rgba,
        closed: bool,
    },
    ScreenRect {
        rect: ScreenRect,
        color: Rgba,
    },
    Label {
        position: Point2<f32>,
        text: String,
        color: Rgba,
    },
    EndFrame,
}

/// Backend that records calls instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub(crate) commands: Vec<DrawCommand>,
    pub(crate) meshes: Vec<usize>,
    pub(crate) in_frame: bool,
    pub(crate) frames: u64,
    /// Makes the next `begin_frame` report a lost context.
    pub lose_context: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Commands of the most recent frame, from `BeginFrame` on.
    pub fn last_frame(&self) -> &[DrawCommand] {
        let start = self
            .commands
            .iter()
            .rposition(|c| matches!(c, DrawCommand::BeginFrame(_)))
            .unwrap_or(0);
        &self.commands[start..]
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Closed polylines of the last frame, i.e. frustum outlines.
    pub fn last_frame_outlines(&self) -> Vec<&[Vector3<f32>]> {
        self.last_frame()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Polyline {
                    points,
                    closed: true,
                    ..
                } => Some(points.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn last_frame_labels(&self) -> Vec<&str> {
        self.last_frame()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Label { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn last_frame_mesh_draws(&self) -> usize {
        self.last_frame()
            .iter()
            .filter(|c| matches!(c, DrawCommand::DrawMesh { .. }))
            .count()
    }

    fn record(&mut self, command: DrawCommand) {
        if !self.in_frame && !matches!(command, DrawCommand::CompileMesh { .. }) {
            log::warn!("Recorded {:?} outside of a frame", command);
        }
        self.commands.push(command);
    }
}

impl GraphicsBackend for RecordingBackend {
    fn begin_frame(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        if std::mem::take(&mut self.lose_context) {
            return Err(RenderError::ContextLost);
        }
        self.in_frame = true;
        self.record(DrawCommand::BeginFrame(viewport));
        Ok(())
    }

    fn clear(&mut self, color: Rgba) {
        self.record(DrawCommand::Clear(color));
    }

    fn set_camera(&mut self, camera: CameraUniform) {
        self.record(DrawCommand::SetCamera(camera));
    }

    fn set_lighting(&mut self, light: Option<&LightConfig>) {
        self.record(DrawCommand::SetLighting(light.copied()));
    }

    fn compile_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, RenderError> {
        let handle = MeshHandle(self.meshes.len() as u32);
        self.meshes.push(mesh.triangle_count());
        self.record(DrawCommand::CompileMesh {
            handle,
            triangles: mesh.triangle_count(),
        });
        Ok(handle)
    }

    fn draw_mesh(
        &mut self,
        mesh: MeshHandle,
        transform: Matrix4<f32>,
        color: Rgba,
    ) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::NoActiveFrame);
        }
        if mesh.0 as usize >= self.meshes.len() {
            return Err(RenderError::UnknownMesh(mesh));
        }
        self.record(DrawCommand::DrawMesh {
            mesh,
            transform,
            color,
        });
        Ok(())
    }

    fn draw_polyline(&mut self, points: &[Vector3<f32>], color: Rgba, closed: bool) {
        self.record(DrawCommand::Polyline {
            points: points.to_vec(),
            color,
            closed,
        });
    }

    fn draw_screen_rect(&mut self, rect: ScreenRect, color: Rgba) {
        self.record(DrawCommand::ScreenRect { rect, color });
    }

    fn draw_label(&mut self, position: Point2<f32>, text: &str, color: Rgba) {
        self.record(DrawCommand::Label {
            position,
            text: text.to_owned(),
            color,
        });
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::NoActiveFrame);
        }
        self.record(DrawCommand::EndFrame);
        self.in_frame = false;
        self.frames += 1;
        Ok(())
    }
}
