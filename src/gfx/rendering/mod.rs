//! Frame rendering: the backend abstraction, render procedures and the
//! configurations that order them, plus the wgpu backend.

pub mod backend;
pub mod pipeline;
pub mod pipeline_manager;
pub mod procedures;
pub mod render_engine;
pub mod vertex;

pub use backend::{DrawCommand, GraphicsBackend, MeshHandle, RecordingBackend};
pub use pipeline::{FrameContext, GraphicsConfiguration, RenderProcedure, SceneContext};
pub use pipeline_manager::{DepthConfig, PipelineConfig, PipelineManager};
pub use procedures::{
    DrawEdgesProcedure, DrawNodesProcedure, FrustumOverlayProcedure, LabelsProcedure,
    LightingProcedure, PositionCameraProcedure, ResetProcedure, SelectionBoxProcedure,
};
pub use render_engine::RenderEngine;
