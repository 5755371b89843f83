//! netview3d
//!
//! Interactive 3D graph viewer core built on wgpu and winit: an orbit camera,
//! screen-space picking, a selection state machine, linked primary/overview
//! views and an ordered render procedure pipeline.

pub mod app;
pub mod coordinator;
pub mod error;
pub mod gfx;
pub mod input;
pub mod scene;
pub mod selection;
pub mod settings;
pub mod view;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::NetViewApp;
pub use coordinator::{ViewRegistry, ViewRole};
pub use error::RenderError;
pub use scene::{share, GraphScene, SceneModel, SharedScene};
pub use settings::ViewerSettings;
pub use view::{FrameInfo, FrameReport, GraphView};

/// Opens a primary and an overview window over `scene` and runs until closed.
pub fn run(scene: SharedScene, settings: ViewerSettings) -> anyhow::Result<()> {
    NetViewApp::new(scene, settings)?.run()
}
