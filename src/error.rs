//! Error types for the render path.
//!
//! Camera, picking, selection and view-link operations never fail: data
//! inconsistencies are logged and skipped. Only the graphics backend can fail,
//! and such a failure is fatal to the frame it happens in.

use thiserror::Error;

use crate::gfx::rendering::backend::MeshHandle;

/// Unrecoverable failure of the graphics backend or of a view's frame.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to acquire the next surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("failed to create a rendering surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible graphics adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to request a graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("graphics context lost")]
    ContextLost,

    #[error("mesh {0:?} was never compiled by this backend")]
    UnknownMesh(MeshHandle),

    #[error("draw call issued outside of begin_frame/end_frame")]
    NoActiveFrame,

    #[error("label overlay failed: {0}")]
    Overlay(String),

    #[error("view has been disposed")]
    ViewDisposed,
}

impl RenderError {
    /// Whether the owning view should be torn down instead of retried next frame.
    pub fn is_fatal(&self) -> bool {
        match self {
            RenderError::Surface(wgpu::SurfaceError::OutOfMemory) => true,
            RenderError::Surface(_) => false,
            RenderError::UnknownMesh(_) | RenderError::NoActiveFrame => false,
            _ => true,
        }
    }
}
