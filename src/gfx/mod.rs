//! # Graphics Module
//!
//! Everything between a scene snapshot and pixels:
//!
//! - **Camera** ([`camera`]) - orbit/first-person camera, projection and the
//!   input-driven controller
//! - **Geometry** ([`geometry`]) - node sphere mesh and edge polylines
//! - **Picking** ([`picking`]) - screen-space hit testing of nodes and edges
//! - **Rendering** ([`rendering`]) - backend abstraction, render procedures and
//!   the wgpu engine
//! - **Resources** ([`resources`]) - GPU textures
//! - **UI** ([`ui`]) - label overlay

pub mod camera;
pub mod geometry;
pub mod picking;
pub mod rendering;
pub mod resources;
pub mod ui;

pub use camera::OrbitCamera;
pub use rendering::RenderEngine;
