//! # Procedural Geometry
//!
//! - [`mesh`]: vertex format, indexed meshes and the node sphere
//! - [`edges`]: world-space polylines for edges, shared by rendering and picking

pub mod edges;
pub mod mesh;

pub use edges::{edge_curves, EdgeCurve, EdgeStyle};
pub use mesh::{generate_sphere, MeshData, Vertex3D};
