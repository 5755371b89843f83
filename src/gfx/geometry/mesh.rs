//! # Mesh Data
//!
//! CPU-side triangle meshes handed to a graphics backend for precompilation.

use std::f32::consts::PI;

/// A 3D vertex with position and normal data.
///
/// `#[repr(C)]` keeps the layout GPU-compatible for vertex buffer uploads.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3D {
    /// 3D position coordinates [x, y, z]
    pub position: [f32; 3],
    /// 3D normal vector [nx, ny, nz] for lighting calculations
    pub normal: [f32; 3],
}

impl Vertex3D {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    /// Returns the vertex buffer layout for wgpu rendering.
    ///
    /// - Attribute 0: Position (Float32x3)
    /// - Attribute 1: Normal (Float32x3)
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex3D>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Indexed triangle list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub label: String,
    pub vertices: Vec<Vertex3D>,
    /// Triangle indices (counter-clockwise winding)
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Generate a UV sphere of radius 1.0 centered at the origin
///
/// # Arguments
/// * `longitude_segments` - Number of vertical segments (longitude lines), at least 3
/// * `latitude_segments` - Number of horizontal segments (latitude lines), at least 2
pub fn generate_sphere(longitude_segments: u32, latitude_segments: u32) -> MeshData {
    let long_segs = longitude_segments.max(3);
    let lat_segs = latitude_segments.max(2);

    let mut mesh = MeshData {
        label: format!("sphere {}x{}", long_segs, lat_segs),
        ..Default::default()
    };

    for lat in 0..=lat_segs {
        let theta = lat as f32 * PI / lat_segs as f32; // 0 to PI
        let (sin_theta, cos_theta) = theta.sin_cos();

        for long in 0..=long_segs {
            let phi = long as f32 * 2.0 * PI / long_segs as f32; // 0 to 2*PI
            let (sin_phi, cos_phi) = phi.sin_cos();

            let point = [sin_theta * cos_phi, cos_theta, sin_theta * sin_phi];
            // Normal is same as position for unit sphere
            mesh.vertices.push(Vertex3D {
                position: point,
                normal: point,
            });
        }
    }

    for lat in 0..lat_segs {
        for long in 0..long_segs {
            let first = lat * (long_segs + 1) + long;
            let second = first + long_segs + 1;

            mesh.indices.extend_from_slice(&[first, second, first + 1]);
            mesh.indices
                .extend_from_slice(&[second, second + 1, first + 1]);
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_vertices_lie_on_unit_sphere() {
        let sphere = generate_sphere(12, 8);
        assert_eq!(sphere.vertex_count(), 13 * 9);
        assert_eq!(sphere.triangle_count(), 12 * 8 * 2);
        for v in &sphere.vertices {
            let [x, y, z] = v.position;
            assert_relative_eq!((x * x + y * y + z * z).sqrt(), 1.0, epsilon = 1e-5);
        }
        let max_index = *sphere.indices.iter().max().unwrap() as usize;
        assert!(max_index < sphere.vertex_count());
    }

    #[test]
    fn test_sphere_resolution_has_a_floor() {
        let sphere = generate_sphere(0, 0);
        assert_eq!(sphere.triangle_count(), 3 * 2 * 2);
    }
}
