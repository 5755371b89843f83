//! GPU vertex formats used by the wgpu backend besides [`Vertex3D`].
//!
//! [`Vertex3D`]: crate::gfx::geometry::Vertex3D

use bytemuck::{Pod, Zeroable};
use cgmath::{Matrix4, Vector3};

use crate::settings::Rgba;

/// Per-instance data for mesh draws
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InstanceData {
    /// Model matrix, column-major
    pub transform: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceData {
    pub fn new(transform: Matrix4<f32>, color: Rgba) -> Self {
        Self {
            transform: transform.into(),
            color,
        }
    }

    /// Get vertex buffer layout for instance data
    pub fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // Transform matrix (4 vec4s)
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 2, // After position(0) and normal(1)
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // Color (vec4)
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Colored vertex of a line list. World space for edges and outlines,
/// normalized device coordinates for screen overlays.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl LineVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4];

    pub fn new(position: Vector3<f32>, color: Rgba) -> Self {
        Self {
            position: position.into(),
            color,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Appends a polyline to a line list as segment pairs.
pub fn push_polyline(out: &mut Vec<LineVertex>, points: &[Vector3<f32>], color: Rgba, closed: bool) {
    if points.len() < 2 {
        return;
    }
    for pair in points.windows(2) {
        out.push(LineVertex::new(pair[0], color));
        out.push(LineVertex::new(pair[1], color));
    }
    if closed && points.len() > 2 {
        out.push(LineVertex::new(points[points.len() - 1], color));
        out.push(LineVertex::new(points[0], color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_polyline_adds_closing_segment() {
        let square = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        let mut open = Vec::new();
        push_polyline(&mut open, &square, [1.0; 4], false);
        assert_eq!(open.len(), 6);

        let mut closed = Vec::new();
        push_polyline(&mut closed, &square, [1.0; 4], true);
        assert_eq!(closed.len(), 8);
        assert_eq!(closed[7].position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_instance_layout_matches_struct() {
        assert_eq!(std::mem::size_of::<InstanceData>(), 80);
        let layout = InstanceData::vertex_buffer_layout();
        assert_eq!(layout.array_stride, 80);
        assert_eq!(layout.attributes.len(), 5);
    }
}
