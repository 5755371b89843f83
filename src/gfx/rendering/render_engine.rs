//! wgpu implementation of [`GraphicsBackend`].
//!
//! Draw calls between `begin_frame` and `end_frame` are only recorded. At
//! `end_frame` the engine uploads the frame's instance and line buffers, runs
//! one depth-tested pass (meshes, then world lines, then screen lines) and
//! finishes with the label overlay pass.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use cgmath::{Matrix4, Point2, Vector3};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::error::RenderError;
use crate::gfx::camera::{CameraUniform, Viewport};
use crate::gfx::geometry::{MeshData, Vertex3D};
use crate::gfx::picking::ScreenRect;
use crate::gfx::resources::TextureResource;
use crate::gfx::ui::LabelOverlay;
use crate::settings::{LightConfig, Rgba};
use crate::wgpu_utils::UniformBuffer;

use super::backend::{GraphicsBackend, MeshHandle};
use super::pipeline_manager::{DepthConfig, PipelineConfig, PipelineManager};
use super::vertex::{push_polyline, InstanceData, LineVertex};

const SHADER: &str = "graph";
const MESH_PIPELINE: &str = "Mesh";
const LINE_PIPELINE: &str = "Lines";
const SCREEN_PIPELINE: &str = "Screen";
const LABEL_FONT_SIZE: f32 = 16.0;

/// Must match `Globals` in graph.wgsl.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    eye: [f32; 4],
    light_position: [f32; 4],
    light_terms: [f32; 4],
}

impl Globals {
    fn new(camera: CameraUniform, light: Option<&LightConfig>) -> Self {
        let (light_position, light_terms) = match light {
            Some(light) => (
                light.position,
                [light.ambient, light.diffuse, light.specular, 1.0],
            ),
            None => ([0.0; 4], [1.0, 0.0, 0.0, 0.0]),
        };
        Self {
            view_proj: camera.view_proj,
            eye: camera.view_position,
            light_position,
            light_terms,
        }
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// Everything recorded between `begin_frame` and `end_frame`.
struct FrameRecording {
    viewport: Viewport,
    clear_color: Rgba,
    camera: CameraUniform,
    light: Option<LightConfig>,
    /// Indexed by mesh handle.
    instances: Vec<Vec<InstanceData>>,
    world_lines: Vec<LineVertex>,
    screen_lines: Vec<LineVertex>,
}

impl FrameRecording {
    fn new(viewport: Viewport, meshes: usize) -> Self {
        Self {
            viewport,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            camera: CameraUniform::default(),
            light: None,
            instances: vec![Vec::new(); meshes],
            world_lines: Vec::new(),
            screen_lines: Vec::new(),
        }
    }

    /// Pixel position (origin top-left) to normalized device coordinates.
    fn to_ndc(&self, point: Point2<f32>) -> Vector3<f32> {
        let width = self.viewport.width.max(1.0);
        let height = self.viewport.height.max(1.0);
        Vector3::new(
            2.0 * point.x / width - 1.0,
            1.0 - 2.0 * point.y / height,
            0.0,
        )
    }
}

pub struct RenderEngine {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    format: wgpu::TextureFormat,
    depth_texture: TextureResource,
    pipeline_manager: PipelineManager,
    globals: UniformBuffer<Globals>,
    globals_bind_group: wgpu::BindGroup,
    meshes: Vec<GpuMesh>,
    overlay: LabelOverlay,
    frame: Option<FrameRecording>,
}

impl RenderEngine {
    /// Creates a render engine drawing into `window`.
    pub async fn new(window: Arc<Window>, width: u32, height: u32) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Graph Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or(RenderError::ContextLost)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture =
            TextureResource::create_depth_texture(&device, &config, "depth_texture");

        let globals = UniformBuffer::<Globals>::new(&device);
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals Bind Group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals.binding_resource(),
            }],
        });

        let overlay = LabelOverlay::new(&device, &queue, format, &window, LABEL_FONT_SIZE);

        let device: Arc<wgpu::Device> = device.into();
        let queue: Arc<wgpu::Queue> = queue.into();
        let mut pipeline_manager = PipelineManager::new(device.clone());
        pipeline_manager.load_shader(SHADER, include_str!("graph.wgsl"));

        let depth_format = TextureResource::DEPTH_FORMAT;
        pipeline_manager.register_pipeline(
            MESH_PIPELINE,
            PipelineConfig::default_with_shader(SHADER)
                .with_label("Graph Meshes")
                .with_entry_points("vs_mesh", "fs_mesh")
                .with_vertex_layouts(vec![
                    Vertex3D::desc(),
                    InstanceData::vertex_buffer_layout(),
                ])
                .with_bind_group_layouts(vec![globals_layout.clone()])
                .with_cull_mode(None)
                .with_depth(DepthConfig::opaque(depth_format))
                .with_color_format(format),
        );
        pipeline_manager.register_pipeline(
            LINE_PIPELINE,
            PipelineConfig::default_with_shader(SHADER)
                .with_label("Graph Lines")
                .with_entry_points("vs_line", "fs_line")
                .with_vertex_layouts(vec![LineVertex::desc()])
                .with_bind_group_layouts(vec![globals_layout.clone()])
                .with_primitive_topology(wgpu::PrimitiveTopology::LineList)
                .with_cull_mode(None)
                .with_depth(DepthConfig::overlay(depth_format))
                .with_color_format(format),
        );
        pipeline_manager.register_pipeline(
            SCREEN_PIPELINE,
            PipelineConfig::default_with_shader(SHADER)
                .with_label("Screen Lines")
                .with_entry_points("vs_screen", "fs_line")
                .with_vertex_layouts(vec![LineVertex::desc()])
                .with_bind_group_layouts(vec![globals_layout])
                .with_primitive_topology(wgpu::PrimitiveTopology::LineList)
                .with_cull_mode(None)
                .with_depth(DepthConfig::always(depth_format))
                .with_color_format(format),
        );
        if let Err(errors) = pipeline_manager.create_all_pipelines() {
            log::error!("{} pipelines failed: {}", errors.len(), errors.join("; "));
        }

        Ok(RenderEngine {
            window,
            surface,
            device,
            queue,
            config,
            format,
            depth_texture,
            pipeline_manager,
            globals,
            globals_bind_group,
            meshes: Vec::new(),
            overlay,
            frame: None,
        })
    }

    /// Resizes the surface and recreates the depth buffer. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            TextureResource::create_depth_texture(&self.device, &self.config, "depth_texture");
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    fn recording(&mut self) -> Option<&mut FrameRecording> {
        let frame = self.frame.as_mut();
        if frame.is_none() {
            log::warn!("Draw call outside of a frame ignored");
        }
        frame
    }

    fn acquire(&mut self) -> Result<wgpu::SurfaceTexture, RenderError> {
        match self.surface.get_current_texture() {
            Ok(texture) => Ok(texture),
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("Surface {e}, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn encode_scene(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        frame: &FrameRecording,
    ) {
        let instance_buffers: Vec<(&GpuMesh, wgpu::Buffer, u32)> = frame
            .instances
            .iter()
            .zip(&self.meshes)
            .filter(|(instances, _)| !instances.is_empty())
            .map(|(instances, mesh)| {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Instance Buffer"),
                        contents: bytemuck::cast_slice(instances),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                (mesh, buffer, instances.len() as u32)
            })
            .collect();
        let world_lines = self.line_buffer(&frame.world_lines, "World Lines");
        let screen_lines = self.line_buffer(&frame.screen_lines, "Screen Lines");

        let [r, g, b, a] = frame.clear_color;
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Graph Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: a as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_bind_group(0, &self.globals_bind_group, &[]);

        if let Some(pipeline) = self.pipeline_manager.get_pipeline(MESH_PIPELINE) {
            render_pass.set_pipeline(pipeline);
            for (mesh, instances, count) in &instance_buffers {
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, instances.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..*count);
            }
        }

        for (name, lines) in [(LINE_PIPELINE, &world_lines), (SCREEN_PIPELINE, &screen_lines)] {
            let (Some(pipeline), Some((buffer, count))) =
                (self.pipeline_manager.get_pipeline(name), lines)
            else {
                continue;
            };
            render_pass.set_pipeline(pipeline);
            render_pass.set_vertex_buffer(0, buffer.slice(..));
            render_pass.draw(0..*count, 0..1);
        }
    }

    fn line_buffer(&self, vertices: &[LineVertex], label: &str) -> Option<(wgpu::Buffer, u32)> {
        if vertices.is_empty() {
            return None;
        }
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        Some((buffer, vertices.len() as u32))
    }
}

impl GraphicsBackend for RenderEngine {
    fn begin_frame(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        if self.frame.is_some() {
            log::warn!("begin_frame called twice, dropping the unfinished frame");
        }
        let (width, height) = (viewport.width as u32, viewport.height as u32);
        if (width, height) != self.surface_size() {
            self.resize(width, height);
        }
        self.frame = Some(FrameRecording::new(viewport, self.meshes.len()));
        Ok(())
    }

    fn clear(&mut self, color: Rgba) {
        if let Some(frame) = self.recording() {
            frame.clear_color = color;
        }
    }

    fn set_camera(&mut self, camera: CameraUniform) {
        if let Some(frame) = self.recording() {
            frame.camera = camera;
        }
    }

    fn set_lighting(&mut self, light: Option<&LightConfig>) {
        if let Some(frame) = self.recording() {
            frame.light = light.copied();
        }
    }

    fn compile_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, RenderError> {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Vertex Buffer", mesh.label)),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Index Buffer", mesh.label)),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let handle = MeshHandle(self.meshes.len() as u32);
        self.meshes.push(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        });
        if let Some(frame) = self.frame.as_mut() {
            frame.instances.push(Vec::new());
        }
        log::debug!(
            "Compiled mesh '{}' as {:?} ({} triangles)",
            mesh.label,
            handle,
            mesh.triangle_count()
        );
        Ok(handle)
    }

    fn draw_mesh(
        &mut self,
        mesh: MeshHandle,
        transform: Matrix4<f32>,
        color: Rgba,
    ) -> Result<(), RenderError> {
        let frame = self.frame.as_mut().ok_or(RenderError::NoActiveFrame)?;
        let instances = frame
            .instances
            .get_mut(mesh.0 as usize)
            .ok_or(RenderError::UnknownMesh(mesh))?;
        instances.push(InstanceData::new(transform, color));
        Ok(())
    }

    fn draw_polyline(&mut self, points: &[Vector3<f32>], color: Rgba, closed: bool) {
        if let Some(frame) = self.recording() {
            push_polyline(&mut frame.world_lines, points, color, closed);
        }
    }

    fn draw_screen_rect(&mut self, rect: ScreenRect, color: Rgba) {
        if let Some(frame) = self.recording() {
            let corners = rect.corners().map(|corner| frame.to_ndc(corner));
            push_polyline(&mut frame.screen_lines, &corners, color, true);
        }
    }

    fn draw_label(&mut self, position: Point2<f32>, text: &str, color: Rgba) {
        if self.frame.is_none() {
            log::warn!("Label '{}' outside of a frame ignored", text);
            return;
        }
        self.overlay.queue([position.x, position.y], text, color);
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        let frame = self.frame.take().ok_or(RenderError::NoActiveFrame)?;
        let surface_texture = match self.acquire() {
            Ok(texture) => texture,
            Err(e) => {
                self.overlay.clear();
                return Err(e);
            }
        };
        let target = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.globals
            .update_content(&self.queue, Globals::new(frame.camera, frame.light.as_ref()));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Graph Encoder"),
            });
        self.encode_scene(&mut encoder, &target, &frame);
        let overlay = self
            .overlay
            .render(&self.device, &self.queue, &mut encoder, &self.window, &target);

        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        surface_texture.present();
        overlay
    }
}
