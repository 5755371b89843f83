//! Text overlay for node labels, drawn with imgui on top of the 3D pass.

use imgui::{Context, FontConfig, FontSource, ImColor32};
use imgui_wgpu::{Renderer, RendererConfig};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use std::time::Instant;
use wgpu::{CommandEncoder, Device, Queue, TextureFormat, TextureView};
use winit::window::Window;

use crate::error::RenderError;
use crate::settings::Rgba;

struct QueuedLabel {
    position: [f32; 2],
    text: String,
    color: Rgba,
}

pub struct LabelOverlay {
    context: Context,
    platform: WinitPlatform,
    renderer: Renderer,
    last_frame: Instant,
    queued: Vec<QueuedLabel>,
}

impl LabelOverlay {
    pub fn new(
        device: &Device,
        queue: &Queue,
        output_color_format: TextureFormat,
        window: &Window,
        font_size: f32,
    ) -> Self {
        let mut context = Context::create();
        context.set_ini_filename(None);

        // Locked at 1.0 so imgui coordinates are physical pixels, like the viewport
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(context.io_mut(), window, HiDpiMode::Locked(1.0));

        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        let renderer_config = RendererConfig {
            texture_format: output_color_format,
            ..Default::default()
        };
        let renderer = Renderer::new(&mut context, device, queue, renderer_config);
        log::debug!(
            "Label overlay created, display size {:?}",
            context.io().display_size
        );

        Self {
            context,
            platform,
            renderer,
            last_frame: Instant::now(),
            queued: Vec::new(),
        }
    }

    /// Queues a label at a pixel position for the next `render`.
    pub fn queue(&mut self, position: [f32; 2], text: &str, color: Rgba) {
        self.queued.push(QueuedLabel {
            position,
            text: text.to_owned(),
            color,
        });
    }

    pub fn clear(&mut self) {
        self.queued.clear();
    }

    /// Draws every queued label into `color_attachment` and empties the queue.
    pub fn render(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        window: &Window,
        color_attachment: &TextureView,
    ) -> Result<(), RenderError> {
        let labels = std::mem::take(&mut self.queued);
        if labels.is_empty() {
            return Ok(());
        }

        let now = Instant::now();
        self.context
            .io_mut()
            .update_delta_time(now - self.last_frame);
        self.last_frame = now;

        self.platform
            .prepare_frame(self.context.io_mut(), window)
            .map_err(|e| RenderError::Overlay(format!("{e:?}")))?;

        let ui = self.context.new_frame();
        {
            let draw_list = ui.get_foreground_draw_list();
            for label in &labels {
                let [r, g, b, a] = label.color;
                draw_list.add_text(
                    label.position,
                    ImColor32::from_rgba_f32s(r, g, b, a),
                    &label.text,
                );
            }
        }

        let draw_data = self.context.render();
        if draw_data.display_size[0] <= 0.0 || draw_data.display_size[1] <= 0.0 {
            log::warn!(
                "Skipping labels, display size is {:?}",
                draw_data.display_size
            );
            return Ok(());
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Label Overlay Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_attachment,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.renderer
            .render(draw_data, queue, device, &mut render_pass)
            .map_err(|e| RenderError::Overlay(format!("{e:?}")))
    }
}
