//! winit host: one primary and one overview window over a shared scene.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::coordinator::{ViewRegistry, ViewRole};
use crate::gfx::camera::Viewport;
use crate::gfx::rendering::RenderEngine;
use crate::input::InputSink;
use crate::scene::SharedScene;
use crate::settings::ViewerSettings;
use crate::view::{FrameInfo, GraphView};

pub struct NetViewApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct ViewWindow {
    window: Arc<Window>,
    render_engine: RenderEngine,
    view: GraphView,
    input: InputSink,
}

struct AppState {
    scene: SharedScene,
    registry: Arc<ViewRegistry>,
    settings: ViewerSettings,
    windows: HashMap<WindowId, ViewWindow>,
    started: Instant,
    error: Option<anyhow::Error>,
}

impl NetViewApp {
    pub fn new(scene: SharedScene, settings: ViewerSettings) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new().context("Failed to create event loop")?;
        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                scene,
                registry: Arc::new(ViewRegistry::new()),
                settings,
                windows: HashMap::new(),
                started: Instant::now(),
                error: None,
            },
        })
    }

    /// Runs until both windows are closed or Escape is pressed.
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = self
            .event_loop
            .take()
            .context("Event loop already consumed")?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self.app_state)?;

        match self.app_state.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn open_window(
        &self,
        event_loop: &ActiveEventLoop,
        role: ViewRole,
    ) -> anyhow::Result<ViewWindow> {
        let (title, size) = match role {
            ViewRole::Primary => ("netview3d", LogicalSize::new(1200, 800)),
            ViewRole::Overview => ("netview3d overview", LogicalSize::new(400, 400)),
        };
        let window = Arc::new(
            event_loop.create_window(
                WindowAttributes::default()
                    .with_title(title)
                    .with_inner_size(size),
            )?,
        );

        let (width, height) = window.inner_size().into();
        let render_engine = pollster::block_on(RenderEngine::new(window.clone(), width, height))
            .with_context(|| format!("Failed to create renderer for {title}"))?;

        let scene = self.scene.clone();
        let registry = self.registry.clone();
        let settings = self.settings.clone();
        let view = match role {
            ViewRole::Primary => GraphView::primary(scene, registry, settings),
            ViewRole::Overview => GraphView::overview(scene, registry, settings),
        };
        let input = view.input_sink();
        log::info!("Opened {:?} window {:?}", role, window.id());

        Ok(ViewWindow {
            window,
            render_engine,
            view,
            input,
        })
    }

    fn close_window(&mut self, event_loop: &ActiveEventLoop, id: WindowId) {
        if let Some(closed) = self.windows.remove(&id) {
            log::info!("Closed {:?} window {:?}", closed.view.role(), id);
        }
        if self.windows.is_empty() {
            event_loop.exit();
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop, id: WindowId) {
        let Some(entry) = self.windows.get_mut(&id) else {
            return;
        };
        let (width, height) = entry.render_engine.surface_size();
        let info = FrameInfo {
            viewport: Viewport::new(width as f32, height as f32),
            elapsed: self.started.elapsed().as_secs_f32(),
        };

        match entry.view.draw(&info, &mut entry.render_engine) {
            Ok(report) => {
                if report.pick_hits > 0 {
                    log::trace!("{:?}", report);
                }
            }
            Err(e) if e.is_fatal() => {
                log::error!("Closing {:?} window: {}", entry.view.role(), e);
                self.close_window(event_loop, id);
            }
            Err(e) => log::warn!("Frame skipped: {}", e),
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !self.windows.is_empty() {
            return;
        }

        for role in [ViewRole::Primary, ViewRole::Overview] {
            match self.open_window(event_loop, role) {
                Ok(entry) => {
                    self.windows.insert(entry.window.id(), entry);
                }
                Err(e) => {
                    log::error!("{:#}", e);
                    self.error = Some(e);
                    event_loop.exit();
                    return;
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(entry) = self.windows.get_mut(&window_id) else {
            return;
        };
        entry.input.handle_window_event(&event);

        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                entry.render_engine.resize(width, height);
            }
            WindowEvent::CloseRequested => {
                self.close_window(event_loop, window_id);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop, window_id);
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        for entry in self.windows.values() {
            entry.window.request_redraw();
        }
    }
}
