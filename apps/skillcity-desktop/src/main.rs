use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec2;
use skillcity_assets::FsLoader;
use skillcity_common::{EntityId, InfoRecord};
use skillcity_input::{Action, Bindings, InputState};
use skillcity_render::Renderer;
use skillcity_render_wgpu::{WgpuFrame, WgpuRenderer};
use skillcity_session::{CameraMode, CitySession, InfoSink, SessionConfig};
use skillcity_tools::CityInspector;
use skillcity_visibility::FrameStats;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

/// Pointer travel, in pixels, after which a press counts as a drag.
const DRAG_THRESHOLD: f32 = 4.0;
const MINIMAP_SIZE: f32 = 180.0;

#[derive(Parser)]
#[command(name = "skillcity-desktop", about = "Skill city desktop viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Session config (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// The info panel the session reports into.
#[derive(Default)]
struct InfoPanel {
    current: Option<(EntityId, InfoRecord)>,
}

impl InfoSink for InfoPanel {
    fn show_info(&mut self, id: EntityId, info: &InfoRecord) {
        self.current = Some((id, info.clone()));
    }

    fn hide_info(&mut self) {
        self.current = None;
    }
}

struct Drag {
    origin: Vec2,
    moved: bool,
}

/// Application state.
struct AppState {
    session: CitySession,
    bindings: Bindings,
    input: InputState,
    panel: InfoPanel,
    half_extent: f32,
    show_inspector: bool,
    cursor: Vec2,
    drag: Option<Drag>,
    last_stats: Option<FrameStats>,
    last_frame: Instant,
}

impl AppState {
    fn new(config: SessionConfig) -> Result<Self> {
        let bindings = config.bindings.clone();
        let half_extent = config.city.half_extent;
        let loader = FsLoader::new(config.asset_root.clone());
        let session = CitySession::new(config, Box::new(loader))?;
        Ok(Self {
            session,
            bindings,
            input: InputState::new(),
            panel: InfoPanel::default(),
            half_extent,
            show_inspector: false,
            cursor: Vec2::ZERO,
            drag: None,
            last_stats: None,
            last_frame: Instant::now(),
        })
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.last_stats = Some(self.session.frame(dt, &mut self.input, &mut self.panel));
    }

    fn dispatch(&mut self, action: Action) {
        if action.is_noop() {
            return;
        }
        if !self.session.handle_action(&action, &mut self.input, &mut self.panel)
            && action == Action::ToggleInspector
        {
            self.show_inspector = !self.show_inspector;
        }
    }

    fn handle_key(&mut self, key: &str, pressed: bool) {
        let action = self.bindings.action_for(key, pressed);
        self.dispatch(action);
    }

    fn handle_button(&mut self, pressed: bool) {
        if pressed {
            self.drag = Some(Drag {
                origin: self.cursor,
                moved: false,
            });
            return;
        }
        if let Some(drag) = self.drag.take() {
            if !drag.moved {
                self.dispatch(Action::Click {
                    x: self.cursor.x,
                    y: self.cursor.y,
                });
            }
        }
    }

    fn handle_cursor(&mut self, position: Vec2) {
        let delta = position - self.cursor;
        self.cursor = position;
        let Some(drag) = &mut self.drag else {
            return;
        };
        if position.distance(drag.origin) > DRAG_THRESHOLD {
            drag.moved = true;
        }
        if drag.moved && self.session.mode() == CameraMode::Orbit {
            self.session.orbit_mut().rotate(delta.x, delta.y);
        }
    }

    fn handle_scroll(&mut self, delta: MouseScrollDelta) {
        let steps = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
        };
        if self.session.mode() == CameraMode::Orbit {
            self.session.orbit_mut().zoom(-steps);
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        self.draw_info_panel(ctx);
        self.draw_minimap(ctx);
        if self.show_inspector {
            self.draw_inspector(ctx);
        }
    }

    fn draw_info_panel(&mut self, ctx: &EguiContext) {
        let mut close = false;
        if let Some((_, info)) = &self.panel.current {
            egui::Window::new(info.title.as_str())
                .anchor(egui::Align2::RIGHT_TOP, [-12.0, 12.0])
                .resizable(false)
                .collapsible(false)
                .default_width(320.0)
                .show(ctx, |ui| {
                    ui.label(info.description.as_str());
                    ui.separator();
                    close = ui.button("Close").clicked();
                });
        }
        if close {
            self.panel.hide_info();
        }
    }

    fn draw_minimap(&self, ctx: &EguiContext) {
        let half = self.half_extent.max(1.0);
        egui::Area::new(egui::Id::new("minimap"))
            .anchor(egui::Align2::LEFT_BOTTOM, [12.0, -12.0])
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    let (response, painter) =
                        ui.allocate_painter(egui::Vec2::splat(MINIMAP_SIZE), egui::Sense::hover());
                    let rect = response.rect;
                    let to_map = |x: f32, z: f32| {
                        egui::pos2(
                            rect.min.x + (x + half) / (2.0 * half) * rect.width(),
                            rect.min.y + (z + half) / (2.0 * half) * rect.height(),
                        )
                    };
                    painter.rect_filled(rect, 2.0, egui::Color32::from_rgb(34, 40, 36));
                    for entity in self.session.city().entities().filter(|e| e.is_alive()) {
                        if !entity.kind().is_building() {
                            continue;
                        }
                        let bounds = entity.bounds();
                        let color = if entity.kind().is_landmark() {
                            egui::Color32::from_rgb(90, 160, 240)
                        } else {
                            egui::Color32::from_gray(110)
                        };
                        painter.rect_filled(
                            egui::Rect::from_two_pos(
                                to_map(bounds.min.x, bounds.min.z),
                                to_map(bounds.max.x, bounds.max.z),
                            ),
                            0.0,
                            color,
                        );
                    }
                    let player = self.session.minimap_position();
                    painter.circle_filled(to_map(player.x, player.y), 3.5, egui::Color32::from_rgb(242, 193, 78));
                });
            });
    }

    fn draw_inspector(&self, ctx: &EguiContext) {
        let city = self.session.city();
        let summary = CityInspector::summary(city, self.last_stats);
        egui::SidePanel::left("inspector")
            .default_width(300.0)
            .show(ctx, |ui| {
                ui.heading("Skill City");
                ui.separator();
                ui.monospace(summary.to_string());
                ui.separator();
                let camera = self.session.camera();
                let player = self.session.player().position();
                ui.label(format!("Mode: {:?}  Frames: {}", self.session.mode(), self.session.frames()));
                ui.label(format!(
                    "Camera: ({:.1}, {:.1}, {:.1})",
                    camera.position.x, camera.position.y, camera.position.z
                ));
                ui.label(format!(
                    "Player: ({:.1}, {:.1}, {:.1}) {:?}",
                    player.x,
                    player.y,
                    player.z,
                    self.session.player().state()
                ));
                if let Some(clip) = self.session.player().avatar().active_clip() {
                    ui.label(format!("Clip: {clip}"));
                }
                if let Some(entity) = self
                    .session
                    .highlighted()
                    .and_then(|id| CityInspector::inspect_entity(city, id))
                {
                    ui.separator();
                    ui.heading("Selected");
                    ui.label(entity.to_string());
                }
                ui.separator();
                ui.small("F1: Inspector | C: Camera | WASD: Move | E: Interact | Drag: Orbit");
            });
    }
}

/// GPU and window resources, created once the event loop resumes.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn new(event_loop: &ActiveEventLoop, egui_ctx: &EguiContext, size: (u32, u32)) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("Skill City")
            .with_inner_size(PhysicalSize::new(size.0, size.1));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("skillcity_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = WgpuRenderer::new(&device, format, config.width, config.height);
        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, format, None, 1, false);

        tracing::info!("GPU initialized with {} backend", adapter.get_info().backend.to_str());
        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.renderer.resize(&self.device, self.config.width, self.config.height);
    }
}

struct GpuApp {
    state: AppState,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
}

impl GpuApp {
    fn redraw(&mut self) {
        self.state.update();
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let session = &self.state.session;
        let scene = session.draw_list();
        let mut frame = WgpuFrame {
            renderer: &mut gpu.renderer,
            device: &gpu.device,
            queue: &gpu.queue,
            target: &view,
            cache: session.city().cache(),
        };
        if let Err(e) = frame.render_frame(&scene, session.camera()) {
            tracing::error!("render failed: {e}");
        }

        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            self.state.draw_ui(ctx);
        });
        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            gpu.egui_renderer
                .update_texture(&gpu.device, &gpu.queue, *id, image_delta);
        }
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
        gpu.egui_renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            gpu.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        output.present();
        gpu.window.request_redraw();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        let viewport = self.state.session.viewport();
        match Gpu::new(event_loop, &self.egui_ctx, (viewport.x as u32, viewport.y as u32)) {
            Ok(gpu) => {
                let size = gpu.window.inner_size();
                self.state.session.resize(size.width, size.height);
                self.gpu = Some(gpu);
            }
            Err(e) => {
                tracing::error!("failed to initialize graphics: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let Some(gpu) = &mut self.gpu {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.state.session.dispose();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                }
                self.state.session.resize(new_size.width, new_size.height);
            }
            WindowEvent::Focused(false) => self.state.input.clear(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                self.state
                    .handle_key(&format!("{key:?}"), state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.state
                    .handle_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => self.state.handle_button(state == ElementState::Pressed),
            WindowEvent::MouseWheel { delta, .. } => self.state.handle_scroll(delta),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    tracing::info!("skillcity-desktop starting");

    let config = match &cli.config {
        Some(path) => SessionConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SessionConfig::default(),
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp {
        state: AppState::new(config)?,
        gpu: None,
        egui_ctx: EguiContext::default(),
    };
    event_loop.run_app(&mut app)?;

    Ok(())
}
