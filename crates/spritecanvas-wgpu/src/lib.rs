//! GPU rendering backend and window driver for spritecanvas.
//!
//! Uses:
//! - [`wgpu`] for the [`WgpuBackend`] implementation of `RenderBackend`
//! - [`winit`] for window creation and the frame loop
//!
//! A [`Scene`] owns whatever decides what to draw. Once per frame the
//! [`WgpuDriver`] calls [`Scene::frame`] with the canvas, then renders the
//! canvas and presents the surface.

mod backend;

use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use spritecanvas_core::{BackendError, CanvasConfig, CanvasError, SpriteSheet, TileCanvas};

pub use backend::{DrawQueue, Viewport, WgpuBackend};

/// Canvas type driven by [`WgpuDriver`].
pub type WgpuCanvas<S> = TileCanvas<WgpuBackend, S>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the wgpu driver.
#[derive(Clone, Debug)]
pub struct WgpuConfig {
    /// Window title.
    pub title: String,
    /// Integer window scale relative to the canvas pixel size
    /// (0 = auto-detect from DPI).
    pub scale: u32,
    /// Color outside the canvas and behind empty tiles (RGBA, 0..1).
    pub clear_color: [f64; 4],
    /// Wait for vertical sync when presenting.
    pub vsync: bool,
}

impl Default for WgpuConfig {
    fn default() -> Self {
        Self {
            title: "spritecanvas".into(),
            scale: 0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vsync: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// What the driver renders.
pub trait Scene: 'static {
    type Sheet: SpriteSheet;

    /// Canvas geometry used for `setup`.
    fn canvas_config(&self) -> CanvasConfig;

    /// Build the sprite sheet. Called once, before `setup`.
    fn build_sheet(&mut self) -> Result<Self::Sheet, CanvasError>;

    /// Called once after the canvas has been set up.
    fn start(&mut self, canvas: &mut WgpuCanvas<Self::Sheet>);

    /// Called once per frame before rendering. Return `false` to quit.
    fn frame(&mut self, canvas: &mut WgpuCanvas<Self::Sheet>, dt: Duration) -> bool;
}

// ---------------------------------------------------------------------------
// WgpuDriver
// ---------------------------------------------------------------------------

/// Window driver: owns the winit event loop and the GPU state.
pub struct WgpuDriver {
    config: WgpuConfig,
}

impl WgpuDriver {
    pub fn new(config: WgpuConfig) -> Self {
        Self { config }
    }

    /// Run `scene` until the window closes or the scene asks to quit.
    pub fn run<S: Scene>(self, scene: S) -> Result<(), Box<dyn std::error::Error>> {
        let event_loop = EventLoop::new()?;
        let mut app = WgpuApp::new(self.config, scene);
        event_loop.run_app(&mut app)?;
        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// GPU State
// ---------------------------------------------------------------------------

// Field order matters: the canvas (and with it the device) is dropped
// before the surface and the window.
struct GpuState<S: SpriteSheet> {
    canvas: WgpuCanvas<S>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    window: Arc<Window>,
}

// ---------------------------------------------------------------------------
// WgpuApp (ApplicationHandler)
// ---------------------------------------------------------------------------

struct WgpuApp<S: Scene> {
    config: WgpuConfig,
    scene: S,
    gpu: Option<GpuState<S::Sheet>>,
    last_frame: Option<Instant>,
    error: Option<Box<dyn std::error::Error>>,
}

impl<S: Scene> WgpuApp<S> {
    fn new(config: WgpuConfig, scene: S) -> Self {
        Self {
            config,
            scene,
            gpu: None,
            last_frame: None,
            error: None,
        }
    }

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|t| now.duration_since(t))
            .unwrap_or_default();
        self.last_frame = Some(now);

        if !self.scene.frame(&mut gpu.canvas, dt) {
            event_loop.exit();
            return;
        }

        let surface_texture = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(e) => {
                log::warn!("surface texture unavailable: {e}");
                gpu.canvas.backend_mut().discard_pending();
                gpu.surface
                    .configure(gpu.canvas.backend().device(), &gpu.surface_config);
                gpu.window.request_redraw();
                return;
            }
        };
        gpu.canvas.render();
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let viewport = Viewport::fit(
            gpu.surface_config.width,
            gpu.surface_config.height,
            gpu.canvas.canvas_width() as u32,
            gpu.canvas.canvas_height() as u32,
        );
        let [r, g, b, a] = self.config.clear_color;
        gpu.canvas
            .backend_mut()
            .encode_frame(&view, wgpu::Color { r, g, b, a }, viewport);
        surface_texture.present();
        gpu.window.request_redraw();
    }

    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> Result<(), Box<dyn std::error::Error>> {
        let canvas_config = self.scene.canvas_config();
        canvas_config.validate()?;

        let scale_factor = event_loop
            .available_monitors()
            .next()
            .map(|m| m.scale_factor())
            .unwrap_or(1.0);
        let scale = if self.config.scale > 0 {
            self.config.scale
        } else {
            (scale_factor.round() as u32).max(1)
        };
        let (phys_w, phys_h) = window_size(&canvas_config, scale);

        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(phys_w, phys_h))
            .with_resizable(true);
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        // wgpu setup
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| BackendError::Other(e.to_string()))?;

        let adapter = pollster_block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| BackendError::Other(format!("no suitable GPU adapter found: {e}")))?;

        let (device, queue) =
            pollster_block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))
                .map_err(|e| BackendError::Other(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(BackendError::NotReady)?;

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if self.config.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let backend = WgpuBackend::new(device, queue, surface_format);
        let mut canvas = TileCanvas::new(backend, self.scene.build_sheet()?);
        canvas.setup(canvas_config)?;
        self.scene.start(&mut canvas);

        log::debug!(
            "window {}x{} (scale {scale}), surface format {surface_format:?}",
            size.width,
            size.height
        );

        self.gpu = Some(GpuState {
            canvas,
            surface,
            surface_config,
            window,
        });
        Ok(())
    }
}

impl<S: Scene> ApplicationHandler for WgpuApp<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        if let Err(e) = self.init_gpu(event_loop) {
            log::error!("failed to initialize renderer: {e}");
            self.error = Some(e);
            event_loop.exit();
            return;
        }
        if let Some(gpu) = self.gpu.as_ref() {
            gpu.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.surface_config.width = width.max(1);
                    gpu.surface_config.height = height.max(1);
                    gpu.surface
                        .configure(gpu.canvas.backend().device(), &gpu.surface_config);
                    gpu.window.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => {
                self.render(event_loop);
            }

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut gpu) = self.gpu.take() {
            gpu.canvas.discard();
        }
    }
}

/// Initial window size in physical pixels for a canvas drawn at `scale`.
fn window_size(config: &CanvasConfig, scale: u32) -> (u32, u32) {
    (
        (config.canvas_width() as u32).saturating_mul(scale),
        (config.canvas_height() as u32).saturating_mul(scale),
    )
}

// ---------------------------------------------------------------------------
// Minimal pollster (block on async without pulling in tokio)
// ---------------------------------------------------------------------------

fn pollster_block_on<F: std::future::Future>(f: F) -> F::Output {
    // Adapter and device requests resolve almost immediately on desktop.
    let mut f = std::pin::pin!(f);
    let waker = std::task::Waker::noop();
    let mut cx = std::task::Context::from_waker(waker);
    loop {
        match f.as_mut().poll(&mut cx) {
            std::task::Poll::Ready(v) => return v,
            std::task::Poll::Pending => std::thread::yield_now(),
        }
    }
}
