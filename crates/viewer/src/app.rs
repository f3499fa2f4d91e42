//! Interactive viewer: winit window, demo particles and the wgpu backend.
//!
//! Keys: `0`-`9` select the display mode, `Tab` cycles the smoothing
//! algorithm, `+`/`-` double or halve the particle count. Drag with the left
//! mouse button to orbit.

use std::sync::Arc;

use fluid_surface::{FluidPipeline, RenderConfig};
use glam::Vec3;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::allocator::GpuAllocator;
use crate::context::GpuContext;
use crate::demo::DemoParticles;
use crate::executor::{FrameTargets, GpuExecutor};
use crate::programs::GpuPrograms;

const MAX_PARTICLES: u32 = 1 << 20;

#[derive(Clone, Debug)]
pub struct ViewerOptions {
    pub config: RenderConfig,
    pub particle_count: u32,
    pub bounds_size: Vec3,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            config: RenderConfig::default(),
            particle_count: 20_000,
            bounds_size: Vec3::new(6.0, 3.0, 4.0),
        }
    }
}

pub fn run(options: ViewerOptions) -> Result<(), winit::error::EventLoopError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = ViewerApp::new(options);
    event_loop.run_app(&mut app)
}

/// Digit key to display ordinal.
pub fn digit_for(code: KeyCode) -> Option<u8> {
    let digit = match code {
        KeyCode::Digit0 | KeyCode::Numpad0 => 0,
        KeyCode::Digit1 | KeyCode::Numpad1 => 1,
        KeyCode::Digit2 | KeyCode::Numpad2 => 2,
        KeyCode::Digit3 | KeyCode::Numpad3 => 3,
        KeyCode::Digit4 | KeyCode::Numpad4 => 4,
        KeyCode::Digit5 | KeyCode::Numpad5 => 5,
        KeyCode::Digit6 | KeyCode::Numpad6 => 6,
        KeyCode::Digit7 | KeyCode::Numpad7 => 7,
        KeyCode::Digit8 | KeyCode::Numpad8 => 8,
        KeyCode::Digit9 | KeyCode::Numpad9 => 9,
        _ => return None,
    };
    Some(digit)
}

/// Particle count after a `+` or `-` press.
pub fn next_particle_count(current: u32, grow: bool) -> u32 {
    if grow {
        current.saturating_mul(2).clamp(1, MAX_PARTICLES)
    } else {
        (current / 2).max(1)
    }
}

/// GPU side of the fluid renderer.
struct FluidRenderer {
    pipeline: FluidPipeline<GpuAllocator>,
    programs: GpuPrograms,
    executor: GpuExecutor,
    positions: wgpu::Buffer,
    positions_capacity: u32,
}

impl FluidRenderer {
    fn new(ctx: &GpuContext, config: RenderConfig, particle_count: u32) -> Self {
        let programs = GpuPrograms::new(&ctx.device, ctx.surface_format());
        let mut pipeline = FluidPipeline::new(GpuAllocator::new(ctx.device.clone()), config);
        pipeline.set_programs(programs.handles());
        let positions_capacity = particle_count.max(1).next_power_of_two();
        Self {
            pipeline,
            programs,
            executor: GpuExecutor::new(ctx.device.clone()),
            positions: create_positions_buffer(&ctx.device, positions_capacity),
            positions_capacity,
        }
    }

    fn upload(&mut self, ctx: &GpuContext, demo: &DemoParticles) {
        if demo.count() > self.positions_capacity {
            self.positions_capacity = demo.count().next_power_of_two();
            self.positions.destroy();
            self.positions = create_positions_buffer(&ctx.device, self.positions_capacity);
            log::debug!("Positions buffer grown to {} particles", self.positions_capacity);
        }
        let data = demo.gpu_positions();
        if !data.is_empty() {
            ctx.queue.write_buffer(&self.positions, 0, bytemuck::cast_slice(&data));
        }
    }

    fn render(&mut self, ctx: &GpuContext, demo: &DemoParticles, view: &wgpu::TextureView) -> Option<wgpu::CommandBuffer> {
        let plan = match self.pipeline.prepare_frame(ctx.viewport(), &demo.simulation_state()) {
            Ok(plan) => plan?,
            Err(err) => {
                log::warn!("{err}");
                return None;
            }
        };
        let targets = FrameTargets {
            resources: self.pipeline.resources(),
            positions: &self.positions,
            display: view,
        };
        match self.executor.record(&plan, &self.programs, &targets) {
            Ok(commands) => Some(commands),
            Err(err) => {
                log::warn!("Fluid frame dropped: {err}");
                None
            }
        }
    }
}

fn create_positions_buffer(device: &wgpu::Device, capacity: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Fluid Positions"),
        size: capacity as u64 * 16,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

struct ViewerApp {
    options: ViewerOptions,
    window: Option<Arc<Window>>,
    ctx: Option<GpuContext>,
    renderer: Option<FluidRenderer>,
    demo: DemoParticles,
    last_time: Option<std::time::Instant>,
    orbiting: bool,
}

impl ViewerApp {
    fn new(options: ViewerOptions) -> Self {
        let demo = DemoParticles::new(options.particle_count, options.bounds_size, 0x5eed);
        Self {
            options,
            window: None,
            ctx: None,
            renderer: None,
            demo,
            last_time: None,
            orbiting: false,
        }
    }

    fn on_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if let Some(digit) = digit_for(code) {
            renderer.pipeline.handle_digit(digit);
            return;
        }
        match code {
            KeyCode::Tab => {
                renderer.pipeline.cycle_smoothing();
            }
            KeyCode::Equal | KeyCode::NumpadAdd | KeyCode::Minus | KeyCode::NumpadSubtract => {
                let grow = matches!(code, KeyCode::Equal | KeyCode::NumpadAdd);
                let count = next_particle_count(self.demo.count(), grow);
                self.demo.set_count(count);
                log::info!("Particles: {count}");
            }
            KeyCode::Escape => event_loop.exit(),
            _ => {}
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("Fluid Surface")
                        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720)),
                )
                .expect("Failed to create window"),
        );
        self.window = Some(window.clone());

        let ctx = pollster::block_on(GpuContext::new(window));
        self.renderer = Some(FluidRenderer::new(
            &ctx,
            self.options.config,
            self.demo.count(),
        ));
        self.ctx = Some(ctx);
        self.last_time = Some(std::time::Instant::now());
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                if let Some(ctx) = &mut self.ctx {
                    ctx.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event,
                is_synthetic: false,
                ..
            } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        self.on_key(event_loop, code);
                    }
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.orbiting = state == ElementState::Pressed;
            }
            WindowEvent::CloseRequested => event_loop.exit(),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let (true, Some(renderer), DeviceEvent::MouseMotion { delta }) =
            (self.orbiting, self.renderer.as_mut(), event)
        {
            renderer.pipeline.camera_mut().orbit(delta.0 as f32, delta.1 as f32);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let (Some(ctx), Some(renderer), Some(last_time)) = (&self.ctx, &mut self.renderer, self.last_time) else {
            return;
        };
        let now = std::time::Instant::now();
        let dt = (now - last_time).as_secs_f32().min(0.1);
        self.last_time = Some(now);

        self.demo.update(dt);
        renderer.upload(ctx, &self.demo);

        let frame = match ctx.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                ctx.surface.configure(&ctx.device, &ctx.config);
                return;
            }
            Err(err) => {
                log::warn!("Skipping frame: {err}");
                return;
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(commands) = renderer.render(ctx, &self.demo, &view) {
            ctx.queue.submit(std::iter::once(commands));
        }
        frame.present();

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
