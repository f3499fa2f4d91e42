//! Frame context tying the surface manager, programs, configuration and
//! display mode together.

use crate::binder::{bind, DisplayState, SimulationState, ViewState};
use crate::camera::OrthoCamera;
use crate::commands::{build, FramePlan};
use crate::config::RenderConfig;
use crate::display::{DisplayMode, DisplayModeController};
use crate::params::PassPrograms;
use crate::resources::{Reallocation, ResourceError, SurfaceAllocator, SurfaceManager};
use crate::smoothing::SmoothingKind;
use crate::surface::Viewport;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame skipped: {0}")]
    Resources(#[from] ResourceError),
}

/// Per-frame orchestration: `ensure`, then `bind`, then `build`.
pub struct FluidPipeline<A: SurfaceAllocator> {
    resources: SurfaceManager<A>,
    programs: PassPrograms,
    config: RenderConfig,
    display: DisplayModeController,
    camera: OrthoCamera,
    last_realloc: Reallocation,
    reported_not_ready: bool,
}

impl<A: SurfaceAllocator> FluidPipeline<A> {
    pub fn new(allocator: A, config: RenderConfig) -> Self {
        Self {
            resources: SurfaceManager::new(allocator),
            programs: PassPrograms::default(),
            display: DisplayModeController::new(config.debug.display_mode),
            config,
            camera: OrthoCamera::new(),
            last_realloc: Reallocation::default(),
            reported_not_ready: false,
        }
    }

    /// Caches program handles once the backend has compiled them.
    pub fn set_programs(&mut self, programs: PassPrograms) {
        self.programs = programs;
        self.reported_not_ready = false;
    }

    pub fn programs(&self) -> &PassPrograms {
        &self.programs
    }

    /// Builds this frame's plan.
    ///
    /// Returns `Ok(None)` when programs are not ready yet; nothing should be
    /// rendered. Resource failures skip the frame and are retried by the
    /// next call.
    pub fn prepare_frame(
        &mut self,
        viewport: Viewport,
        simulation: &SimulationState,
    ) -> Result<Option<FramePlan>, FrameError> {
        self.last_realloc = Reallocation::default();
        self.last_realloc = self.resources.ensure(viewport, simulation.particle_count)?;

        // The camera follows the simulation and refits its orthographic size.
        self.camera.target = simulation.origin;
        self.camera.fit_bounds(simulation.bounds_size, viewport);

        let bindings = bind(
            &self.programs,
            simulation,
            &self.config.environment,
            &self.display_state(),
            &self.config.material,
            &ViewState {
                camera: self.camera,
                viewport,
            },
        );

        match build(&self.resources, &self.programs, bindings, &self.config.smoothing) {
            Some(plan) => {
                self.reported_not_ready = false;
                Ok(Some(plan))
            }
            None => {
                if !self.reported_not_ready {
                    log::debug!("Fluid programs not ready, skipping render: {:?}", self.programs);
                    self.reported_not_ready = true;
                }
                Ok(None)
            }
        }
    }

    /// Number key input, applied from the next frame on.
    pub fn handle_digit(&mut self, digit: u8) -> Option<DisplayMode> {
        self.display.handle_digit(digit)
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display.mode()
    }

    pub fn display_state(&self) -> DisplayState {
        DisplayState {
            mode: self.display.mode(),
            depth_display_scale: self.config.debug.depth_display_scale,
        }
    }

    /// Switches to the next smoothing algorithm.
    pub fn cycle_smoothing(&mut self) -> SmoothingKind {
        let kind = self.config.smoothing.kind.next();
        self.config.smoothing.kind = kind;
        log::info!("Smoothing: {:?}", kind);
        kind
    }

    /// Resources (re)created by the most recent [`prepare_frame`](Self::prepare_frame).
    pub fn last_reallocation(&self) -> Reallocation {
        self.last_realloc
    }

    pub fn resources(&self) -> &SurfaceManager<A> {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut SurfaceManager<A> {
        &mut self.resources
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RenderConfig {
        &mut self.config
    }

    pub fn camera(&self) -> &OrthoCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrthoCamera {
        &mut self.camera
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::names;
    use crate::resources::HostAllocator;
    use glam::Vec3;

    fn simulation(particle_count: u32) -> SimulationState {
        SimulationState {
            particle_count,
            bounds_size: Vec3::new(4.0, 2.0, 2.0),
            origin: Vec3::ZERO,
        }
    }

    #[test]
    fn test_not_ready_without_programs() {
        let mut pipeline = FluidPipeline::new(HostAllocator::new(), RenderConfig::default());
        let plan = pipeline.prepare_frame(Viewport::new(16, 16), &simulation(5)).unwrap();
        assert!(plan.is_none());
        // Resources are still synchronised.
        assert!(pipeline.resources().is_ready());
    }

    #[test]
    fn test_display_mode_reaches_composite_params() {
        let mut pipeline = FluidPipeline::new(HostAllocator::new(), RenderConfig::default());
        pipeline.set_programs(PassPrograms::all());

        let mut seen = Vec::new();
        for digit in [1, 2, 7, 0] {
            pipeline.handle_digit(digit);
            let plan = pipeline
                .prepare_frame(Viewport::new(16, 16), &simulation(5))
                .unwrap()
                .unwrap();
            let crate::commands::Pass::Fullscreen { params, .. } = &plan.passes()[4] else {
                panic!("last pass is not the composite");
            };
            seen.push(params.int(names::DEBUG_DISPLAY_MODE).unwrap());
        }
        assert_eq!(seen, vec![1, 2, 2, 0]);
    }

    #[test]
    fn test_failed_allocation_skips_frame_then_recovers() {
        let mut pipeline = FluidPipeline::new(HostAllocator::with_budget(64), RenderConfig::default());
        pipeline.set_programs(PassPrograms::all());

        let err = pipeline.prepare_frame(Viewport::new(16, 16), &simulation(5)).unwrap_err();
        assert!(matches!(err, FrameError::Resources(ResourceError::Allocation { .. })));

        pipeline.resources_mut().allocator_mut().set_budget(None);
        let plan = pipeline.prepare_frame(Viewport::new(16, 16), &simulation(5)).unwrap();
        assert!(plan.is_some());
        assert!(pipeline.last_reallocation().any());
    }

    #[test]
    fn test_camera_refits_to_simulation_each_frame() {
        let mut pipeline = FluidPipeline::new(HostAllocator::new(), RenderConfig::default());
        pipeline.set_programs(PassPrograms::all());
        pipeline.camera_mut().orbit(40.0, -10.0);
        let yaw = pipeline.camera().yaw;

        let mut sim = simulation(5);
        sim.origin = Vec3::new(1.0, 2.0, 3.0);
        pipeline.prepare_frame(Viewport::new(16, 16), &sim).unwrap();
        assert_eq!(pipeline.camera().target, sim.origin);
        let fitted = pipeline.camera().half_height;

        sim.bounds_size *= 2.0;
        pipeline.prepare_frame(Viewport::new(16, 16), &sim).unwrap();
        assert!((pipeline.camera().half_height - fitted * 2.0).abs() < 1e-4);
        // Framing leaves the orbit angles alone.
        assert_eq!(pipeline.camera().yaw, yaw);
    }

    #[test]
    fn test_cycle_smoothing_wraps() {
        let mut pipeline = FluidPipeline::new(HostAllocator::new(), RenderConfig::default());
        let start = pipeline.config().smoothing.kind;
        for _ in 0..SmoothingKind::ALL.len() {
            pipeline.cycle_smoothing();
        }
        assert_eq!(pipeline.config().smoothing.kind, start);
    }
}
