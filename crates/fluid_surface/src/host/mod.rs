//! CPU executor for frame plans.
//!
//! Runs every pass of a [`FramePlan`] against the surfaces of a
//! [`SurfaceManager<HostAllocator>`], in plan order, with the same math the
//! WGSL programs use. Used to test the whole pipeline without a GPU.

pub mod programs;

use glam::{Vec3, Vec4};

use crate::commands::{FramePlan, Pass};
use crate::params::{names, ProgramRole};
use crate::resources::{HostAllocator, SurfaceManager};
use crate::smoothing::{SmoothStep, SmoothingSettings};
use crate::surface::{Surface, SurfaceDesc, SurfaceFormat, SurfaceSlot};

use programs::{CompositeParams, DepthParams};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecuteError {
    #[error("surface {0:?} is not allocated")]
    MissingSurface(SurfaceSlot),
    #[error("the argument buffer is not allocated")]
    MissingArgs,
    #[error("{pass} pass is missing parameter `{name}`")]
    MissingParameter { pass: &'static str, name: &'static str },
    #[error("draw needs {required} positions but only {supplied} were supplied")]
    MissingPositions { required: usize, supplied: usize },
    #[error("{pass} pass cannot run program {role:?}")]
    UnexpectedProgram { pass: &'static str, role: ProgramRole },
}

/// Executes plans on the CPU and owns the host presentation target.
#[derive(Debug, Default)]
pub struct HostExecutor {
    display: Option<Surface>,
}

impl HostExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last image written by a composite pass.
    pub fn display(&self) -> Option<&Surface> {
        self.display.as_ref()
    }

    /// Runs `plan` to completion. `positions` backs
    /// [`BufferSlot::Positions`](crate::surface::BufferSlot::Positions).
    pub fn execute(
        &mut self,
        plan: &FramePlan,
        resources: &mut SurfaceManager<HostAllocator>,
        positions: &[Vec3],
    ) -> Result<(), ExecuteError> {
        for pass in plan.passes() {
            log::trace!("Host pass: {}", pass.name());
            match pass {
                Pass::Clear { target, value, .. } => {
                    let surface = resources
                        .surface_mut(*target)
                        .ok_or(ExecuteError::MissingSurface(*target))?;
                    let clear = match surface.desc().format {
                        SurfaceFormat::R32Float => Vec4::new(*value, 0.0, 0.0, 0.0),
                        SurfaceFormat::Rgba32Float => Vec4::splat(*value),
                    };
                    surface.fill(clear);
                }
                Pass::DrawIndirect { target, params, .. } => {
                    let args = resources.draw_args().ok_or(ExecuteError::MissingArgs)?;
                    let count = args.instance_count as usize;
                    if positions.len() < count {
                        return Err(ExecuteError::MissingPositions {
                            required: count,
                            supplied: positions.len(),
                        });
                    }
                    let params = DepthParams::from_params(params)?;
                    let surface = resources
                        .surface_mut(*target)
                        .ok_or(ExecuteError::MissingSurface(*target))?;
                    programs::splat_depth(surface, &positions[..count], &params);
                }
                Pass::Fullscreen {
                    label,
                    program,
                    target,
                    params,
                    ..
                } => match program.role {
                    ProgramRole::Pack => {
                        let input = params.texture(names::DEPTH).ok_or(ExecuteError::MissingParameter {
                            pass: *label,
                            name: names::DEPTH,
                        })?;
                        let (depth, comp) = pair(resources, input, *target)?;
                        programs::pack(depth, comp);
                    }
                    ProgramRole::Composite => {
                        let input = params.texture(names::COMP).ok_or(ExecuteError::MissingParameter {
                            pass: *label,
                            name: names::COMP,
                        })?;
                        let comp = resources
                            .surface(input)
                            .ok_or(ExecuteError::MissingSurface(input))?;
                        let params = CompositeParams::from_params(params)?;
                        let display = self.display_for(comp.desc());
                        programs::composite(comp, display, &params);
                    }
                    role => {
                        return Err(ExecuteError::UnexpectedProgram { pass: *label, role });
                    }
                },
                Pass::Smooth {
                    kind,
                    kernel,
                    mask,
                    steps,
                    ..
                } => {
                    let settings = SmoothingSettings::from_kernel(*kind, *kernel);
                    let strategy = settings.strategy();
                    for step in steps {
                        let (read, write) = pair(resources, step.reads(), step.writes())?;
                        match *step {
                            SmoothStep::Filter { axis, .. } => strategy.filter(axis, read, write, *mask),
                            SmoothStep::Copy { .. } => write.copy_from(read),
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Presentation target matching `comp`, recreated on resize.
    fn display_for(&mut self, comp: &SurfaceDesc) -> &mut Surface {
        let desc = SurfaceDesc::display(comp.viewport());
        if self.display.as_ref().map(|d| *d.desc()) != Some(desc) {
            self.display = Some(Surface::new(desc));
        }
        self.display.get_or_insert_with(|| Surface::new(desc))
    }
}

fn pair(
    resources: &mut SurfaceManager<HostAllocator>,
    read: SurfaceSlot,
    write: SurfaceSlot,
) -> Result<(&Surface, &mut Surface), ExecuteError> {
    if resources.surface(read).is_none() {
        return Err(ExecuteError::MissingSurface(read));
    }
    resources
        .surface_pair_mut(read, write)
        .ok_or(ExecuteError::MissingSurface(write))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::SimulationState;
    use crate::config::RenderConfig;
    use crate::params::PassPrograms;
    use crate::pipeline::FluidPipeline;
    use crate::surface::{is_background, Viewport};

    #[test]
    fn test_single_particle_frame() {
        let mut pipeline = FluidPipeline::new(HostAllocator::new(), RenderConfig::default());
        pipeline.set_programs(PassPrograms::all());
        let simulation = SimulationState {
            particle_count: 1,
            bounds_size: Vec3::splat(2.0),
            origin: Vec3::ZERO,
        };
        let plan = pipeline
            .prepare_frame(Viewport::new(32, 32), &simulation)
            .unwrap()
            .unwrap();

        let mut executor = HostExecutor::new();
        executor
            .execute(&plan, pipeline.resources_mut(), &[Vec3::ZERO])
            .unwrap();

        let depth = pipeline.resources().surface(SurfaceSlot::Depth).unwrap();
        let covered = depth.texels().iter().filter(|t| !is_background(t.x)).count();
        assert!(covered > 0);
        assert!(is_background(depth.texel(0, 0).x));

        let display = executor.display().unwrap();
        assert_eq!((display.width(), display.height()), (32, 32));
        assert!(display.texels().iter().all(|t| t.w == 1.0));
    }

    #[test]
    fn test_too_few_positions() {
        let mut pipeline = FluidPipeline::new(HostAllocator::new(), RenderConfig::default());
        pipeline.set_programs(PassPrograms::all());
        let simulation = SimulationState {
            particle_count: 3,
            bounds_size: Vec3::splat(2.0),
            origin: Vec3::ZERO,
        };
        let plan = pipeline
            .prepare_frame(Viewport::new(8, 8), &simulation)
            .unwrap()
            .unwrap();

        let err = HostExecutor::new()
            .execute(&plan, pipeline.resources_mut(), &[Vec3::ZERO])
            .unwrap_err();
        assert_eq!(
            err,
            ExecuteError::MissingPositions {
                required: 3,
                supplied: 1,
            }
        );
    }
}
