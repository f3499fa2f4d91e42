//! Per-frame pass list.
//!
//! [`build`] is a pure function of the allocated resources, the cached
//! programs, this frame's bindings and the smoothing configuration. It either
//! returns the complete ordered plan or nothing; backends execute the passes
//! in the order given.

use crate::binder::FrameBindings;
use crate::params::{ParameterSet, PassPrograms, ProgramHandle};
use crate::resources::{DrawArgs, SurfaceAllocator, SurfaceManager};
use crate::smoothing::{ChannelMask, KernelParams, SmoothStep, SmoothingKind, SmoothingSettings};
use crate::surface::{BufferSlot, SurfaceSlot, Viewport, FAR_DEPTH};

#[derive(Clone, Debug, PartialEq)]
pub enum Pass {
    /// Fill a colour surface, and its depth attachment if asked.
    Clear {
        target: SurfaceSlot,
        value: f32,
        clear_depth_attachment: bool,
    },
    /// Instanced unit quads, counts read from an argument buffer.
    DrawIndirect {
        program: ProgramHandle,
        target: SurfaceSlot,
        args: BufferSlot,
        params: ParameterSet,
    },
    Fullscreen {
        label: &'static str,
        program: ProgramHandle,
        inputs: Vec<SurfaceSlot>,
        target: SurfaceSlot,
        params: ParameterSet,
    },
    /// The active smoothing strategy's steps.
    Smooth {
        kind: SmoothingKind,
        kernel: KernelParams,
        mask: ChannelMask,
        source: SurfaceSlot,
        target: SurfaceSlot,
        steps: Vec<SmoothStep>,
    },
}

impl Pass {
    pub fn name(&self) -> &'static str {
        match self {
            Pass::Clear { .. } => "clear",
            Pass::DrawIndirect { .. } => "draw",
            Pass::Fullscreen { label, .. } => *label,
            Pass::Smooth { .. } => "smooth",
        }
    }

    /// Surfaces the pass reads. The indirect draw depth-tests against the
    /// target it writes, so the target counts as an input.
    pub fn inputs(&self) -> Vec<SurfaceSlot> {
        match self {
            Pass::Clear { .. } => Vec::new(),
            Pass::DrawIndirect { target, .. } => vec![*target],
            Pass::Fullscreen { inputs, .. } => inputs.clone(),
            Pass::Smooth { source, .. } => vec![*source],
        }
    }

    pub fn output(&self) -> SurfaceSlot {
        match self {
            Pass::Clear { target, .. }
            | Pass::DrawIndirect { target, .. }
            | Pass::Fullscreen { target, .. }
            | Pass::Smooth { target, .. } => *target,
        }
    }
}

/// A pass that would sample a surface no earlier pass produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderViolation {
    #[error("pass {index} ({name}) reads {slot:?} before any earlier pass wrote it")]
    ReadBeforeWrite {
        index: usize,
        name: &'static str,
        slot: SurfaceSlot,
    },
    #[error("pass {index} ({name}) samples {slot:?} while rendering to it")]
    ReadWhileWriting {
        index: usize,
        name: &'static str,
        slot: SurfaceSlot,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FramePlan {
    pub viewport: Viewport,
    pub draw_args: DrawArgs,
    passes: Vec<Pass>,
}

impl FramePlan {
    pub fn new(viewport: Viewport, draw_args: DrawArgs, passes: Vec<Pass>) -> Self {
        Self {
            viewport,
            draw_args,
            passes,
        }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(Pass::name).collect()
    }

    /// Checks that every surface is written before it is read, including
    /// inside the smoothing steps, and that no full-screen step samples its
    /// own render target.
    pub fn validate_order(&self) -> Result<(), OrderViolation> {
        let mut written: Vec<SurfaceSlot> = Vec::new();

        for (index, pass) in self.passes.iter().enumerate() {
            let name = pass.name();
            match pass {
                Pass::Smooth { steps, .. } => {
                    for step in steps {
                        require(index, name, step.reads(), &written)?;
                        if step.reads() == step.writes() {
                            return Err(OrderViolation::ReadWhileWriting {
                                index,
                                name,
                                slot: step.reads(),
                            });
                        }
                        written.push(step.writes());
                    }
                }
                Pass::Fullscreen { inputs, target, .. } => {
                    for &slot in inputs.iter() {
                        require(index, name, slot, &written)?;
                    }
                    if inputs.contains(target) {
                        return Err(OrderViolation::ReadWhileWriting {
                            index,
                            name,
                            slot: *target,
                        });
                    }
                    written.push(*target);
                }
                _ => {
                    for slot in pass.inputs() {
                        require(index, name, slot, &written)?;
                    }
                    written.push(pass.output());
                }
            }
        }
        Ok(())
    }
}

fn require(index: usize, name: &'static str, slot: SurfaceSlot, written: &[SurfaceSlot]) -> Result<(), OrderViolation> {
    if written.contains(&slot) {
        Ok(())
    } else {
        Err(OrderViolation::ReadBeforeWrite { index, name, slot })
    }
}

/// Assembles this frame's passes: clear, draw, pack, smooth, composite.
///
/// Returns `None` when resources are not allocated or any program or
/// parameter set is missing. A plan is never partial.
pub fn build<A: SurfaceAllocator>(
    resources: &SurfaceManager<A>,
    programs: &PassPrograms,
    bindings: FrameBindings,
    smoothing: &SmoothingSettings,
) -> Option<FramePlan> {
    if !resources.is_ready() {
        return None;
    }
    let viewport = resources.viewport()?;
    let draw_args = resources.draw_args()?;

    let (Some(depth_program), Some(pack_program), Some(composite_program)) =
        (programs.depth, programs.pack, programs.composite)
    else {
        return None;
    };
    let FrameBindings {
        depth: Some(depth_params),
        pack: Some(pack_params),
        composite: Some(composite_params),
    } = bindings
    else {
        return None;
    };

    let strategy = smoothing.strategy();
    let steps = strategy.plan(SurfaceSlot::Composite, SurfaceSlot::Composite, SurfaceSlot::Scratch);

    let passes = vec![
        Pass::Clear {
            target: SurfaceSlot::Depth,
            value: FAR_DEPTH,
            clear_depth_attachment: true,
        },
        Pass::DrawIndirect {
            program: depth_program,
            target: SurfaceSlot::Depth,
            args: BufferSlot::Args,
            params: depth_params,
        },
        Pass::Fullscreen {
            label: "pack",
            program: pack_program,
            inputs: vec![SurfaceSlot::Depth],
            target: SurfaceSlot::Composite,
            params: pack_params,
        },
        Pass::Smooth {
            kind: strategy.kind(),
            kernel: strategy.kernel(),
            mask: ChannelMask::THICKNESS,
            source: SurfaceSlot::Composite,
            target: SurfaceSlot::Composite,
            steps,
        },
        Pass::Fullscreen {
            label: "composite",
            program: composite_program,
            inputs: vec![SurfaceSlot::Composite],
            target: SurfaceSlot::Display,
            params: composite_params,
        },
    ];

    let plan = FramePlan::new(viewport, draw_args, passes);
    debug_assert_eq!(plan.validate_order(), Ok(()));
    Some(plan)
}
