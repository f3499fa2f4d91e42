//! Encodes a [`FramePlan`] into one command encoder.

use std::sync::Arc;

use fluid_surface::params::ParamValue;
use fluid_surface::{
    BufferSlot, ChannelMask, FramePlan, KernelParams, ParameterSet, Pass, SmoothStep, SurfaceFormat, SurfaceManager,
    SurfaceSlot,
};
use wgpu::util::DeviceExt;

use crate::allocator::{GpuAllocator, GpuSurface};
use crate::programs::{GpuPrograms, Program};
use crate::uniforms::{BindError, FilterUniforms};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("surface {0:?} is not allocated")]
    MissingSurface(SurfaceSlot),
    #[error("surface {0:?} has no depth attachment")]
    MissingDepthAttachment(SurfaceSlot),
    #[error("the argument buffer is not allocated")]
    MissingArgs,
    #[error("failed to bind {pass} parameters: {source}")]
    Bind {
        pass: &'static str,
        #[source]
        source: BindError,
    },
    #[error("{pass} binds {found} resources, its program layout has {expected}")]
    BindingCount {
        pass: &'static str,
        expected: u32,
        found: u32,
    },
}

/// Where passes render and what they sample this frame.
pub struct FrameTargets<'a> {
    pub resources: &'a SurfaceManager<GpuAllocator>,
    /// Backs [`BufferSlot::Positions`].
    pub positions: &'a wgpu::Buffer,
    /// Backs [`SurfaceSlot::Display`].
    pub display: &'a wgpu::TextureView,
}

impl FrameTargets<'_> {
    fn surface(&self, slot: SurfaceSlot) -> Result<&GpuSurface, EncodeError> {
        self.resources.surface(slot).ok_or(EncodeError::MissingSurface(slot))
    }

    fn view(&self, slot: SurfaceSlot) -> Result<&wgpu::TextureView, EncodeError> {
        match slot {
            SurfaceSlot::Display => Ok(self.display),
            slot => self.surface(slot).map(|s| &s.view),
        }
    }

    fn buffer(&self, slot: BufferSlot) -> Result<&wgpu::Buffer, EncodeError> {
        match slot {
            BufferSlot::Positions => Ok(self.positions),
            BufferSlot::Args => self
                .resources
                .args()
                .map(|a| &a.buffer)
                .ok_or(EncodeError::MissingArgs),
        }
    }
}

pub struct GpuExecutor {
    device: Arc<wgpu::Device>,
}

impl GpuExecutor {
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        Self { device }
    }

    /// Records `plan` into a fresh encoder. The encoder is dropped on error,
    /// so a frame either submits every pass or nothing.
    pub fn record(
        &self,
        plan: &FramePlan,
        programs: &GpuPrograms,
        targets: &FrameTargets<'_>,
    ) -> Result<wgpu::CommandBuffer, EncodeError> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Fluid Frame"),
        });
        self.encode(&mut encoder, plan, programs, targets)?;
        Ok(encoder.finish())
    }

    /// Records every pass of `plan` in order. Nothing is recorded past the
    /// first error, and the caller should drop the encoder: earlier passes
    /// are already in it.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        plan: &FramePlan,
        programs: &GpuPrograms,
        targets: &FrameTargets<'_>,
    ) -> Result<(), EncodeError> {
        for pass in plan.passes() {
            match pass {
                Pass::Clear {
                    target,
                    value,
                    clear_depth_attachment,
                } => self.clear(encoder, targets, *target, *value, *clear_depth_attachment)?,
                Pass::DrawIndirect {
                    program,
                    target,
                    args,
                    params,
                } => {
                    let program = programs.get(*program);
                    let bind_group = self.bind(pass.name(), program, params, targets)?;
                    let surface = targets.surface(*target)?;
                    let depth_view = surface
                        .depth_view()
                        .ok_or(EncodeError::MissingDepthAttachment(*target))?;
                    let args_buffer = targets.buffer(*args)?;

                    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("Fluid Depth Pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &surface.view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Load,
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                            view: depth_view,
                            depth_ops: Some(wgpu::Operations {
                                load: wgpu::LoadOp::Load,
                                store: wgpu::StoreOp::Store,
                            }),
                            stencil_ops: None,
                        }),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    rpass.set_pipeline(&program.pipeline);
                    rpass.set_bind_group(0, &bind_group, &[]);
                    rpass.draw_indirect(args_buffer, 0);
                }
                Pass::Fullscreen {
                    label,
                    program,
                    target,
                    params,
                    ..
                } => {
                    let program = programs.get(*program);
                    let bind_group = self.bind(*label, program, params, targets)?;
                    fullscreen(encoder, *label, program, &bind_group, targets.view(*target)?);
                }
                Pass::Smooth {
                    kernel, mask, steps, ..
                } => {
                    for step in steps {
                        self.smooth_step(encoder, programs.smooth(), targets, step, kernel, *mask)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn clear(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &FrameTargets<'_>,
        target: SurfaceSlot,
        value: f32,
        clear_depth_attachment: bool,
    ) -> Result<(), EncodeError> {
        let surface = targets.surface(target)?;
        let value = value as f64;
        let colour = match surface.desc.format {
            SurfaceFormat::R32Float => wgpu::Color {
                r: value,
                g: 0.0,
                b: 0.0,
                a: 0.0,
            },
            SurfaceFormat::Rgba32Float => wgpu::Color {
                r: value,
                g: value,
                b: value,
                a: value,
            },
        };
        let depth_stencil_attachment = match (clear_depth_attachment, surface.depth_view()) {
            (true, Some(view)) => Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            (true, None) => return Err(EncodeError::MissingDepthAttachment(target)),
            (false, _) => None,
        };

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Fluid Clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &surface.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(colour),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        Ok(())
    }

    fn smooth_step(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        program: &Program,
        targets: &FrameTargets<'_>,
        step: &SmoothStep,
        kernel: &KernelParams,
        mask: ChannelMask,
    ) -> Result<(), EncodeError> {
        match *step {
            SmoothStep::Filter { axis, read, write } => {
                let uniforms = FilterUniforms::new(axis, kernel, mask);
                let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Fluid Filter Uniforms"),
                    contents: bytemuck::bytes_of(&uniforms),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Fluid Filter Bind Group"),
                    layout: &program.bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(targets.view(read)?),
                        },
                    ],
                });
                fullscreen(encoder, "smooth", program, &bind_group, targets.view(write)?);
            }
            SmoothStep::Copy { from, to } => {
                let source = targets.surface(from)?;
                let destination = targets.surface(to)?;
                encoder.copy_texture_to_texture(
                    source.texture.as_image_copy(),
                    destination.texture.as_image_copy(),
                    source.extent(),
                );
            }
        }
        Ok(())
    }

    /// Uniforms at binding 0, then every texture and buffer parameter in
    /// set order.
    fn bind(
        &self,
        pass: &'static str,
        program: &Program,
        params: &ParameterSet,
        targets: &FrameTargets<'_>,
    ) -> Result<wgpu::BindGroup, EncodeError> {
        let uniform_buffer = match &program.uniforms {
            Some(layout) => {
                let slots = layout.pack(params).map_err(|source| EncodeError::Bind { pass, source })?;
                Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Fluid Pass Uniforms"),
                    contents: bytemuck::cast_slice(&slots),
                    usage: wgpu::BufferUsages::UNIFORM,
                }))
            }
            None => None,
        };

        let mut entries = Vec::new();
        if let Some(buffer) = &uniform_buffer {
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            });
        }
        for (_, value) in params.iter() {
            let resource = match *value {
                ParamValue::Texture(slot) => wgpu::BindingResource::TextureView(targets.view(slot)?),
                ParamValue::Buffer(slot) => targets.buffer(slot)?.as_entire_binding(),
                _ => continue,
            };
            entries.push(wgpu::BindGroupEntry {
                binding: entries.len() as u32,
                resource,
            });
        }

        let found = entries.len() as u32;
        if found != program.bindings {
            return Err(EncodeError::BindingCount {
                pass,
                expected: program.bindings,
                found,
            });
        }

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(pass),
            layout: &program.bind_group_layout,
            entries: &entries,
        }))
    }
}

fn fullscreen(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    program: &Program,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
) {
    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    rpass.set_pipeline(&program.pipeline);
    rpass.set_bind_group(0, bind_group, &[]);
    rpass.draw(0..3, 0..1);
}
