//! Render pipelines for the fluid passes.
//!
//! Every program uses a single bind group: the uniform buffer (if any) at
//! binding 0, followed by its textures or storage buffers.

use fluid_surface::params::names;
use fluid_surface::{PassPrograms, ProgramHandle, ProgramRole};

use crate::uniforms::{UniformField, UniformLayout};

pub const DEPTH_SHADER: &str = include_str!("shaders/depth.wgsl");
pub const PACK_SHADER: &str = include_str!("shaders/pack.wgsl");
pub const SMOOTH_SHADER: &str = include_str!("shaders/smooth.wgsl");
pub const COMPOSITE_SHADER: &str = include_str!("shaders/composite.wgsl");

/// Matches `DepthUniforms` in depth.wgsl.
pub const DEPTH_UNIFORMS: UniformLayout = UniformLayout::new(&[
    UniformField::scalar(names::SCALE),
    UniformField::matrix(names::VIEW),
    UniformField::matrix(names::PROJ),
]);

/// Matches `CompositeUniforms` in composite.wgsl.
pub const COMPOSITE_UNIFORMS: UniformLayout = UniformLayout::new(&[
    UniformField::scalar(names::DEBUG_DISPLAY_MODE),
    UniformField::scalar(names::DEPTH_DISPLAY_SCALE),
    UniformField::vector(names::BOUNDS_SIZE),
    UniformField::vector(names::EXTINCTION_COEFFICIENTS),
    UniformField::scalar(names::REFRACTION_MULTIPLIER),
    UniformField::vector(names::FLOOR_POS),
    UniformField::vector(names::FLOOR_SIZE),
    UniformField::vector(names::TILE_COL1),
    UniformField::vector(names::TILE_COL2),
    UniformField::vector(names::TILE_COL3),
    UniformField::vector(names::TILE_COL4),
    UniformField::vector(names::TILE_COL_VARIATION),
    UniformField::scalar(names::TILE_SCALE),
    UniformField::scalar(names::TILE_DARK_OFFSET),
    UniformField::matrix(names::INV_VIEW_PROJ),
    UniformField::vector(names::CAMERA_FORWARD),
]);

pub struct Program {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
    /// Entries in `bind_group_layout`, numbered from 0.
    pub bindings: u32,
    pub uniforms: Option<UniformLayout>,
}

/// Compiled fluid programs.
pub struct GpuPrograms {
    depth: Program,
    pack: Program,
    composite: Program,
    smooth: Program,
}

impl GpuPrograms {
    pub fn new(device: &wgpu::Device, display_format: wgpu::TextureFormat) -> Self {
        let depth = {
            let entries = [
                uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ];
            let layout = bind_group_layout(device, "Fluid Depth Layout", &entries);
            Program {
                pipeline: depth_pipeline(device, &layout),
                bind_group_layout: layout,
                bindings: entries.len() as u32,
                uniforms: Some(DEPTH_UNIFORMS),
            }
        };

        let pack = {
            let entries = [texture_entry(0)];
            let layout = bind_group_layout(device, "Fluid Pack Layout", &entries);
            Program {
                pipeline: fullscreen_pipeline(
                    device,
                    "Fluid Pack Pipeline",
                    PACK_SHADER,
                    &layout,
                    wgpu::TextureFormat::Rgba32Float,
                ),
                bind_group_layout: layout,
                bindings: entries.len() as u32,
                uniforms: None,
            }
        };

        let smooth = {
            let entries = [uniform_entry(0, wgpu::ShaderStages::FRAGMENT), texture_entry(1)];
            let layout = bind_group_layout(device, "Fluid Smooth Layout", &entries);
            Program {
                pipeline: fullscreen_pipeline(
                    device,
                    "Fluid Smooth Pipeline",
                    SMOOTH_SHADER,
                    &layout,
                    wgpu::TextureFormat::Rgba32Float,
                ),
                bind_group_layout: layout,
                bindings: entries.len() as u32,
                uniforms: None,
            }
        };

        let composite = {
            let entries = [uniform_entry(0, wgpu::ShaderStages::FRAGMENT), texture_entry(1)];
            let layout = bind_group_layout(device, "Fluid Composite Layout", &entries);
            Program {
                pipeline: fullscreen_pipeline(
                    device,
                    "Fluid Composite Pipeline",
                    COMPOSITE_SHADER,
                    &layout,
                    display_format,
                ),
                bind_group_layout: layout,
                bindings: entries.len() as u32,
                uniforms: Some(COMPOSITE_UNIFORMS),
            }
        };

        log::info!("Fluid programs compiled for {display_format:?}");
        Self {
            depth,
            pack,
            composite,
            smooth,
        }
    }

    /// Handles to cache in the frame context.
    pub fn handles(&self) -> PassPrograms {
        PassPrograms::all()
    }

    pub fn get(&self, handle: ProgramHandle) -> &Program {
        match handle.role {
            ProgramRole::Depth => &self.depth,
            ProgramRole::Pack => &self.pack,
            ProgramRole::Composite => &self.composite,
        }
    }

    /// The filter program shared by every smoothing kind.
    pub fn smooth(&self) -> &Program {
        &self.smooth
    }
}

fn bind_group_layout(
    device: &wgpu::Device,
    label: &str,
    entries: &[wgpu::BindGroupLayoutEntry],
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    })
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn pipeline_layout(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: None,
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    })
}

/// Instanced quads into the R32Float depth surface with a nearest-wins
/// hardware depth test.
fn depth_pipeline(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Fluid Depth Shader"),
        source: wgpu::ShaderSource::Wgsl(DEPTH_SHADER.into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Fluid Depth Pipeline"),
        layout: Some(&pipeline_layout(device, layout)),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: wgpu::TextureFormat::R32Float,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Full-screen triangle into a single colour target.
fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout(device, layout)),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
