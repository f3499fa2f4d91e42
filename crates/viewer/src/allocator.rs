//! wgpu textures and buffers behind the surface manager.

use std::sync::Arc;

use fluid_surface::{AllocError, DepthAttachment, DrawArgs, SurfaceAllocator, SurfaceDesc, SurfaceFormat};
use wgpu::util::DeviceExt;

pub fn texture_format(format: SurfaceFormat) -> wgpu::TextureFormat {
    match format {
        SurfaceFormat::R32Float => wgpu::TextureFormat::R32Float,
        SurfaceFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

pub fn attachment_format(attachment: DepthAttachment) -> wgpu::TextureFormat {
    match attachment {
        DepthAttachment::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

/// A render surface on the GPU, with its optional hardware depth attachment.
pub struct GpuSurface {
    pub desc: SurfaceDesc,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub depth: Option<(wgpu::Texture, wgpu::TextureView)>,
}

impl GpuSurface {
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.desc.width,
            height: self.desc.height,
            depth_or_array_layers: 1,
        }
    }

    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.depth.as_ref().map(|(_, view)| view)
    }
}

pub struct GpuArgsBuffer {
    pub args: DrawArgs,
    pub buffer: wgpu::Buffer,
}

/// Creates fluid surfaces on a wgpu device.
///
/// Creation runs inside an error scope so out-of-memory and validation
/// failures come back as [`AllocError`] instead of reaching the uncaptured
/// error handler.
pub struct GpuAllocator {
    device: Arc<wgpu::Device>,
    max_dimension: u32,
}

impl GpuAllocator {
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        let max_dimension = device.limits().max_texture_dimension_2d;
        Self { device, max_dimension }
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    fn scoped<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, AllocError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match (oom, validation) {
            (Some(err), _) => Err(AllocError::Backend(format!("out of memory: {err}"))),
            (None, Some(err)) => Err(AllocError::Backend(err.to_string())),
            (None, None) => Ok(value),
        }
    }
}

impl SurfaceAllocator for GpuAllocator {
    type Surface = GpuSurface;
    type ArgsBuffer = GpuArgsBuffer;

    fn create_surface(&mut self, desc: &SurfaceDesc) -> Result<GpuSurface, AllocError> {
        check_dimensions(desc, self.max_dimension)?;
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let desc = *desc;
        self.scoped(|device| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(desc.label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: texture_format(desc.format),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

            let depth = desc.depth_attachment.map(|attachment| {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("Fluid Depth Attachment"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: attachment_format(attachment),
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                (texture, view)
            });

            GpuSurface {
                desc,
                texture,
                view,
                depth,
            }
        })
    }

    fn release_surface(&mut self, surface: GpuSurface) {
        surface.texture.destroy();
        if let Some((texture, _)) = surface.depth {
            texture.destroy();
        }
    }

    fn create_args_buffer(&mut self, args: &DrawArgs) -> Result<GpuArgsBuffer, AllocError> {
        let args = *args;
        self.scoped(|device| {
            let indirect = wgpu::util::DrawIndirectArgs {
                vertex_count: args.vertex_count,
                instance_count: args.instance_count,
                first_vertex: args.first_vertex,
                first_instance: args.first_instance,
            };
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Fluid Draw Args"),
                contents: indirect.as_bytes(),
                usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
            });
            GpuArgsBuffer { args, buffer }
        })
    }

    fn release_args_buffer(&mut self, buffer: GpuArgsBuffer) {
        buffer.buffer.destroy();
    }
}

fn check_dimensions(desc: &SurfaceDesc, max_dimension: u32) -> Result<(), AllocError> {
    if desc.width > max_dimension || desc.height > max_dimension {
        return Err(AllocError::Backend(format!(
            "{} is {}x{}, device limit is {max_dimension}",
            desc.label, desc.width, desc.height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluid_surface::Viewport;

    #[test]
    fn test_formats_match_surface_layout() {
        assert_eq!(texture_format(SurfaceFormat::R32Float), wgpu::TextureFormat::R32Float);
        assert_eq!(
            texture_format(SurfaceFormat::Rgba32Float),
            wgpu::TextureFormat::Rgba32Float
        );
        assert_eq!(
            attachment_format(DepthAttachment::Depth32Float),
            wgpu::TextureFormat::Depth32Float
        );
    }

    #[test]
    fn test_oversized_surface_rejected() {
        let desc = SurfaceDesc::composite(Viewport::new(9000, 16));
        assert!(check_dimensions(&desc, 8192).is_err());
        assert!(check_dimensions(&SurfaceDesc::composite(Viewport::new(8192, 8192)), 8192).is_ok());
    }
}
