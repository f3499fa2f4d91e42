//! Render surface descriptors, logical slots and host-side texel storage.

use glam::Vec4;

/// Depth written where no particle covers a pixel.
///
/// Downstream comparisons treat small depths as near, so the clear value is a
/// large positive distance rather than zero.
pub const FAR_DEPTH: f32 = 1.0e7;

/// True when `depth` marks a pixel with no particle coverage.
#[inline]
pub fn is_background(depth: f32) -> bool {
    depth >= FAR_DEPTH
}

/// Size of the presentation target in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height. Returns 1.0 for an empty viewport.
    pub fn aspect(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Colour format of a render surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceFormat {
    /// Single 32-bit float channel (particle depth).
    R32Float,
    /// Four 32-bit float channels (packed thickness and depth).
    Rgba32Float,
}

impl SurfaceFormat {
    pub fn channels(&self) -> u32 {
        match self {
            SurfaceFormat::R32Float => 1,
            SurfaceFormat::Rgba32Float => 4,
        }
    }

    pub fn bytes_per_texel(&self) -> u64 {
        self.channels() as u64 * 4
    }
}

/// Hardware depth attachment paired with a colour surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepthAttachment {
    Depth32Float,
}

/// Everything needed to allocate a surface. Two surfaces with equal
/// descriptors are interchangeable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: SurfaceFormat,
    pub depth_attachment: Option<DepthAttachment>,
}

impl SurfaceDesc {
    /// Particle depth target, with a hardware depth attachment for the
    /// per-particle depth test.
    pub fn depth(viewport: Viewport) -> Self {
        Self {
            label: "Fluid Depth",
            width: viewport.width,
            height: viewport.height,
            format: SurfaceFormat::R32Float,
            depth_attachment: Some(DepthAttachment::Depth32Float),
        }
    }

    /// Packed `(thickness, thickness, thickness, depth)` target.
    pub fn composite(viewport: Viewport) -> Self {
        Self {
            label: "Fluid Composite",
            width: viewport.width,
            height: viewport.height,
            format: SurfaceFormat::Rgba32Float,
            depth_attachment: None,
        }
    }

    /// Ping-pong partner of the composite surface used while smoothing.
    pub fn scratch(viewport: Viewport) -> Self {
        Self {
            label: "Fluid Smoothing Scratch",
            ..Self::composite(viewport)
        }
    }

    /// Host stand-in for the presentation target.
    pub fn display(viewport: Viewport) -> Self {
        Self {
            label: "Fluid Display",
            ..Self::composite(viewport)
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes of GPU memory the surface occupies, attachment included.
    pub fn byte_size(&self) -> u64 {
        let texels = self.texel_count() as u64;
        let attachment = match self.depth_attachment {
            Some(DepthAttachment::Depth32Float) => 4,
            None => 0,
        };
        texels * (self.format.bytes_per_texel() + attachment)
    }

    /// Same format, different label. Used when comparing the composite and
    /// scratch surfaces for ping-pong compatibility.
    pub fn same_layout(&self, other: &SurfaceDesc) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && self.depth_attachment == other.depth_attachment
    }
}

/// Logical surface referenced by passes. Backends resolve a slot to their
/// own texture handle at execution time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceSlot {
    Depth,
    Composite,
    Scratch,
    /// The presentation target. Written only by the final composite pass.
    Display,
}

/// Logical buffer referenced by passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    /// Particle positions supplied by the simulation, one `vec4` per particle.
    Positions,
    /// Indirect draw arguments owned by the surface manager.
    Args,
}

/// Host-resident surface.
///
/// Texels are stored as `Vec4` regardless of format; single-channel formats
/// keep their value in `x` and leave the rest at zero.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    desc: SurfaceDesc,
    texels: Vec<Vec4>,
}

impl Surface {
    pub fn new(desc: SurfaceDesc) -> Self {
        Self {
            texels: vec![Vec4::ZERO; desc.texel_count()],
            desc,
        }
    }

    pub fn filled(desc: SurfaceDesc, value: Vec4) -> Self {
        Self {
            texels: vec![value; desc.texel_count()],
            desc,
        }
    }

    pub fn desc(&self) -> &SurfaceDesc {
        &self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.desc.width as usize + x as usize
    }

    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        self.texels[self.index(x, y)]
    }

    /// Texel lookup with coordinates clamped to the surface bounds.
    #[inline]
    pub fn texel_clamped(&self, x: i32, y: i32) -> Vec4 {
        let cx = x.clamp(0, self.desc.width as i32 - 1) as u32;
        let cy = y.clamp(0, self.desc.height as i32 - 1) as u32;
        self.texel(cx, cy)
    }

    pub fn set_texel(&mut self, x: u32, y: u32, value: Vec4) {
        let idx = self.index(x, y);
        self.texels[idx] = value;
    }

    pub fn fill(&mut self, value: Vec4) {
        self.texels.fill(value);
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub fn texels_mut(&mut self) -> &mut [Vec4] {
        &mut self.texels
    }

    /// Copies texels from a surface of the same dimensions.
    ///
    /// # Panics
    /// If the dimensions differ.
    pub fn copy_from(&mut self, other: &Surface) {
        assert_eq!(
            (self.width(), self.height()),
            (other.width(), other.height()),
            "surface copy between mismatched dimensions"
        );
        self.texels.copy_from_slice(&other.texels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_follow_viewport() {
        let viewport = Viewport::new(64, 32);
        let depth = SurfaceDesc::depth(viewport);
        let comp = SurfaceDesc::composite(viewport);

        assert_eq!(depth.viewport(), viewport);
        assert_eq!(comp.viewport(), viewport);
        assert_eq!(depth.format, SurfaceFormat::R32Float);
        assert_eq!(comp.format, SurfaceFormat::Rgba32Float);
        assert!(depth.depth_attachment.is_some());
        assert!(comp.depth_attachment.is_none());
        assert!(comp.same_layout(&SurfaceDesc::scratch(viewport)));
        assert_ne!(comp, SurfaceDesc::scratch(viewport));
    }

    #[test]
    fn test_byte_size_counts_attachment() {
        let viewport = Viewport::new(4, 4);
        assert_eq!(SurfaceDesc::composite(viewport).byte_size(), 16 * 16);
        assert_eq!(SurfaceDesc::depth(viewport).byte_size(), 16 * 8);
    }

    #[test]
    fn test_clamped_lookup() {
        let mut surface = Surface::new(SurfaceDesc::composite(Viewport::new(3, 2)));
        surface.set_texel(0, 0, Vec4::splat(1.0));
        surface.set_texel(2, 1, Vec4::splat(2.0));

        assert_eq!(surface.texel_clamped(-5, -5), Vec4::splat(1.0));
        assert_eq!(surface.texel_clamped(10, 10), Vec4::splat(2.0));
    }

    #[test]
    fn test_background_threshold() {
        assert!(is_background(FAR_DEPTH));
        assert!(is_background(FAR_DEPTH * 2.0));
        assert!(!is_background(FAR_DEPTH * 0.5));
        assert!(!is_background(0.0));
    }
}
