//! Edge-aware smoothing of the packed composite surface.
//!
//! Three interchangeable strategies share one contract: channel `w` holds
//! depth and is only ever read, the channels selected by a [`ChannelMask`]
//! among `x, y, z` are filtered, and every other channel is copied through
//! unchanged. Each strategy both plans its full-screen steps for a backend
//! and runs the same per-pixel math on the CPU.

mod bilateral;
mod gaussian;

pub use bilateral::{Bilateral1D, Bilateral2D, BilateralSettings};
pub use gaussian::{Gaussian, GaussianSettings};

use glam::{IVec2, Vec3, Vec4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::surface::{is_background, Surface, SurfaceDesc, SurfaceSlot};

/// Smoothing algorithm selected by configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SmoothingKind {
    Gaussian,
    #[default]
    Bilateral2D,
    Bilateral1D,
}

impl SmoothingKind {
    pub const ALL: [SmoothingKind; 3] = [
        SmoothingKind::Gaussian,
        SmoothingKind::Bilateral2D,
        SmoothingKind::Bilateral1D,
    ];

    /// Next kind in declaration order, wrapping around.
    pub fn next(self) -> Self {
        match self {
            SmoothingKind::Gaussian => SmoothingKind::Bilateral2D,
            SmoothingKind::Bilateral2D => SmoothingKind::Bilateral1D,
            SmoothingKind::Bilateral1D => SmoothingKind::Gaussian,
        }
    }
}

/// Channels among `x, y, z` a smoothing pass may write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelMask {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl ChannelMask {
    /// Smoothed thickness in `x` and `y`, raw thickness kept in `z`.
    pub const THICKNESS: ChannelMask = ChannelMask {
        x: true,
        y: true,
        z: false,
    };

    pub const NONE: ChannelMask = ChannelMask {
        x: false,
        y: false,
        z: false,
    };

    pub fn new(x: bool, y: bool, z: bool) -> Self {
        Self { x, y, z }
    }

    /// Components above one half select a channel.
    pub fn from_vec3(mask: Vec3) -> Self {
        Self::new(mask.x > 0.5, mask.y > 0.5, mask.z > 0.5)
    }

    /// Mask as `0.0 / 1.0` components, `w` always zero.
    pub fn as_vec4(&self) -> Vec4 {
        Vec4::new(
            self.x as u8 as f32,
            self.y as u8 as f32,
            self.z as u8 as f32,
            0.0,
        )
    }

    /// Takes masked channels from `filtered` and all others from `original`.
    #[inline]
    pub fn apply(&self, filtered: Vec4, original: Vec4) -> Vec4 {
        Vec4::new(
            if self.x { filtered.x } else { original.x },
            if self.y { filtered.y } else { original.y },
            if self.z { filtered.z } else { original.z },
            original.w,
        )
    }
}

/// Direction of one filter step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterAxis {
    Horizontal,
    Vertical,
    /// Full 2D neighbourhood in a single step.
    Both,
}

impl FilterAxis {
    /// Per-tap pixel step for separable axes, zero for [`FilterAxis::Both`].
    pub fn step(&self) -> IVec2 {
        match self {
            FilterAxis::Horizontal => IVec2::X,
            FilterAxis::Vertical => IVec2::Y,
            FilterAxis::Both => IVec2::ZERO,
        }
    }
}

/// Kernel constants a backend needs to run a strategy's steps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelParams {
    pub radius: u32,
    pub spatial_sigma: f32,
    /// `None` disables the depth-similarity term.
    pub range_sigma: Option<f32>,
}

/// One full-screen operation inside a smoothing pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmoothStep {
    Filter {
        axis: FilterAxis,
        read: SurfaceSlot,
        write: SurfaceSlot,
    },
    Copy {
        from: SurfaceSlot,
        to: SurfaceSlot,
    },
}

impl SmoothStep {
    pub fn reads(&self) -> SurfaceSlot {
        match *self {
            SmoothStep::Filter { read, .. } => read,
            SmoothStep::Copy { from, .. } => from,
        }
    }

    pub fn writes(&self) -> SurfaceSlot {
        match *self {
            SmoothStep::Filter { write, .. } => write,
            SmoothStep::Copy { to, .. } => to,
        }
    }
}

/// A smoothing algorithm.
pub trait SmoothingStrategy: Sync {
    fn kind(&self) -> SmoothingKind;

    fn kernel(&self) -> KernelParams;

    fn iterations(&self) -> u32;

    /// Axes of a single iteration, in execution order.
    fn axes(&self) -> &'static [FilterAxis];

    /// Weight of a tap at `offset` from the centre, given both depths.
    /// Coverage exclusion is applied by the caller.
    fn weight(&self, offset: IVec2, center_depth: f32, tap_depth: f32) -> f32;

    /// One filter step on the CPU: reads `source`, writes every texel of
    /// `target`.
    fn filter(&self, axis: FilterAxis, source: &Surface, target: &mut Surface, mask: ChannelMask) {
        convolve(source, target, mask, self.kernel().radius, axis, |offset, center, tap| {
            self.weight(offset, center, tap)
        });
    }

    /// Plans the steps that smooth `source` into `target`, ping-ponging
    /// through `scratch`. No step reads the slot it writes.
    fn plan(&self, source: SurfaceSlot, target: SurfaceSlot, scratch: SurfaceSlot) -> Vec<SmoothStep> {
        let mut steps = Vec::new();
        let mut read = source;
        let mut write = scratch;
        for _ in 0..self.iterations() {
            for &axis in self.axes() {
                if write == read {
                    write = if read == scratch { target } else { scratch };
                }
                steps.push(SmoothStep::Filter { axis, read, write });
                read = write;
                write = if write == scratch { target } else { scratch };
            }
        }
        if read != target {
            steps.push(SmoothStep::Copy {
                from: read,
                to: target,
            });
        }
        steps
    }

    /// Runs every iteration on the CPU and leaves the result in `target`.
    fn smooth(&self, source: &Surface, target: &mut Surface, mask: ChannelMask) {
        let mut current = source.clone();
        let mut next = Surface::new(*target.desc());
        for _ in 0..self.iterations() {
            for &axis in self.axes() {
                self.filter(axis, &current, &mut next, mask);
                std::mem::swap(&mut current, &mut next);
            }
        }
        target.copy_from(&current);
    }
}

/// Per-algorithm settings plus the active algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingSettings {
    pub kind: SmoothingKind,
    pub bilateral: BilateralSettings,
    pub gaussian: GaussianSettings,
}

impl SmoothingSettings {
    /// The strategy for the configured kind.
    pub fn strategy(&self) -> Box<dyn SmoothingStrategy + '_> {
        self.strategy_for(self.kind)
    }

    pub fn strategy_for(&self, kind: SmoothingKind) -> Box<dyn SmoothingStrategy + '_> {
        match kind {
            SmoothingKind::Gaussian => Box::new(Gaussian::new(&self.gaussian)),
            SmoothingKind::Bilateral1D => Box::new(Bilateral1D::new(&self.bilateral)),
            SmoothingKind::Bilateral2D => Box::new(Bilateral2D::new(&self.bilateral)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bilateral.validate()?;
        self.gaussian.validate()
    }

    /// Single-iteration settings reproducing a planned kernel, for backends
    /// that execute one step at a time.
    pub fn from_kernel(kind: SmoothingKind, kernel: KernelParams) -> Self {
        let mut settings = SmoothingSettings {
            kind,
            ..Default::default()
        };
        match kind {
            SmoothingKind::Gaussian => {
                settings.gaussian = GaussianSettings {
                    radius: kernel.radius,
                    sigma: kernel.spatial_sigma,
                    iterations: 1,
                };
            }
            SmoothingKind::Bilateral1D | SmoothingKind::Bilateral2D => {
                settings.bilateral = BilateralSettings {
                    radius: kernel.radius,
                    spatial_sigma: kernel.spatial_sigma,
                    range_sigma: kernel.range_sigma.unwrap_or(settings.bilateral.range_sigma),
                    iterations: 1,
                };
            }
        }
        settings
    }
}

/// Smooths `source` into `target` with the configured strategy.
///
/// `desc` describes the temporary surfaces the strategy works in and must
/// match `target`.
pub fn smooth(
    source: &Surface,
    target: &mut Surface,
    desc: &SurfaceDesc,
    settings: &SmoothingSettings,
    mask: ChannelMask,
) {
    debug_assert!(desc.same_layout(target.desc()));
    settings.strategy().smooth(source, target, mask);
}

/// Normalised weighted sum over a clamped neighbourhood.
///
/// A tap only contributes if it sits on the same side of the coverage
/// boundary as the centre, so background never bleeds into the fluid and
/// fluid never bleeds into the background.
pub(crate) fn convolve<W>(
    source: &Surface,
    target: &mut Surface,
    mask: ChannelMask,
    radius: u32,
    axis: FilterAxis,
    weight: W,
) where
    W: Fn(IVec2, f32, f32) -> f32 + Sync,
{
    assert_eq!(
        (source.width(), source.height()),
        (target.width(), target.height()),
        "filter between mismatched surfaces"
    );
    let width = source.width() as usize;
    let radius = radius as i32;

    let taps: Vec<IVec2> = match axis {
        FilterAxis::Both => (-radius..=radius)
            .flat_map(|dy| (-radius..=radius).map(move |dx| IVec2::new(dx, dy)))
            .collect(),
        separable => {
            let step = separable.step();
            (-radius..=radius).map(|i| step * i).collect()
        }
    };

    target
        .texels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let pixel = IVec2::new(x as i32, y as i32);
                let center = source.texel_clamped(pixel.x, pixel.y);
                let center_bg = is_background(center.w);

                let mut sum = Vec4::ZERO;
                let mut weight_sum = 0.0;
                for &offset in &taps {
                    let p = pixel + offset;
                    let tap = source.texel_clamped(p.x, p.y);
                    if is_background(tap.w) != center_bg {
                        continue;
                    }
                    let w = weight(offset, center.w, tap.w);
                    sum += tap * w;
                    weight_sum += w;
                }

                let filtered = if weight_sum > 0.0 { sum / weight_sum } else { center };
                *out = mask.apply(filtered, center);
            }
        });
}

/// `exp(-d² / 2σ²)`, with a non-positive sigma treated as a delta.
#[inline]
pub(crate) fn gaussian_falloff(distance_sq: f32, sigma: f32) -> f32 {
    if sigma <= 0.0 {
        return if distance_sq == 0.0 { 1.0 } else { 0.0 };
    }
    (-distance_sq / (2.0 * sigma * sigma)).exp()
}
