use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::{gaussian_falloff, FilterAxis, KernelParams, SmoothingKind, SmoothingStrategy};
use crate::config::ConfigError;
use crate::surface::is_background;

/// Settings shared by both bilateral variants.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BilateralSettings {
    /// Kernel half-width in pixels.
    pub radius: u32,
    pub spatial_sigma: f32,
    /// Depth difference at which a tap's weight falls to `exp(-0.5)`.
    pub range_sigma: f32,
    pub iterations: u32,
}

impl Default for BilateralSettings {
    fn default() -> Self {
        Self {
            radius: 8,
            spatial_sigma: 4.0,
            range_sigma: 0.15,
            iterations: 1,
        }
    }
}

impl BilateralSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_positive("bilateral.radius", self.radius as f32)?;
        ConfigError::require_positive("bilateral.spatial_sigma", self.spatial_sigma)?;
        ConfigError::require_positive("bilateral.range_sigma", self.range_sigma)?;
        ConfigError::require_positive("bilateral.iterations", self.iterations as f32)
    }

    fn kernel(&self) -> KernelParams {
        KernelParams {
            radius: self.radius,
            spatial_sigma: self.spatial_sigma,
            range_sigma: Some(self.range_sigma),
        }
    }

    /// Spatial falloff times depth similarity. Two background depths are
    /// equally similar whatever their values.
    fn weight(&self, offset: IVec2, center_depth: f32, tap_depth: f32) -> f32 {
        let spatial = gaussian_falloff(offset.length_squared() as f32, self.spatial_sigma);
        if is_background(center_depth) && is_background(tap_depth) {
            return spatial;
        }
        let dz = tap_depth - center_depth;
        spatial * gaussian_falloff(dz * dz, self.range_sigma)
    }
}

/// Separable bilateral approximation: a horizontal then a vertical step,
/// each weighting taps by distance and depth similarity.
pub struct Bilateral1D<'a> {
    settings: &'a BilateralSettings,
}

impl<'a> Bilateral1D<'a> {
    pub fn new(settings: &'a BilateralSettings) -> Self {
        Self { settings }
    }
}

impl SmoothingStrategy for Bilateral1D<'_> {
    fn kind(&self) -> SmoothingKind {
        SmoothingKind::Bilateral1D
    }

    fn kernel(&self) -> KernelParams {
        self.settings.kernel()
    }

    fn iterations(&self) -> u32 {
        self.settings.iterations
    }

    fn axes(&self) -> &'static [FilterAxis] {
        &[FilterAxis::Horizontal, FilterAxis::Vertical]
    }

    fn weight(&self, offset: IVec2, center_depth: f32, tap_depth: f32) -> f32 {
        self.settings.weight(offset, center_depth, tap_depth)
    }
}

/// Full bilateral filter over the `(2r + 1)²` neighbourhood in one step.
pub struct Bilateral2D<'a> {
    settings: &'a BilateralSettings,
}

impl<'a> Bilateral2D<'a> {
    pub fn new(settings: &'a BilateralSettings) -> Self {
        Self { settings }
    }
}

impl SmoothingStrategy for Bilateral2D<'_> {
    fn kind(&self) -> SmoothingKind {
        SmoothingKind::Bilateral2D
    }

    fn kernel(&self) -> KernelParams {
        self.settings.kernel()
    }

    fn iterations(&self) -> u32 {
        self.settings.iterations
    }

    fn axes(&self) -> &'static [FilterAxis] {
        &[FilterAxis::Both]
    }

    fn weight(&self, offset: IVec2, center_depth: f32, tap_depth: f32) -> f32 {
        self.settings.weight(offset, center_depth, tap_depth)
    }
}
