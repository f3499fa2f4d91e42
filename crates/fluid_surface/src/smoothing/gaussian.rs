use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::{gaussian_falloff, FilterAxis, KernelParams, SmoothingKind, SmoothingStrategy};
use crate::config::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianSettings {
    /// Kernel half-width in pixels.
    pub radius: u32,
    pub sigma: f32,
    pub iterations: u32,
}

impl Default for GaussianSettings {
    fn default() -> Self {
        Self {
            radius: 6,
            sigma: 3.0,
            iterations: 1,
        }
    }
}

impl GaussianSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_positive("gaussian.radius", self.radius as f32)?;
        ConfigError::require_positive("gaussian.sigma", self.sigma)?;
        ConfigError::require_positive("gaussian.iterations", self.iterations as f32)
    }
}

/// Separable blur with a fixed spatial kernel and no depth-similarity term.
/// The baseline the bilateral variants are compared against.
pub struct Gaussian<'a> {
    settings: &'a GaussianSettings,
}

impl<'a> Gaussian<'a> {
    pub fn new(settings: &'a GaussianSettings) -> Self {
        Self { settings }
    }
}

impl SmoothingStrategy for Gaussian<'_> {
    fn kind(&self) -> SmoothingKind {
        SmoothingKind::Gaussian
    }

    fn kernel(&self) -> KernelParams {
        KernelParams {
            radius: self.settings.radius,
            spatial_sigma: self.settings.sigma,
            range_sigma: None,
        }
    }

    fn iterations(&self) -> u32 {
        self.settings.iterations
    }

    fn axes(&self) -> &'static [FilterAxis] {
        &[FilterAxis::Horizontal, FilterAxis::Vertical]
    }

    fn weight(&self, offset: IVec2, _center_depth: f32, _tap_depth: f32) -> f32 {
        gaussian_falloff(offset.length_squared() as f32, self.settings.sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smoothing::ChannelMask;
    use crate::surface::{Surface, SurfaceDesc, Viewport};
    use glam::Vec4;

    #[test]
    fn test_weights_ignore_depth() {
        let settings = GaussianSettings::default();
        let gaussian = Gaussian::new(&settings);
        let near = gaussian.weight(IVec2::new(2, 0), 1.0, 1.0);
        let far = gaussian.weight(IVec2::new(2, 0), 1.0, 50.0);
        assert_eq!(near, far);
    }

    #[test]
    fn test_constant_field_is_unchanged() {
        let desc = SurfaceDesc::composite(Viewport::new(8, 8));
        let source = Surface::filled(desc, Vec4::new(0.5, 0.5, 0.5, 3.0));
        let mut target = Surface::new(desc);

        let settings = GaussianSettings::default();
        Gaussian::new(&settings).smooth(&source, &mut target, ChannelMask::THICKNESS);

        for texel in target.texels() {
            assert!((texel.x - 0.5).abs() < 1e-5);
            assert_eq!(texel.w, 3.0);
        }
    }

    #[test]
    fn test_validate_rejects_zero_radius() {
        let settings = GaussianSettings {
            radius: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(GaussianSettings::default().validate().is_ok());
    }
}
