//! Depth-edge preservation and background exclusion of the smoothing
//! strategies.

use fluid_surface::smoothing::{BilateralSettings, GaussianSettings};
use fluid_surface::{ChannelMask, SmoothingKind, SmoothingSettings, Surface, SurfaceDesc, Viewport, FAR_DEPTH};
use glam::Vec4;

const WIDTH: u32 = 32;
const HEIGHT: u32 = 8;
const STEP_X: u32 = 16;

const NEAR: (f32, f32) = (1.0, 0.2); // (depth, thickness)
const FAR: (f32, f32) = (5.0, 1.0);

fn settings(kind: SmoothingKind) -> SmoothingSettings {
    SmoothingSettings {
        kind,
        bilateral: BilateralSettings {
            radius: 4,
            spatial_sigma: 2.0,
            range_sigma: 0.1,
            iterations: 1,
        },
        gaussian: GaussianSettings {
            radius: 4,
            sigma: 2.0,
            iterations: 1,
        },
    }
}

/// Two depth plateaus meeting at `STEP_X`, each with constant thickness.
fn depth_step() -> Surface {
    let mut surface = Surface::new(SurfaceDesc::composite(Viewport::new(WIDTH, HEIGHT)));
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let (depth, thickness) = if x < STEP_X { NEAR } else { FAR };
            surface.set_texel(x, y, Vec4::new(thickness, thickness, thickness, depth));
        }
    }
    surface
}

fn smooth(source: &Surface, kind: SmoothingKind) -> Surface {
    let desc = *source.desc();
    let mut target = Surface::new(desc);
    fluid_surface::smooth(source, &mut target, &desc, &settings(kind), ChannelMask::THICKNESS);
    target
}

#[test]
fn test_bilateral_preserves_depth_edges() {
    const TOLERANCE: f32 = 1e-3;
    let source = depth_step();

    for kind in [SmoothingKind::Bilateral1D, SmoothingKind::Bilateral2D] {
        let result = smooth(&source, kind);
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let expected = if x < STEP_X { NEAR.1 } else { FAR.1 };
                let texel = result.texel(x, y);
                assert!(
                    (texel.x - expected).abs() < TOLERANCE,
                    "{kind:?} bled across the edge at ({x}, {y}): {} vs {expected}",
                    texel.x
                );
            }
        }
    }
}

#[test]
fn test_gaussian_blurs_across_depth_edges() {
    let source = depth_step();
    let result = smooth(&source, SmoothingKind::Gaussian);

    let left = result.texel(STEP_X - 1, HEIGHT / 2).x;
    let right = result.texel(STEP_X, HEIGHT / 2).x;
    assert!(left - NEAR.1 > 0.05, "left of edge barely changed: {left}");
    assert!(FAR.1 - right > 0.05, "right of edge barely changed: {right}");

    // Far from the edge the plateaus are untouched.
    assert!((result.texel(2, 2).x - NEAR.1).abs() < 1e-5);
    assert!((result.texel(WIDTH - 3, 2).x - FAR.1).abs() < 1e-5);
}

#[test]
fn test_smoothing_keeps_depth_and_raw_thickness() {
    let source = depth_step();
    for kind in SmoothingKind::ALL {
        let result = smooth(&source, kind);
        for (before, after) in source.texels().iter().zip(result.texels()) {
            assert_eq!(before.z.to_bits(), after.z.to_bits(), "{kind:?}");
            assert_eq!(before.w.to_bits(), after.w.to_bits(), "{kind:?}");
        }
    }
}

#[test]
fn test_background_never_weights_foreground() {
    // A foreground disc with varying thickness surrounded by background
    // texels carrying a huge thickness. Any background contribution would
    // push foreground values above the foreground maximum.
    let viewport = Viewport::new(16, 16);
    let mut source = Surface::filled(SurfaceDesc::composite(viewport), Vec4::new(100.0, 100.0, 100.0, FAR_DEPTH));
    let mut fg_min = f32::MAX;
    let mut fg_max = f32::MIN;
    for y in 0..16 {
        for x in 0..16 {
            let (dx, dy) = (x as f32 - 7.5, y as f32 - 7.5);
            if dx * dx + dy * dy < 25.0 {
                let thickness = 0.3 + 0.05 * ((x + y) % 4) as f32;
                fg_min = fg_min.min(thickness);
                fg_max = fg_max.max(thickness);
                source.set_texel(x, y, Vec4::new(thickness, thickness, thickness, 2.0));
            }
        }
    }

    for kind in SmoothingKind::ALL {
        let mut settings = settings(kind);
        // Wide enough that depth similarity alone would not separate the
        // background from the fluid.
        settings.bilateral.range_sigma = 1.0e8;

        let desc = *source.desc();
        let mut result = Surface::new(desc);
        fluid_surface::smooth(&source, &mut result, &desc, &settings, ChannelMask::THICKNESS);

        for (before, after) in source.texels().iter().zip(result.texels()) {
            if before.w >= FAR_DEPTH {
                assert!((after.x - 100.0).abs() < 1e-3, "{kind:?} background changed to {}", after.x);
            } else {
                assert!(
                    after.x >= fg_min - 1e-5 && after.x <= fg_max + 1e-5,
                    "{kind:?} foreground contaminated: {}",
                    after.x
                );
            }
        }
    }
}
