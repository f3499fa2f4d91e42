//! Property-based tests for surface management and smoothing.
//!
//! - Surfaces always match the most recent viewport
//! - Argument buffer always matches the most recent particle count
//! - Repeating `ensure` never reallocates
//! - Smoothing never touches channels outside the mask

use fluid_surface::smoothing::{BilateralSettings, GaussianSettings};
use fluid_surface::{
    ChannelMask, HostAllocator, SmoothingKind, SmoothingSettings, Surface, SurfaceDesc, SurfaceManager,
    SurfaceSlot, Viewport, FAR_DEPTH,
};
use glam::Vec4;
use proptest::prelude::*;

fn frame_request() -> impl Strategy<Value = (u32, u32, u32)> {
    (1u32..96, 1u32..96, 0u32..2000)
}

fn smoothing_kind() -> impl Strategy<Value = SmoothingKind> {
    prop_oneof![
        Just(SmoothingKind::Gaussian),
        Just(SmoothingKind::Bilateral1D),
        Just(SmoothingKind::Bilateral2D),
    ]
}

/// Foreground texels at moderate depths, sometimes background.
fn texel() -> impl Strategy<Value = Vec4> {
    (0.0f32..4.0, 0.0f32..4.0, 0.0f32..4.0, 0.5f32..10.0, prop::bool::weighted(0.2)).prop_map(
        |(x, y, z, depth, background)| Vec4::new(x, y, z, if background { FAR_DEPTH } else { depth }),
    )
}

fn surface(width: u32, height: u32) -> impl Strategy<Value = Surface> {
    prop::collection::vec(texel(), (width * height) as usize).prop_map(move |texels| {
        let mut surface = Surface::new(SurfaceDesc::composite(Viewport::new(width, height)));
        surface.texels_mut().copy_from_slice(&texels);
        surface
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_surfaces_track_latest_request(requests in prop::collection::vec(frame_request(), 1..12)) {
        let mut resources = SurfaceManager::new(HostAllocator::new());

        for (width, height, count) in requests {
            let viewport = Viewport::new(width, height);
            resources.ensure(viewport, count).unwrap();

            for slot in [SurfaceSlot::Depth, SurfaceSlot::Composite, SurfaceSlot::Scratch] {
                let surface = resources.surface(slot).unwrap();
                prop_assert_eq!((surface.width(), surface.height()), (width, height));
                prop_assert_eq!(surface.texels().len(), viewport.texel_count());
            }
            prop_assert_eq!(resources.draw_args().unwrap().instance_count, count);

            let stats = resources.allocator().stats();
            prop_assert_eq!(stats.live_surfaces(), 3);
            prop_assert_eq!(stats.live_buffers(), 1);

            let again = resources.ensure(viewport, count).unwrap();
            prop_assert!(!again.any());
        }

        resources.release();
        prop_assert_eq!(resources.allocator().stats().live_surfaces(), 0);
        prop_assert_eq!(resources.allocator().bytes_in_use(), 0);
    }

    #[test]
    fn test_smoothing_respects_channel_mask(
        source in surface(7, 5),
        kind in smoothing_kind(),
        mask in (any::<bool>(), any::<bool>(), any::<bool>()),
        radius in 1u32..4,
        iterations in 1u32..3,
    ) {
        let mask = ChannelMask::new(mask.0, mask.1, mask.2);
        let settings = SmoothingSettings {
            kind,
            bilateral: BilateralSettings { radius, spatial_sigma: 1.5, range_sigma: 0.5, iterations },
            gaussian: GaussianSettings { radius, sigma: 1.5, iterations },
        };
        let desc = *source.desc();
        let mut target = Surface::new(desc);

        fluid_surface::smooth(&source, &mut target, &desc, &settings, mask);

        for (before, after) in source.texels().iter().zip(target.texels()) {
            prop_assert_eq!(before.w.to_bits(), after.w.to_bits());
            if !mask.x {
                prop_assert_eq!(before.x.to_bits(), after.x.to_bits());
            }
            if !mask.y {
                prop_assert_eq!(before.y.to_bits(), after.y.to_bits());
            }
            if !mask.z {
                prop_assert_eq!(before.z.to_bits(), after.z.to_bits());
            }
        }
    }

    #[test]
    fn test_every_plan_is_well_ordered(kind in smoothing_kind(), iterations in 1u32..5) {
        let mut settings = SmoothingSettings { kind, ..Default::default() };
        settings.bilateral.iterations = iterations;
        settings.gaussian.iterations = iterations;

        let steps = settings.strategy().plan(SurfaceSlot::Composite, SurfaceSlot::Composite, SurfaceSlot::Scratch);
        let filters = steps
            .iter()
            .filter(|s| matches!(s, fluid_surface::SmoothStep::Filter { .. }))
            .count() as u32;
        let expected = match kind {
            SmoothingKind::Bilateral2D => iterations,
            SmoothingKind::Gaussian | SmoothingKind::Bilateral1D => 2 * iterations,
        };
        prop_assert_eq!(filters, expected);
        prop_assert_eq!(steps.last().map(|s| s.writes()), Some(SurfaceSlot::Composite));
        for step in &steps {
            prop_assert_ne!(step.reads(), step.writes());
        }
    }
}
