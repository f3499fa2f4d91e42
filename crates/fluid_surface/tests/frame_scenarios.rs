//! Whole-frame scenarios run on the host executor.

use fluid_surface::params::names;
use fluid_surface::{
    DisplayMode, FluidPipeline, FramePlan, HostAllocator, HostExecutor, Pass, PassPrograms, RenderConfig,
    SimulationState, SmoothingKind, SurfaceSlot, Viewport, FAR_DEPTH,
};
use glam::{Mat4, Vec2, Vec3};

const VIEWPORT: Viewport = Viewport {
    width: 64,
    height: 64,
};

fn simulation(particle_count: u32) -> SimulationState {
    SimulationState {
        particle_count,
        bounds_size: Vec3::new(2.0, 2.0, 2.0),
        origin: Vec3::ZERO,
    }
}

/// A 10x10 sheet of particles in the middle of the bounds.
fn particle_sheet() -> Vec<Vec3> {
    (0..100)
        .map(|i| {
            let (col, row) = ((i % 10) as f32, (i / 10) as f32);
            Vec3::new(col / 9.0 - 0.5, 0.0, row / 9.0 - 0.5)
        })
        .collect()
}

fn pipeline(kind: SmoothingKind) -> FluidPipeline<HostAllocator> {
    let mut config = RenderConfig::default();
    config.smoothing.kind = kind;
    config.smoothing.bilateral.radius = 4;
    config.smoothing.bilateral.range_sigma = 0.1;
    config.material.depth_particle_size = 0.15;

    let mut pipeline = FluidPipeline::new(HostAllocator::new(), config);
    pipeline.set_programs(PassPrograms::all());
    pipeline
}

fn depth_matrices(plan: &FramePlan) -> (f32, Mat4, Mat4) {
    let Pass::DrawIndirect { params, .. } = &plan.passes()[1] else {
        panic!("second pass is not the particle draw");
    };
    (
        params.float(names::SCALE).unwrap(),
        params.mat4(names::VIEW).unwrap(),
        params.mat4(names::PROJ).unwrap(),
    )
}

#[test]
fn test_end_to_end_frame() {
    let mut pipeline = pipeline(SmoothingKind::Bilateral2D);
    let positions = particle_sheet();
    let plan = pipeline
        .prepare_frame(VIEWPORT, &simulation(100))
        .unwrap()
        .expect("all programs are set");

    assert_eq!(plan.len(), 5);
    assert_eq!(plan.pass_names(), vec!["clear", "draw", "pack", "smooth", "composite"]);
    assert_eq!(plan.validate_order(), Ok(()));
    assert_eq!(plan.draw_args.instance_count, 100);
    match &plan.passes()[3] {
        Pass::Smooth { kind, kernel, .. } => {
            assert_eq!(*kind, SmoothingKind::Bilateral2D);
            assert_eq!(kernel.radius, 4);
            assert_eq!(kernel.range_sigma, Some(0.1));
        }
        other => panic!("expected smooth pass, got {other:?}"),
    }

    let mut executor = HostExecutor::new();
    executor.execute(&plan, pipeline.resources_mut(), &positions).unwrap();

    // Every pixel clearly outside all particle discs still holds the clear
    // value; every pixel clearly inside one was drawn.
    let (scale, view, proj) = depth_matrices(&plan);
    let radius = scale * 0.5;
    let size = Vec2::new(VIEWPORT.width as f32, VIEWPORT.height as f32);
    let pixels_per_unit = Vec2::new(proj.x_axis.x, proj.y_axis.y) * size * 0.5;
    let centres: Vec<Vec2> = positions
        .iter()
        .map(|&p| {
            let ndc = (proj * view).project_point3(p);
            Vec2::new((ndc.x * 0.5 + 0.5) * size.x, (0.5 - ndc.y * 0.5) * size.y)
        })
        .collect();

    let depth = pipeline.resources().surface(SurfaceSlot::Depth).unwrap();
    let mut drawn = 0;
    for y in 0..VIEWPORT.height {
        for x in 0..VIEWPORT.width {
            let pixel = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let nearest = centres
                .iter()
                .map(|c| ((pixel - *c) / pixels_per_unit).length_squared())
                .fold(f32::MAX, f32::min);
            let value = depth.texel(x, y).x;
            if nearest > radius * radius * 1.1 {
                assert_eq!(value, FAR_DEPTH, "pixel ({x}, {y}) drawn outside every particle");
            } else if nearest < radius * radius * 0.9 {
                assert!(value < FAR_DEPTH, "pixel ({x}, {y}) inside a particle was not drawn");
                drawn += 1;
            }
        }
    }
    assert!(drawn > 0);
    assert_eq!(depth.texel(0, 0).x, FAR_DEPTH);

    let display = executor.display().unwrap();
    assert!(display
        .texels()
        .iter()
        .all(|t| t.is_finite() && t.w == 1.0 && t.x >= 0.0 && t.x <= 1.0));
}

#[test]
fn test_composite_surface_matches_depth_after_frame() {
    for kind in SmoothingKind::ALL {
        let mut pipeline = pipeline(kind);
        let plan = pipeline.prepare_frame(VIEWPORT, &simulation(100)).unwrap().unwrap();
        HostExecutor::new()
            .execute(&plan, pipeline.resources_mut(), &particle_sheet())
            .unwrap();

        let resources = pipeline.resources();
        let depth = resources.surface(SurfaceSlot::Depth).unwrap();
        let comp = resources.surface(SurfaceSlot::Composite).unwrap();
        for (d, c) in depth.texels().iter().zip(comp.texels()) {
            assert_eq!(d.x, c.w, "{kind:?}: depth channel altered");
            if d.x >= FAR_DEPTH {
                assert_eq!(c.x, 0.0, "{kind:?}: background picked up thickness");
            } else {
                assert!(c.x > 0.0 && c.x <= 1.0, "{kind:?}: thickness {}", c.x);
            }
        }
    }
}

#[test]
fn test_display_mode_scenario() {
    let mut pipeline = pipeline(SmoothingKind::Bilateral2D);
    assert_eq!(pipeline.display_mode(), DisplayMode::Composite);

    let mut bound = Vec::new();
    for digit in [1u8, 2, 0] {
        pipeline.handle_digit(digit);
        let plan = pipeline.prepare_frame(VIEWPORT, &simulation(100)).unwrap().unwrap();
        let Pass::Fullscreen { params, .. } = &plan.passes()[4] else {
            panic!("last pass is not the composite");
        };
        bound.push((pipeline.display_mode(), params.int(names::DEBUG_DISPLAY_MODE).unwrap()));
    }

    assert_eq!(
        bound,
        vec![
            (DisplayMode::Depth, 1),
            (DisplayMode::SmoothDepth, 2),
            (DisplayMode::Composite, 0),
        ]
    );
}

#[test]
fn test_debug_depth_view_shows_scaled_depth() {
    let mut pipeline = pipeline(SmoothingKind::Gaussian);
    pipeline.handle_digit(1);
    pipeline.config_mut().debug.depth_display_scale = 1.0e-3;

    let plan = pipeline.prepare_frame(VIEWPORT, &simulation(100)).unwrap().unwrap();
    let mut executor = HostExecutor::new();
    executor.execute(&plan, pipeline.resources_mut(), &particle_sheet()).unwrap();

    let comp = pipeline.resources().surface(SurfaceSlot::Composite).unwrap();
    let display = executor.display().unwrap();
    for (c, shown) in comp.texels().iter().zip(display.texels()) {
        let expected = (c.w * 1.0e-3).min(1.0);
        assert!((shown.x - expected).abs() < 1e-6);
    }
}

#[test]
fn test_smooth_depth_view_shows_smoothed_thickness() {
    let mut pipeline = pipeline(SmoothingKind::Bilateral1D);
    pipeline.handle_digit(2);
    pipeline.config_mut().debug.depth_display_scale = 0.5;

    let plan = pipeline.prepare_frame(VIEWPORT, &simulation(100)).unwrap().unwrap();
    let mut executor = HostExecutor::new();
    executor.execute(&plan, pipeline.resources_mut(), &particle_sheet()).unwrap();

    let comp = pipeline.resources().surface(SurfaceSlot::Composite).unwrap();
    let display = executor.display().unwrap();
    let mut covered = 0;
    for (c, shown) in comp.texels().iter().zip(display.texels()) {
        assert!((shown.x - (c.x * 0.5).min(1.0)).abs() < 1e-6);
        if c.w < FAR_DEPTH {
            covered += 1;
        } else {
            assert_eq!(shown.x, 0.0);
        }
    }
    assert!(covered > 0);
}

#[test]
fn test_resize_between_frames_reallocates_once() {
    let mut pipeline = pipeline(SmoothingKind::Bilateral1D);
    pipeline.prepare_frame(VIEWPORT, &simulation(100)).unwrap();
    assert_eq!(pipeline.last_reallocation().count(), 4);

    pipeline.prepare_frame(VIEWPORT, &simulation(100)).unwrap();
    assert!(!pipeline.last_reallocation().any());

    let smaller = Viewport::new(32, 16);
    let plan = pipeline.prepare_frame(smaller, &simulation(100)).unwrap().unwrap();
    let realloc = pipeline.last_reallocation();
    assert!(realloc.depth && realloc.composite && realloc.scratch && !realloc.args);
    assert_eq!(plan.viewport, smaller);

    let mut executor = HostExecutor::new();
    executor.execute(&plan, pipeline.resources_mut(), &particle_sheet()).unwrap();
    let display = executor.display().unwrap();
    assert_eq!((display.width(), display.height()), (32, 16));
}
