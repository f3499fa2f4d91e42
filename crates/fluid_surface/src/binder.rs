//! Per-frame parameter binding for the depth, pack and composite programs.

use glam::Vec3;

use crate::camera::OrthoCamera;
use crate::config::{EnvironmentSettings, FluidMaterial};
use crate::display::DisplayMode;
use crate::params::{names, ParamValue, ParameterSet, PassPrograms};
use crate::surface::{BufferSlot, SurfaceSlot, Viewport};

/// Size of the floor slab drawn beneath the simulation bounds.
pub const FLOOR_SIZE: Vec3 = Vec3::new(30.0, 0.05, 30.0);

/// What the simulation hands the renderer each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationState {
    pub particle_count: u32,
    /// Size of the simulation's bounding box.
    pub bounds_size: Vec3,
    /// World position of the bounding box centre.
    pub origin: Vec3,
}

impl SimulationState {
    /// Centre of the floor slab, whose top face sits on the bottom of the
    /// bounds.
    pub fn floor_position(&self) -> Vec3 {
        let height = -self.bounds_size.y / 2.0 + self.origin.y - FLOOR_SIZE.y / 2.0;
        Vec3::new(0.0, height, 0.0)
    }
}

/// Debug view state read by the composite program.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayState {
    pub mode: DisplayMode,
    pub depth_display_scale: f32,
}

/// Camera state for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub camera: OrthoCamera,
    pub viewport: Viewport,
}

/// Parameter sets for one frame. `None` where the program is not ready.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameBindings {
    pub depth: Option<ParameterSet>,
    pub pack: Option<ParameterSet>,
    pub composite: Option<ParameterSet>,
}

impl FrameBindings {
    pub fn is_complete(&self) -> bool {
        self.depth.is_some() && self.pack.is_some() && self.composite.is_some()
    }
}

/// Builds this frame's parameters. Programs without a handle are skipped.
pub fn bind(
    programs: &PassPrograms,
    simulation: &SimulationState,
    environment: &EnvironmentSettings,
    display: &DisplayState,
    material: &FluidMaterial,
    view: &ViewState,
) -> FrameBindings {
    let aspect = view.viewport.aspect();
    let view_matrix = view.camera.view_matrix();
    let proj = view.camera.projection_matrix(aspect);

    let depth = programs.depth.map(|_| {
        let mut params = ParameterSet::new();
        params
            .set(names::POSITIONS, ParamValue::Buffer(BufferSlot::Positions))
            .set(names::SCALE, ParamValue::Float(material.depth_particle_size))
            .set(names::VIEW, ParamValue::Mat4(view_matrix))
            .set(names::PROJ, ParamValue::Mat4(proj));
        params
    });

    let pack = programs.pack.map(|_| {
        let mut params = ParameterSet::new();
        params.set(names::DEPTH, ParamValue::Texture(SurfaceSlot::Depth));
        params
    });

    let composite = programs.composite.map(|_| {
        let mut params = ParameterSet::new();
        params
            .set(names::COMP, ParamValue::Texture(SurfaceSlot::Composite))
            .set(names::DEBUG_DISPLAY_MODE, ParamValue::Int(display.mode.ordinal()))
            .set(names::DEPTH_DISPLAY_SCALE, ParamValue::Float(display.depth_display_scale))
            .set(names::BOUNDS_SIZE, ParamValue::Vec3(simulation.bounds_size))
            .set(
                names::EXTINCTION_COEFFICIENTS,
                ParamValue::Vec3(material.scaled_extinction()),
            )
            .set(names::REFRACTION_MULTIPLIER, ParamValue::Float(material.refraction_multiplier))
            .set(names::FLOOR_POS, ParamValue::Vec3(simulation.floor_position()))
            .set(names::FLOOR_SIZE, ParamValue::Vec3(FLOOR_SIZE))
            .set(names::TILE_COL1, ParamValue::Color(environment.tile_col1))
            .set(names::TILE_COL2, ParamValue::Color(environment.tile_col2))
            .set(names::TILE_COL3, ParamValue::Color(environment.tile_col3))
            .set(names::TILE_COL4, ParamValue::Color(environment.tile_col4))
            .set(names::TILE_COL_VARIATION, ParamValue::Vec3(environment.tile_col_variation))
            .set(names::TILE_SCALE, ParamValue::Float(environment.tile_scale))
            .set(names::TILE_DARK_OFFSET, ParamValue::Float(environment.tile_dark_offset))
            .set(names::INV_VIEW_PROJ, ParamValue::Mat4((proj * view_matrix).inverse()))
            .set(names::CAMERA_FORWARD, ParamValue::Vec3(view.camera.forward()));
        params
    });

    FrameBindings { depth, pack, composite }
}
