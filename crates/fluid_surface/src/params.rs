//! Named, typed shader parameters and the program handles they bind to.

use glam::{Mat4, Vec3, Vec4};

use crate::surface::{BufferSlot, SurfaceSlot};

/// Parameter names shared by the binder and the backends.
pub mod names {
    pub const POSITIONS: &str = "positions";
    pub const SCALE: &str = "scale";
    pub const VIEW: &str = "view";
    pub const PROJ: &str = "proj";

    pub const DEPTH: &str = "depth";

    pub const COMP: &str = "comp";
    pub const DEBUG_DISPLAY_MODE: &str = "debug_display_mode";
    pub const DEPTH_DISPLAY_SCALE: &str = "depth_display_scale";
    pub const BOUNDS_SIZE: &str = "bounds_size";
    pub const EXTINCTION_COEFFICIENTS: &str = "extinction_coefficients";
    pub const REFRACTION_MULTIPLIER: &str = "refraction_multiplier";
    pub const FLOOR_POS: &str = "floor_pos";
    pub const FLOOR_SIZE: &str = "floor_size";
    pub const TILE_COL1: &str = "tile_col1";
    pub const TILE_COL2: &str = "tile_col2";
    pub const TILE_COL3: &str = "tile_col3";
    pub const TILE_COL4: &str = "tile_col4";
    pub const TILE_COL_VARIATION: &str = "tile_col_variation";
    pub const TILE_SCALE: &str = "tile_scale";
    pub const TILE_DARK_OFFSET: &str = "tile_dark_offset";
    pub const INV_VIEW_PROJ: &str = "inv_view_proj";
    pub const CAMERA_FORWARD: &str = "camera_forward";
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
    Vec3(Vec3),
    Vec4(Vec4),
    /// Linear RGBA.
    Color(Vec4),
    Mat4(Mat4),
    Texture(SurfaceSlot),
    Buffer(BufferSlot),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Float(_) => "float",
            ParamValue::Int(_) => "int",
            ParamValue::Vec3(_) => "vec3",
            ParamValue::Vec4(_) => "vec4",
            ParamValue::Color(_) => "color",
            ParamValue::Mat4(_) => "mat4",
            ParamValue::Texture(_) => "texture",
            ParamValue::Buffer(_) => "buffer",
        }
    }
}

/// Parameters for one program, kept in insertion order. Rebuilt every frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(&'static str, ParamValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing an earlier value in place.
    pub fn set(&mut self, name: &'static str, value: ParamValue) -> &mut Self {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn vec3(&self, name: &str) -> Option<Vec3> {
        match self.get(name)? {
            ParamValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// Reads a `Vec4` or `Color` parameter.
    pub fn vec4(&self, name: &str) -> Option<Vec4> {
        match self.get(name)? {
            ParamValue::Vec4(v) | ParamValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    pub fn mat4(&self, name: &str) -> Option<Mat4> {
        match self.get(name)? {
            ParamValue::Mat4(m) => Some(*m),
            _ => None,
        }
    }

    pub fn texture(&self, name: &str) -> Option<SurfaceSlot> {
        match self.get(name)? {
            ParamValue::Texture(slot) => Some(*slot),
            _ => None,
        }
    }

    pub fn buffer(&self, name: &str) -> Option<BufferSlot> {
        match self.get(name)? {
            ParamValue::Buffer(slot) => Some(*slot),
            _ => None,
        }
    }

    /// Surfaces this set samples.
    pub fn textures(&self) -> impl Iterator<Item = SurfaceSlot> + '_ {
        self.entries.iter().filter_map(|(_, v)| match v {
            ParamValue::Texture(slot) => Some(*slot),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> + '_ {
        self.entries.iter().map(|(n, v)| (*n, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Programs of the fluid pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramRole {
    Depth,
    Pack,
    Composite,
}

/// Opaque handle to a compiled program. The id is assigned by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramHandle {
    pub role: ProgramRole,
    pub id: u32,
}

impl ProgramHandle {
    pub fn new(role: ProgramRole, id: u32) -> Self {
        Self { role, id }
    }
}

/// Cached program handles. A missing handle means the program is not ready
/// yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassPrograms {
    pub depth: Option<ProgramHandle>,
    pub pack: Option<ProgramHandle>,
    pub composite: Option<ProgramHandle>,
}

impl PassPrograms {
    /// All three programs with ids `0..3`.
    pub fn all() -> Self {
        Self {
            depth: Some(ProgramHandle::new(ProgramRole::Depth, 0)),
            pack: Some(ProgramHandle::new(ProgramRole::Pack, 1)),
            composite: Some(ProgramHandle::new(ProgramRole::Composite, 2)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut params = ParameterSet::new();
        params
            .set(names::SCALE, ParamValue::Float(1.0))
            .set(names::DEPTH, ParamValue::Texture(SurfaceSlot::Depth))
            .set(names::SCALE, ParamValue::Float(2.0));

        assert_eq!(params.len(), 2);
        assert_eq!(params.float(names::SCALE), Some(2.0));
        assert_eq!(params.iter().next().map(|(n, _)| n), Some(names::SCALE));
    }

    #[test]
    fn test_typed_getters_reject_wrong_type() {
        let mut params = ParameterSet::new();
        params
            .set(names::DEBUG_DISPLAY_MODE, ParamValue::Int(2))
            .set(names::TILE_COL1, ParamValue::Color(Vec4::ONE));

        assert_eq!(params.float(names::DEBUG_DISPLAY_MODE), None);
        assert_eq!(params.int(names::DEBUG_DISPLAY_MODE), Some(2));
        assert_eq!(params.vec4(names::TILE_COL1), Some(Vec4::ONE));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_textures_lists_sampled_surfaces() {
        let mut params = ParameterSet::new();
        params
            .set(names::COMP, ParamValue::Texture(SurfaceSlot::Composite))
            .set(names::POSITIONS, ParamValue::Buffer(BufferSlot::Positions));
        assert_eq!(params.textures().collect::<Vec<_>>(), vec![SurfaceSlot::Composite]);
    }
}
