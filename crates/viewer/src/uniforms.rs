//! Packing of named parameters into uniform buffers.
//!
//! Every field takes whole `vec4<f32>` slots so the WGSL structs need no
//! padding rules: scalars sit in `.x`, vectors fill `.xyz` or `.xyzw`, and a
//! matrix takes four column slots. Integers are stored as floats.

use bytemuck::{Pod, Zeroable};
use fluid_surface::{ChannelMask, FilterAxis, KernelParams, ParamValue, ParameterSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Vector,
    Matrix,
}

impl FieldKind {
    fn slots(self) -> usize {
        match self {
            FieldKind::Scalar | FieldKind::Vector => 1,
            FieldKind::Matrix => 4,
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldKind::Scalar => "scalar",
            FieldKind::Vector => "vector",
            FieldKind::Matrix => "matrix",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformField {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl UniformField {
    pub const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Scalar,
        }
    }

    pub const fn vector(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Vector,
        }
    }

    pub const fn matrix(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Matrix,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    #[error("parameter `{name}` is not set")]
    Missing { name: &'static str },
    #[error("parameter `{name}` is a {found}, the program expects a {expected}")]
    TypeMismatch {
        name: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// Field order of one program's uniform struct.
#[derive(Clone, Copy, Debug)]
pub struct UniformLayout {
    pub fields: &'static [UniformField],
}

impl UniformLayout {
    pub const fn new(fields: &'static [UniformField]) -> Self {
        Self { fields }
    }

    pub fn slot_count(&self) -> usize {
        self.fields.iter().map(|f| f.kind.slots()).sum()
    }

    pub fn byte_size(&self) -> u64 {
        (self.slot_count() * 16) as u64
    }

    /// Writes `params` in field order. Parameters the layout does not name
    /// (textures, buffers) are ignored.
    pub fn pack(&self, params: &ParameterSet) -> Result<Vec<[f32; 4]>, BindError> {
        let mut slots = Vec::with_capacity(self.slot_count());
        for field in self.fields {
            let value = params.get(field.name).ok_or(BindError::Missing { name: field.name })?;
            let mismatch = || BindError::TypeMismatch {
                name: field.name,
                expected: field.kind.name(),
                found: value.type_name(),
            };
            match (field.kind, *value) {
                (FieldKind::Scalar, ParamValue::Float(v)) => slots.push([v, 0.0, 0.0, 0.0]),
                (FieldKind::Scalar, ParamValue::Int(v)) => slots.push([v as f32, 0.0, 0.0, 0.0]),
                (FieldKind::Vector, ParamValue::Vec3(v)) => slots.push(v.extend(0.0).to_array()),
                (FieldKind::Vector, ParamValue::Vec4(v) | ParamValue::Color(v)) => slots.push(v.to_array()),
                (FieldKind::Matrix, ParamValue::Mat4(m)) => slots.extend(m.to_cols_array_2d()),
                _ => return Err(mismatch()),
            }
        }
        Ok(slots)
    }
}

/// Uniforms of one smoothing filter step.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FilterUniforms {
    /// Pixel step in `xy`; `z` is 1 for a full 2D neighbourhood.
    pub axis: [f32; 4],
    pub mask: [f32; 4],
    /// `radius, spatial_sigma, range_sigma, use_range`.
    pub kernel: [f32; 4],
}

impl FilterUniforms {
    pub fn new(axis: FilterAxis, kernel: &KernelParams, mask: ChannelMask) -> Self {
        let step = axis.step();
        let both = matches!(axis, FilterAxis::Both);
        let (range_sigma, use_range) = match kernel.range_sigma {
            Some(sigma) => (sigma, 1.0),
            None => (0.0, 0.0),
        };
        Self {
            axis: [step.x as f32, step.y as f32, both as u32 as f32, 0.0],
            mask: mask.as_vec4().to_array(),
            kernel: [kernel.radius as f32, kernel.spatial_sigma, range_sigma, use_range],
        }
    }
}
