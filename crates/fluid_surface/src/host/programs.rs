//! CPU versions of the depth, pack and composite programs.

use glam::{IVec2, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};
use rayon::prelude::*;

use super::ExecuteError;
use crate::params::{names, ParameterSet};
use crate::surface::{is_background, Surface};

/// Background colour where the view ray misses the floor.
pub const SKY_COLOUR: Vec3 = Vec3::new(0.62, 0.76, 0.92);

/// A particle projected to screen space.
#[derive(Clone, Copy, Debug)]
struct Splat {
    center: Vec2,
    depth: f32,
    /// Radius in pixels along x and y.
    extent: Vec2,
}

/// Depth program parameters.
pub struct DepthParams {
    pub scale: f32,
    pub view: Mat4,
    pub proj: Mat4,
}

impl DepthParams {
    pub fn from_params(params: &ParameterSet) -> Result<Self, ExecuteError> {
        Ok(Self {
            scale: require(params.float(names::SCALE), "draw", names::SCALE)?,
            view: require(params.mat4(names::VIEW), "draw", names::VIEW)?,
            proj: require(params.mat4(names::PROJ), "draw", names::PROJ)?,
        })
    }
}

/// Draws each particle as a view-facing sphere of diameter `scale`,
/// keeping the nearest linear depth per pixel.
pub fn splat_depth(target: &mut Surface, positions: &[Vec3], params: &DepthParams) {
    let width = target.width() as usize;
    let size = Vec2::new(target.width() as f32, target.height() as f32);
    let radius = params.scale * 0.5;
    let pixels_per_unit = Vec2::new(params.proj.x_axis.x, params.proj.y_axis.y) * size * 0.5;

    let splats: Vec<Splat> = positions
        .iter()
        .filter_map(|&p| {
            let view_pos = params.view.transform_point3(p);
            let ndc = params.proj.project_point3(view_pos);
            if !(0.0..=1.0).contains(&ndc.z) {
                return None;
            }
            Some(Splat {
                center: Vec2::new((ndc.x * 0.5 + 0.5) * size.x, (0.5 - ndc.y * 0.5) * size.y),
                depth: -view_pos.z,
                extent: pixels_per_unit.abs() * radius,
            })
        })
        .collect();

    target
        .texels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let py = y as f32 + 0.5;
            for splat in &splats {
                if (py - splat.center.y).abs() > splat.extent.y {
                    continue;
                }
                let x0 = (splat.center.x - splat.extent.x).floor().max(0.0) as usize;
                let x1 = ((splat.center.x + splat.extent.x).ceil().max(0.0) as usize).min(width);
                for (x, texel) in row.iter_mut().enumerate().take(x1).skip(x0) {
                    let px = x as f32 + 0.5;
                    let offset = Vec2::new(
                        (px - splat.center.x) / pixels_per_unit.x,
                        (py - splat.center.y) / pixels_per_unit.y,
                    );
                    let d2 = offset.length_squared();
                    if d2 > radius * radius {
                        continue;
                    }
                    let depth = splat.depth - (radius * radius - d2).sqrt();
                    if depth < texel.x {
                        texel.x = depth;
                    }
                }
            }
        });
}

/// Packs `(thickness, thickness, thickness, depth)`. Thickness is the
/// covered fraction of the 3x3 neighbourhood, zero on background.
pub fn pack(depth: &Surface, comp: &mut Surface) {
    let width = comp.width() as usize;
    comp.texels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let (x, y) = (x as i32, y as i32);
                let d = depth.texel_clamped(x, y).x;
                if is_background(d) {
                    *out = Vec4::new(0.0, 0.0, 0.0, d);
                    continue;
                }
                let mut covered = 0;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if !is_background(depth.texel_clamped(x + dx, y + dy).x) {
                            covered += 1;
                        }
                    }
                }
                let thickness = covered as f32 / 9.0;
                *out = Vec4::new(thickness, thickness, thickness, d);
            }
        });
}

/// Composite program parameters.
#[derive(Clone, Debug)]
pub struct CompositeParams {
    pub display_mode: i32,
    pub depth_display_scale: f32,
    pub extinction: Vec3,
    pub refraction_multiplier: f32,
    pub floor_pos: Vec3,
    pub floor_size: Vec3,
    pub tile_colours: [Vec3; 4],
    pub tile_col_variation: Vec3,
    pub tile_scale: f32,
    pub tile_dark_offset: f32,
    pub inv_view_proj: Mat4,
    pub camera_forward: Vec3,
}

impl CompositeParams {
    pub fn from_params(params: &ParameterSet) -> Result<Self, ExecuteError> {
        const PASS: &str = "composite";
        let colour = |name: &'static str| require(params.vec4(name), PASS, name).map(|c| c.xyz());
        Ok(Self {
            display_mode: require(params.int(names::DEBUG_DISPLAY_MODE), PASS, names::DEBUG_DISPLAY_MODE)?,
            depth_display_scale: require(params.float(names::DEPTH_DISPLAY_SCALE), PASS, names::DEPTH_DISPLAY_SCALE)?,
            extinction: require(params.vec3(names::EXTINCTION_COEFFICIENTS), PASS, names::EXTINCTION_COEFFICIENTS)?,
            refraction_multiplier: require(params.float(names::REFRACTION_MULTIPLIER), PASS, names::REFRACTION_MULTIPLIER)?,
            floor_pos: require(params.vec3(names::FLOOR_POS), PASS, names::FLOOR_POS)?,
            floor_size: require(params.vec3(names::FLOOR_SIZE), PASS, names::FLOOR_SIZE)?,
            tile_colours: [
                colour(names::TILE_COL1)?,
                colour(names::TILE_COL2)?,
                colour(names::TILE_COL3)?,
                colour(names::TILE_COL4)?,
            ],
            tile_col_variation: require(params.vec3(names::TILE_COL_VARIATION), PASS, names::TILE_COL_VARIATION)?,
            tile_scale: require(params.float(names::TILE_SCALE), PASS, names::TILE_SCALE)?,
            tile_dark_offset: require(params.float(names::TILE_DARK_OFFSET), PASS, names::TILE_DARK_OFFSET)?,
            inv_view_proj: require(params.mat4(names::INV_VIEW_PROJ), PASS, names::INV_VIEW_PROJ)?,
            camera_forward: require(params.vec3(names::CAMERA_FORWARD), PASS, names::CAMERA_FORWARD)?,
        })
    }
}

/// Shades the packed surface into `display`.
pub fn composite(comp: &Surface, display: &mut Surface, params: &CompositeParams) {
    let width = display.width() as usize;
    let size = Vec2::new(display.width() as f32, display.height() as f32);
    let texel_ndc = Vec2::new(2.0, -2.0) / size;

    display
        .texels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let (xi, yi) = (x as i32, y as i32);
                let texel = comp.texel_clamped(xi, yi);

                let colour = match params.display_mode {
                    1 => Vec3::splat((texel.w * params.depth_display_scale).min(1.0)),
                    2 => Vec3::splat((texel.x * params.depth_display_scale).min(1.0)),
                    _ => {
                        let ndc = Vec2::new((x as f32 + 0.5) / size.x * 2.0 - 1.0, 1.0 - (y as f32 + 0.5) / size.y * 2.0);
                        if is_background(texel.w) {
                            environment(ndc, params)
                        } else {
                            let gradient = depth_gradient(comp, IVec2::new(xi, yi), texel.w);
                            let refracted = ndc + gradient * texel_ndc * params.refraction_multiplier;
                            let optical_depth = params.extinction * texel.x;
                            let transmittance = Vec3::new(
                                (-optical_depth.x).exp(),
                                (-optical_depth.y).exp(),
                                (-optical_depth.z).exp(),
                            );
                            environment(refracted, params) * transmittance
                        }
                    }
                };
                *out = colour.extend(1.0);
            }
        });
}

/// Central difference of channel `w`, ignoring background neighbours.
fn depth_gradient(comp: &Surface, pixel: IVec2, center: f32) -> Vec2 {
    let sample = |offset: IVec2| {
        let p = pixel + offset;
        let d = comp.texel_clamped(p.x, p.y).w;
        if is_background(d) {
            center
        } else {
            d
        }
    };
    Vec2::new(
        (sample(IVec2::X) - sample(-IVec2::X)) * 0.5,
        (sample(IVec2::Y) - sample(-IVec2::Y)) * 0.5,
    )
}

/// Colour seen along the view ray through `ndc`: the tiled floor if the ray
/// hits its top face, sky otherwise.
pub fn environment(ndc: Vec2, params: &CompositeParams) -> Vec3 {
    let origin = params.inv_view_proj.project_point3(ndc.extend(0.0));
    let dir = params.camera_forward;
    if dir.y > -1e-6 {
        return SKY_COLOUR;
    }
    let top = params.floor_pos.y + params.floor_size.y * 0.5;
    let t = (top - origin.y) / dir.y;
    if t < 0.0 {
        return SKY_COLOUR;
    }
    let hit = origin + dir * t;
    let local = Vec2::new(hit.x - params.floor_pos.x, hit.z - params.floor_pos.z);
    if local.x.abs() > params.floor_size.x * 0.5 || local.y.abs() > params.floor_size.z * 0.5 {
        return SKY_COLOUR;
    }
    tile_colour(local, params)
}

/// Floor colour at `local` (floor-relative xz): one base colour per
/// quadrant, every other tile darkened, and a per-tile jitter.
pub fn tile_colour(local: Vec2, params: &CompositeParams) -> Vec3 {
    let cell = (local * params.tile_scale).floor().as_ivec2();
    let quadrant = (local.x >= 0.0) as usize + 2 * (local.y >= 0.0) as usize;
    let mut colour = params.tile_colours[quadrant];
    if (cell.x + cell.y) & 1 == 1 {
        colour -= Vec3::splat(params.tile_dark_offset);
    }
    let seed = hash(cell.x as u32 ^ hash(cell.y as u32));
    let jitter = Vec3::new(
        unit_signed(hash(seed)),
        unit_signed(hash(seed.wrapping_add(1))),
        unit_signed(hash(seed.wrapping_add(2))),
    );
    (colour + jitter * params.tile_col_variation).clamp(Vec3::ZERO, Vec3::ONE)
}

/// Integer hash, identical to the WGSL composite shader's.
#[inline]
pub fn hash(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

#[inline]
fn unit_signed(h: u32) -> f32 {
    h as f32 / u32::MAX as f32 * 2.0 - 1.0
}

fn require<T>(value: Option<T>, pass: &'static str, name: &'static str) -> Result<T, ExecuteError> {
    value.ok_or(ExecuteError::MissingParameter { pass, name })
}
