use std::f32::consts::{PI, TAU};

pub const EPSILON: f32 = 5e-04;
pub const INFINITY: f32 = f32::INFINITY;

/// Relative luminance of a linear Rec. 709 colour
pub fn luminance(rgb: glam::Vec3A) -> f32 { glam::Vec3A::dot(rgb, glam::Vec3A::new(0.2126, 0.7152, 0.0722)) }

/// Builds a unit direction from the cosine of its polar angle (measured from +Y) and its azimuth
pub fn spherical_direction(cos_theta: f32, phi: f32) -> glam::Vec3A
{
    let cos_theta: f32 = cos_theta.clamp(-1.0, 1.0);
    let sin_theta: f32 = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

    glam::Vec3A::new(sin_theta * phi.sin(), cos_theta, sin_theta * phi.cos())
}

/// Equirectangular projection of a direction, `u` wraps around +Y and `v` runs from +Y (0) to -Y (1)
pub fn direction_to_uv(direction: glam::Vec3A) -> glam::Vec2
{
    let d: glam::Vec3A = direction.normalize();

    let u: f32 = d.x.atan2(d.z).mul_add(std::f32::consts::FRAC_1_PI * 0.5, 0.5);
    let v: f32 = d.y.clamp(-1.0, 1.0).acos() * std::f32::consts::FRAC_1_PI;

    glam::Vec2::new(u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
}

/// Inverse of [`direction_to_uv`]
pub fn uv_to_direction(uv: glam::Vec2) -> glam::Vec3A
{
    let theta: f32 = PI * uv.y;
    let phi: f32 = TAU * uv.x - PI;

    spherical_direction(theta.cos(), phi)
}

/// Solid angle covered by one texel of row `row` in a `columns` x `rows` equirectangular image
pub fn texel_solid_angle(row: usize, rows: usize, columns: usize) -> f32
{
    let (cos_top, cos_bottom): (f32, f32) = row_cosines(row, rows);
    (TAU / columns as f32) * (cos_top - cos_bottom)
}

/// Cosines of the polar angle at the top and bottom edges of an image row
pub fn row_cosines(row: usize, rows: usize) -> (f32, f32)
{
    let top: f32 = PI * row as f32 / rows as f32;
    let bottom: f32 = PI * (row + 1) as f32 / rows as f32;

    (top.cos(), bottom.cos())
}
