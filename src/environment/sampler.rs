//! Importance sampling of equirectangular environments.
//!
//! Both variants distribute directions uniformly in solid angle inside the spherical patch of the
//! chosen texel: longitude is linear and `cos(theta)` is linear within the texel row. The density of
//! a direction is therefore `P(texel) / solid_angle(texel)`, which divides the polar weighting applied
//! while building the structure back out.

use log::{debug, warn};

pub use pyramid::ImportancePyramid;
pub use table::ImportanceTable;

use crate::error::{Error, Result};
use crate::image_helper::PixelBuffer;
use crate::utility::{row_cosines, spherical_direction, texel_solid_angle};

pub mod pyramid;
pub mod table;

/// Largest `f32` strictly below one
pub const ONE_MINUS_EPSILON: f32 = 1.0 - f32::EPSILON / 2.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SamplerKind
{
    /// Marginal row CDF and conditional column CDFs, sampled by binary search
    #[default]
    Table,
    /// Luminance reduction chain, sampled by hierarchical descent
    Pyramid,
}

/// Direction drawn from an environment and its solid angle density
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EnvironmentSample
{
    pub direction: glam::Vec3A,
    pub pdf: f32,
}

/// Importance of a luminance value: negative, NaN and infinite values carry no weight
pub(crate) fn texel_weight(value: f32) -> f32
{
    if value.is_finite()
    {
        value.max(0.0)
    }
    else
    {
        0.0
    }
}

/// Normalized CDF of `weights` with `n + 2` entries.
///
/// `[0]` is zero, `[i]` is the sum of the first `i` weights divided by the total, and `[n + 1]` keeps the
/// un-normalized total. Weights go through [`texel_weight`]. A zero total leaves the CDF all zero.
pub fn cdf_1d(weights: &[f32]) -> (Vec<f32>, f32)
{
    let n: usize = weights.len();
    let mut cdf: Vec<f32> = vec![0.0; n + 2];

    let mut running: f64 = 0.0;
    for (i, &weight) in weights.iter().enumerate()
    {
        running += texel_weight(weight) as f64;
        cdf[i + 1] = running as f32;
    }

    let total: f32 = running as f32;
    cdf[n + 1] = total;

    if total > 0.0
    {
        let inv_total: f64 = 1.0 / running;
        cdf[1..=n].iter_mut().for_each(|c| *c = (*c as f64 * inv_total) as f32);
        cdf[n] = 1.0;
    }

    (cdf, total)
}

/// Inverts a CDF built by [`cdf_1d`]: the interval containing `u`, the position of `u` inside it and the
/// interval's probability mass
pub(crate) fn sample_cdf(cdf: &[f32], u: f32) -> (usize, f32, f32)
{
    let n: usize = cdf.len() - 2;
    let u: f32 = u.clamp(0.0, ONE_MINUS_EPSILON);

    let index: usize = cdf[..=n].partition_point(|&c| c <= u).saturating_sub(1).min(n - 1);
    let mass: f32 = cdf[index + 1] - cdf[index];

    let fraction: f32 = if mass > 0.0
    {
        ((u - cdf[index]) / mass).clamp(0.0, ONE_MINUS_EPSILON)
    }
    else
    {
        0.5
    };

    (index, fraction, mass)
}

/// Direction at fractional position `offset` inside texel `(x, y)` of a `columns` x `rows` panorama,
/// uniform in solid angle over the texel
pub(crate) fn texel_direction(x: usize, y: usize, offset: glam::Vec2, columns: usize, rows: usize) -> glam::Vec3A
{
    let (cos_top, cos_bottom): (f32, f32) = row_cosines(y, rows);

    let phi: f32 = std::f32::consts::TAU * (x as f32 + offset.x) / columns as f32 - std::f32::consts::PI;
    let cos_theta: f32 = cos_top + (cos_bottom - cos_top) * offset.y;

    spherical_direction(cos_theta, phi)
}

/// Solid angle density of a direction inside texel `(x, y)` chosen with probability `probability`
pub(crate) fn texel_density(probability: f32, y: usize, columns: usize, rows: usize) -> f32
{
    let solid_angle: f32 = texel_solid_angle(y, rows, columns);

    if probability > 0.0 && solid_angle > 0.0
    {
        probability / solid_angle
    }
    else
    {
        0.0
    }
}

/// Texel of a `columns` x `rows` panorama containing equirectangular coordinates `uv`
pub(crate) fn texel_at(uv: glam::Vec2, columns: usize, rows: usize) -> (usize, usize)
{
    let x: usize = ((uv.x * columns as f32) as usize).min(columns - 1);
    let y: usize = ((uv.y * rows as f32) as usize).min(rows - 1);

    (x, y)
}

pub enum ImportanceSampler
{
    Table(ImportanceTable),
    Pyramid(ImportancePyramid),
}

impl ImportanceSampler
{
    /// Builds the sampling structure of a radiance image
    pub fn build_from_image(image: &PixelBuffer, kind: SamplerKind) -> Result<Self>
    {
        if image.is_empty()
        {
            return Err(Error::EmptyImage {
                width: image.width(),
                height: image.height(),
                channels: image.channels(),
            });
        }

        let timer: std::time::Instant = std::time::Instant::now();

        let sampler: Self = match kind
        {
            SamplerKind::Table => Self::Table(ImportanceTable::new(image)),
            SamplerKind::Pyramid => Self::Pyramid(ImportancePyramid::new(image)?),
        };

        if sampler.total_weight() <= 0.0
        {
            warn!("Environment carries no light, every sample has zero density");
        }

        let (columns, rows): (u32, u32) = sampler.resolution();
        debug!("{:?} sampler {}x{}: \t{:?}", kind, columns, rows, timer.elapsed());

        Ok(sampler)
    }

    pub fn kind(&self) -> SamplerKind
    {
        match self
        {
            Self::Table(_) => SamplerKind::Table,
            Self::Pyramid(_) => SamplerKind::Pyramid,
        }
    }

    /// Columns and rows of the texel grid directions are sampled from
    pub fn resolution(&self) -> (u32, u32)
    {
        match self
        {
            Self::Table(table) => (table.width(), table.height()),
            Self::Pyramid(pyramid) => (pyramid.side(), pyramid.side()),
        }
    }

    /// Un-normalized sum of the weight field, zero for an environment without light
    pub fn total_weight(&self) -> f32
    {
        match self
        {
            Self::Table(table) => table.total_weight(),
            Self::Pyramid(pyramid) => pyramid.total_weight(),
        }
    }

    /// Probability of choosing texel `(x, y)` of the sampling grid
    pub fn texel_probability(&self, x: usize, y: usize) -> f32
    {
        match self
        {
            Self::Table(table) => table.texel_probability(x, y),
            Self::Pyramid(pyramid) => pyramid.texel_probability(x, y),
        }
    }

    /// Draws a direction for `u` in `[0, 1)^2`
    pub fn sample(&self, u: glam::Vec2) -> EnvironmentSample
    {
        match self
        {
            Self::Table(table) => table.sample(u),
            Self::Pyramid(pyramid) => pyramid.sample(u),
        }
    }

    /// Density with respect to solid angle of sampling `direction`
    pub fn pdf(&self, direction: glam::Vec3A) -> f32
    {
        match self
        {
            Self::Table(table) => table.pdf(direction),
            Self::Pyramid(pyramid) => pyramid.pdf(direction),
        }
    }
}
