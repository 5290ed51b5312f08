use rayon::prelude::*;

use crate::environment::sampler::{cdf_1d, sample_cdf, texel_at, texel_density, texel_direction, texel_weight, EnvironmentSample};
use crate::image_helper::PixelBuffer;
use crate::utility::{direction_to_uv, luminance, row_cosines, uv_to_direction};

/// Marginal/conditional CDF pair over the texels of an equirectangular image.
///
/// Texel weights are luminance times the solid angle of the texel row, so the table alone is enough
/// to sample proportionally to radiance over the sphere.
pub struct ImportanceTable
{
    width: u32,
    height: u32,
    /// `height` conditional CDFs of `width + 2` entries, back to back
    conditional: Vec<f32>,
    /// CDF of the row sums, `height + 2` entries
    marginal: Vec<f32>,
}

impl ImportanceTable
{
    pub fn new(image: &PixelBuffer) -> Self
    {
        let width: usize = image.width() as usize;
        let height: usize = image.height() as usize;

        let rows: Vec<(Vec<f32>, f32)> = (0..height)
            .into_par_iter()
            .map(|y: usize| {
                let (cos_top, cos_bottom): (f32, f32) = row_cosines(y, height);
                let row_weight: f32 = cos_top - cos_bottom;

                let weights: Vec<f32> = (0..width)
                    .map(|x: usize| texel_weight(luminance(image.rgb(x as u32, y as u32))) * row_weight)
                    .collect();

                cdf_1d(&weights)
            })
            .collect();

        let row_sums: Vec<f32> = rows.iter().map(|(_, total)| *total).collect();
        let (marginal, _): (Vec<f32>, f32) = cdf_1d(&row_sums);

        let conditional: Vec<f32> = rows.into_iter().flat_map(|(cdf, _)| cdf).collect();

        Self {
            width: width as u32,
            height: height as u32,
            conditional,
            marginal,
        }
    }

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }

    /// Column CDF of row `row`
    pub fn conditional_cdf(&self, row: usize) -> &[f32]
    {
        let stride: usize = self.width as usize + 2;
        &self.conditional[row * stride..(row + 1) * stride]
    }

    /// Row CDF
    pub fn marginal_cdf(&self) -> &[f32] { &self.marginal }

    pub fn total_weight(&self) -> f32 { self.marginal[self.height as usize + 1] }

    /// Conditional CDFs followed by the marginal CDF, the layout of the device storage buffer
    pub fn device_layout(&self) -> Vec<f32>
    {
        let mut layout: Vec<f32> = Vec::with_capacity(self.conditional.len() + self.marginal.len());
        layout.extend_from_slice(&self.conditional);
        layout.extend_from_slice(&self.marginal);
        layout
    }

    pub fn texel_probability(&self, x: usize, y: usize) -> f32
    {
        let conditional: &[f32] = self.conditional_cdf(y);
        (self.marginal[y + 1] - self.marginal[y]) * (conditional[x + 1] - conditional[x])
    }

    pub fn sample(&self, u: glam::Vec2) -> EnvironmentSample
    {
        if self.total_weight() <= 0.0
        {
            return EnvironmentSample {
                direction: uv_to_direction(u.clamp(glam::Vec2::ZERO, glam::Vec2::ONE)),
                pdf: 0.0,
            };
        }

        let (y, dy, row_probability): (usize, f32, f32) = sample_cdf(&self.marginal, u.y);
        let (x, dx, column_probability): (usize, f32, f32) = sample_cdf(self.conditional_cdf(y), u.x);

        let (width, height): (usize, usize) = (self.width as usize, self.height as usize);

        EnvironmentSample {
            direction: texel_direction(x, y, glam::Vec2::new(dx, dy), width, height),
            pdf: texel_density(row_probability * column_probability, y, width, height),
        }
    }

    pub fn pdf(&self, direction: glam::Vec3A) -> f32
    {
        if self.total_weight() <= 0.0
        {
            return 0.0;
        }

        let (width, height): (usize, usize) = (self.width as usize, self.height as usize);
        let (x, y): (usize, usize) = texel_at(direction_to_uv(direction), width, height);

        texel_density(self.texel_probability(x, y), y, width, height)
    }
}
