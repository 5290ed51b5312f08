use rayon::prelude::*;

use crate::environment::sampler::{texel_at, texel_density, texel_direction, texel_weight, EnvironmentSample, ONE_MINUS_EPSILON};
use crate::error::{Error, Result};
use crate::image_helper::PixelBuffer;
use crate::utility::{direction_to_uv, luminance, uv_to_direction};

/// Square luminance image with its full reduction chain.
///
/// Level 0 has side `min(width, height)` and holds the luminance of strided source pixels, weighted by
/// `sin(theta)` at the centre of each base texel. Every further level stores 2x2 sums of the level below down to a single texel, an odd trailing
/// row or column is folded into the last parent so each level sums to the same total.
pub struct ImportancePyramid
{
    side: u32,
    levels: Vec<Vec<f32>>,
}

fn level_side(side: u32, level: usize) -> usize { (side as usize >> level).max(1) }

/// Children of parent texel `parent` along one axis
fn child_range(parent: usize, parent_side: usize, child_side: usize) -> std::ops::Range<usize>
{
    let end: usize = if parent + 1 == parent_side { child_side } else { 2 * parent + 2 };
    2 * parent..end
}

/// Picks an entry proportionally to `weights` and remaps `u` into the chosen entry
fn pick(weights: &[f32], u: f32) -> (usize, f32)
{
    let total: f32 = weights.iter().sum();
    let target: f32 = u * total;

    let mut running: f32 = 0.0;
    let mut last_positive: usize = 0;

    for (i, &weight) in weights.iter().enumerate()
    {
        if weight > 0.0
        {
            if target < running + weight
            {
                return (i, ((target - running) / weight).clamp(0.0, ONE_MINUS_EPSILON));
            }
            last_positive = i;
        }
        running += weight;
    }

    (last_positive, ONE_MINUS_EPSILON)
}

impl ImportancePyramid
{
    pub fn new(image: &PixelBuffer) -> Result<Self>
    {
        let (width, height): (u32, u32) = (image.width(), image.height());
        let side: u32 = width.min(height);

        if width % side != 0 || height % side != 0
        {
            return Err(Error::NonMultipleDimensions { width, height, side });
        }

        let x_step: u32 = width / side;
        let y_step: u32 = height / side;

        let mut base: Vec<f32> = vec![0.0; (side * side) as usize];
        base.par_chunks_mut(side as usize).enumerate().for_each(|(y, row)| {
            let source_y: u32 = y as u32 * y_step;
            //Polar compensation at the base texel centre, proportional to the texel's solid angle
            let sin_theta: f32 = (std::f32::consts::PI * (y as f32 + 0.5) / side as f32).sin();

            for (x, texel) in row.iter_mut().enumerate()
            {
                *texel = texel_weight(luminance(image.rgb(x as u32 * x_step, source_y))) * sin_theta;
            }
        });

        let level_count: usize = (u32::BITS - side.leading_zeros()) as usize;
        let mut levels: Vec<Vec<f32>> = Vec::with_capacity(level_count);
        levels.push(base);

        for level in 1..level_count
        {
            let child_side: usize = level_side(side, level - 1);
            let parent_side: usize = level_side(side, level);
            let children: &[f32] = &levels[level - 1];

            let parents: Vec<f32> = (0..parent_side * parent_side)
                .into_par_iter()
                .map(|i: usize| {
                    let (px, py): (usize, usize) = (i % parent_side, i / parent_side);

                    child_range(py, parent_side, child_side)
                        .flat_map(|cy| child_range(px, parent_side, child_side).map(move |cx| cy * child_side + cx))
                        .map(|child| children[child])
                        .sum()
                })
                .collect();

            levels.push(parents);
        }

        Ok(Self { side, levels })
    }

    pub fn side(&self) -> u32 { self.side }

    pub fn level_count(&self) -> usize { self.levels.len() }

    /// Texels of a reduction level, level 0 being the full resolution weights
    pub fn level(&self, level: usize) -> &[f32] { &self.levels[level] }

    pub fn levels(&self) -> &[Vec<f32>] { &self.levels }

    pub fn total_weight(&self) -> f32 { self.levels.last().map_or(0.0, |top| top[0]) }

    pub fn texel_probability(&self, x: usize, y: usize) -> f32
    {
        let total: f32 = self.total_weight();
        if total > 0.0
        {
            self.levels[0][y * self.side as usize + x] / total
        }
        else
        {
            0.0
        }
    }

    /// Descends from the single top texel to the base level, choosing a child column with `u.x` then
    /// a row inside that column with `u.y` at every level
    pub fn sample(&self, u: glam::Vec2) -> EnvironmentSample
    {
        if self.total_weight() <= 0.0
        {
            return EnvironmentSample {
                direction: uv_to_direction(u.clamp(glam::Vec2::ZERO, glam::Vec2::ONE)),
                pdf: 0.0,
            };
        }

        let mut u: glam::Vec2 = u.clamp(glam::Vec2::ZERO, glam::Vec2::splat(ONE_MINUS_EPSILON));
        let (mut x, mut y): (usize, usize) = (0, 0);

        for level in (0..self.levels.len() - 1).rev()
        {
            let side: usize = level_side(self.side, level);
            let parent_side: usize = level_side(self.side, level + 1);
            let texels: &[f32] = &self.levels[level];

            let columns: std::ops::Range<usize> = child_range(x, parent_side, side);
            let rows: std::ops::Range<usize> = child_range(y, parent_side, side);

            let column_weights: Vec<f32> = columns.clone().map(|cx| rows.clone().map(|cy| texels[cy * side + cx]).sum()).collect();
            let (column, u_x): (usize, f32) = pick(&column_weights, u.x);
            x = columns.start + column;

            let row_weights: Vec<f32> = rows.clone().map(|cy| texels[cy * side + x]).collect();
            let (row, u_y): (usize, f32) = pick(&row_weights, u.y);
            y = rows.start + row;

            u = glam::Vec2::new(u_x, u_y);
        }

        let side: usize = self.side as usize;

        EnvironmentSample {
            direction: texel_direction(x, y, u, side, side),
            pdf: texel_density(self.texel_probability(x, y), y, side, side),
        }
    }

    pub fn pdf(&self, direction: glam::Vec3A) -> f32
    {
        let side: usize = self.side as usize;
        let (x, y): (usize, usize) = texel_at(direction_to_uv(direction), side, side);

        texel_density(self.texel_probability(x, y), y, side, side)
    }
}
