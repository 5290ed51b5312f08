use rayon::prelude::*;

const DIRECTIONS: [u32; 32] = [
    0x80000000, 0xc0000000, 0xa0000000, 0xf0000000, 0x88000000, 0xcc000000, 0xaa000000, 0xff000000, 0x80800000, 0xc0c00000, 0xa0a00000, 0xf0f00000,
    0x88880000, 0xcccc0000, 0xaaaa0000, 0xffff0000, 0x80008000, 0xc000c000, 0xa000a000, 0xf000f000, 0x88008800, 0xcc00cc00, 0xaa00aa00, 0xff00ff00,
    0x80808080, 0xc0c0c0c0, 0xa0a0a0a0, 0xf0f0f0f0, 0x88888888, 0xcccccccc, 0xaaaaaaaa, 0xffffffff,
];

/// Owen-scrambled 2D Sobol points, used as the `u` inputs of the environment sampler.
/// Every seed (one per pixel) gets an independent shuffle and scramble of the same table
pub struct SobolSampler
{
    points: Vec<glam::UVec2>,
}

impl SobolSampler
{
    /// Second dimension of the sequence
    fn sobol(index: u32) -> u32
    {
        DIRECTIONS
            .iter()
            .enumerate()
            .fold(0u32, |x, (bit, &direction)| x ^ (((index >> bit) & 1) * direction))
    }

    /// Table of `count` points, rounded up to a power of two
    pub fn new(count: usize) -> Self
    {
        let count: u32 = u32::try_from(count.max(1).next_power_of_two()).unwrap_or(1 << 31);

        let points: Vec<glam::UVec2> = (0..count)
            .into_par_iter()
            .map(|index: u32| glam::UVec2::new(index.reverse_bits(), Self::sobol(index)))
            .collect();

        Self { points }
    }

    pub fn len(&self) -> usize { self.points.len() }

    pub fn is_empty(&self) -> bool { self.points.is_empty() }

    /// Laine-Karras style hash from https://psychopath.io/post/2021_01_30_building_a_better_lk_hash
    fn lk_hash(mut x: u32, seed: u32) -> u32
    {
        x ^= x.wrapping_mul(0x3d20adea);
        x = x.wrapping_add(seed);
        x = x.wrapping_mul((seed >> 16) | 1);
        x ^= x.wrapping_mul(0x05526c56);
        x ^= x.wrapping_mul(0x53a22864);
        x
    }

    fn scramble(x: u32, seed: u32) -> u32 { Self::lk_hash(x.reverse_bits(), seed).reverse_bits() }

    /// https://github.com/skeeto/hash-prospector
    fn hash(mut x: u32) -> u32
    {
        x ^= x >> 16;
        x = x.wrapping_mul(0x21f0aaad);
        x ^= x >> 15;
        x = x.wrapping_mul(0xd35a2d97);
        x ^= x >> 15;
        x
    }

    /// Point `index` of the sequence scrambled by `seed`, inside `[0, 1)^2`
    pub fn get(&self, index: u32, seed: u32) -> glam::Vec2
    {
        let shuffled: u32 = Self::scramble(index, Self::hash(seed.wrapping_add(2)));
        let point: glam::UVec2 = self.points[shuffled as usize % self.points.len()];

        let x: u32 = Self::scramble(point.x, Self::hash(seed));
        let y: u32 = Self::scramble(point.y, Self::hash(seed.wrapping_add(1)));

        //Top 24 bits, so the result stays below 1 in f32
        glam::Vec2::new((x >> 8) as f32, (y >> 8) as f32) / (1u32 << 24) as f32
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn unscrambled_table_is_stratified()
    {
        let sampler: SobolSampler = SobolSampler::new(16);
        assert_eq!(sampler.len(), 16);

        //Every 4x4 stratum holds exactly one point
        let mut strata: [u32; 16] = [0; 16];
        for point in &sampler.points
        {
            strata[((point.x >> 30) * 4 + (point.y >> 30)) as usize] += 1;
        }
        assert!(strata.iter().all(|&count| count == 1));
    }

    #[test]
    fn points_are_in_unit_square()
    {
        let sampler: SobolSampler = SobolSampler::new(100);
        assert_eq!(sampler.len(), 128);

        for seed in 0..8
        {
            for index in 0..256
            {
                let u: glam::Vec2 = sampler.get(index, seed);
                assert!((0.0..1.0).contains(&u.x) && (0.0..1.0).contains(&u.y));
            }
        }
    }
}
