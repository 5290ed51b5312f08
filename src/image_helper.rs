use std::path::Path;

use log::info;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use rayon::prelude::{IndexedParallelIterator, ParallelSliceMut};

use crate::error::{Error, Result};
use crate::image_helper::tonemapping::aces_tonemap_vector;

pub mod tonemapping;

/// Flat floating point image, row-major with interleaved channels.
///
/// Environment panoramas are kept in linear radiance, nothing is gamma corrected on load
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer
{
    width: u32,
    height: u32,
    channels: u32,
    data: Vec<f32>,
}

impl PixelBuffer
{
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<f32>) -> Result<Self>
    {
        let expected: usize = width as usize * height as usize * channels as usize;
        if data.len() != expected
        {
            return Err(Error::PixelCount {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Loads an image through the `image` codecs (Radiance HDR, PNG, JPEG) as linear RGB
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self>
    {
        let img = image::io::Reader::open(path.as_ref())?.decode()?.into_rgb32f();
        let (width, height): (u32, u32) = img.dimensions();

        info!("Loaded environment {:?} ({}x{})", path.as_ref().file_name().unwrap_or_default(), width, height);
        Self::new(width, height, 3, img.into_raw())
    }

    /// Evaluates a procedural environment for every pixel of a `width` x `height` RGBA panorama
    pub fn from_function<F>(function: F, width: u32, height: u32) -> Result<Self>
    where
        F: Fn(glam::Vec3A) -> glam::Vec3A + Sync,
    {
        let mut data: Vec<f32> = vec![0.0; width as usize * height as usize * 4];

        if width > 0
        {
            data.par_chunks_mut(width as usize * 4).enumerate().for_each(|(y, row)| {
                for (x, pixel) in row.chunks_exact_mut(4).enumerate()
                {
                    let uv: glam::Vec2 = glam::Vec2::new((x as f32 + 0.5) / width as f32, (y as f32 + 0.5) / height as f32);
                    let color: glam::Vec3A = function(crate::utility::uv_to_direction(uv));

                    pixel.copy_from_slice(&[color.x, color.y, color.z, 1.0]);
                }
            });
        }

        Self::new(width, height, 4, data)
    }

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }

    pub fn channels(&self) -> u32 { self.channels }

    pub fn data(&self) -> &[f32] { &self.data }

    pub fn is_empty(&self) -> bool { self.width == 0 || self.height == 0 || self.channels == 0 }

    /// RGB of the pixel at (x, y); single channel images are broadcast to grey
    pub fn rgb(&self, x: u32, y: u32) -> glam::Vec3A
    {
        let i: usize = (y as usize * self.width as usize + x as usize) * self.channels as usize;

        match self.channels
        {
            1 | 2 => glam::Vec3A::splat(self.data[i]),
            _ => glam::Vec3A::from_slice(&self.data[i..i + 3]),
        }
    }

    /// Returns the pixel at absolute coordinates (x, y), wrapping horizontally and clamping vertically
    fn get_pixel(&self, x: u32, y: u32) -> glam::Vec3A
    {
        let _x = x % self.width;
        let _y = y.min(self.height - 1);

        self.rgb(_x, _y)
    }

    /// Samples the image at UV coordinates (u, v) using bilinear interpolation between texel centres
    pub fn get_pixel_bilinear(&self, u: f32, v: f32) -> glam::Vec3A
    {
        if self.is_empty()
        {
            return glam::Vec3A::ZERO;
        }

        let x: f32 = ((self.width as f32) * u - 0.5).max(0.0);
        let y: f32 = ((self.height as f32) * v - 0.5).max(0.0);

        let x0: u32 = x as u32;
        let y0: u32 = y as u32;

        let x_fract: f32 = x.fract();
        let y_fract: f32 = y.fract();

        let c_00: glam::Vec3A = self.get_pixel(x0, y0);
        let c_01: glam::Vec3A = self.get_pixel(x0, y0 + 1);
        let c_10: glam::Vec3A = self.get_pixel(x0 + 1, y0);
        let c_11: glam::Vec3A = self.get_pixel(x0 + 1, y0 + 1);

        (1.0 - x_fract) * (1.0 - y_fract) * c_00 + (1.0 - x_fract) * y_fract * c_01 + x_fract * (1.0 - y_fract) * c_10 + x_fract * y_fract * c_11
    }
}

/// Writes linear radiance to an 8-bit PNG, tonemapped and converted to gamma 2.2
pub fn write_image<P: AsRef<Path>>(path: P, data: &[glam::Vec3A], dimensions: glam::UVec2) -> Result<()>
{
    let bytes: Vec<u8> = data
        .par_iter()
        .flat_map_iter(|&a| {
            let out: glam::Vec3A = aces_tonemap_vector(a).powf(1.0 / 2.2) * 255.0;

            [out.x as u8, out.y as u8, out.z as u8]
        })
        .collect();

    image::save_buffer(path.as_ref(), bytes.as_slice(), dimensions.x, dimensions.y, image::ColorType::Rgb8)?;
    info!("Saved {:?}", path.as_ref());

    Ok(())
}

#[cfg(test)]
mod tests
{
    use float_cmp::assert_approx_eq;

    use super::*;

    #[test]
    fn rejects_mismatched_pixel_count()
    {
        assert!(matches!(
            PixelBuffer::new(2, 2, 3, vec![0.0; 11]),
            Err(Error::PixelCount { expected: 12, actual: 11 })
        ));
    }

    #[test]
    fn procedural_image_has_rgba_layout()
    {
        let pixels: PixelBuffer = PixelBuffer::from_function(|d| glam::Vec3A::splat(d.y), 8, 4).unwrap();

        assert_eq!(pixels.channels(), 4);
        assert_eq!(pixels.data().len(), 8 * 4 * 4);
        // Top row looks up, bottom row looks down
        assert!(pixels.rgb(3, 0).x > 0.0);
        assert!(pixels.rgb(3, 3).x < 0.0);
        assert_approx_eq!(f32, pixels.data()[3], 1.0);
    }

    #[test]
    fn bilinear_lookup_of_constant_image()
    {
        let pixels: PixelBuffer = PixelBuffer::new(4, 2, 1, vec![0.25; 8]).unwrap();
        let c: glam::Vec3A = pixels.get_pixel_bilinear(0.99, 0.99);

        assert_approx_eq!(f32, c.x, 0.25);
        assert_approx_eq!(f32, c.z, 0.25);
    }
}
