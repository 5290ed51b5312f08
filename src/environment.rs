//! Environment lighting: a radiance panorama with its importance sampling structure.

use std::path::Path;

use log::info;
use rayon::prelude::*;

use sampler::{EnvironmentSample, ImportanceSampler, SamplerKind};

use crate::device::{BufferUsage, Device, ImageFormat};
use crate::error::Result;
use crate::image_helper::PixelBuffer;
use crate::scene::transform::Transform;
use crate::utility::direction_to_uv;

pub mod sampler;

pub const DEFAULT_SKY_WIDTH: u32 = 1024;
pub const DEFAULT_SKY_HEIGHT: u32 = 512;

fn smoothstep(edge_0: f32, edge_1: f32, x: f32) -> f32
{
    let t: f32 = ((x - edge_0) / (edge_1 - edge_0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Gradient sky with a bright sun around the zenith
pub fn procedural_sky(direction: glam::Vec3A) -> glam::Vec3A
{
    let zenith: glam::Vec3A = glam::Vec3A::new(0.557, 0.725, 0.984) * 1.1;
    let horizon: glam::Vec3A = glam::Vec3A::new(0.957, 0.573, 0.445) * 1.2;

    let angle: f32 = direction.normalize().dot(Transform::UP.into()).clamp(-1.0, 1.0).acos();

    let mut color: glam::Vec3A = zenith.lerp(horizon, angle / std::f32::consts::PI).powf(1.5);
    if angle < 0.3
    {
        color += glam::Vec3A::splat(smoothstep(0.0, 0.3, 0.3 - angle) * 100.0);
    }

    color
}

pub struct Environment
{
    pixels: PixelBuffer,
    sampler: ImportanceSampler,
}

impl Environment
{
    pub fn new(pixels: PixelBuffer, kind: SamplerKind) -> Result<Self>
    {
        let sampler: ImportanceSampler = ImportanceSampler::build_from_image(&pixels, kind)?;
        Ok(Self { pixels, sampler })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, kind: SamplerKind) -> Result<Self> { Self::new(PixelBuffer::load(path)?, kind) }

    pub fn from_function<F>(function: F, width: u32, height: u32, kind: SamplerKind) -> Result<Self>
    where
        F: Fn(glam::Vec3A) -> glam::Vec3A + Sync,
    {
        Self::new(PixelBuffer::from_function(function, width, height)?, kind)
    }

    /// Environment lit by [`procedural_sky`]
    pub fn sky(width: u32, height: u32, kind: SamplerKind) -> Result<Self> { Self::from_function(procedural_sky, width, height, kind) }

    pub fn pixels(&self) -> &PixelBuffer { &self.pixels }

    pub fn sampler(&self) -> &ImportanceSampler { &self.sampler }

    pub fn sample(&self, u: glam::Vec2) -> EnvironmentSample { self.sampler.sample(u) }

    pub fn pdf(&self, direction: glam::Vec3A) -> f32 { self.sampler.pdf(direction) }

    /// Radiance arriving from `direction`, bilinearly filtered
    pub fn radiance(&self, direction: glam::Vec3A) -> glam::Vec3A
    {
        let uv: glam::Vec2 = direction_to_uv(direction);
        self.pixels.get_pixel_bilinear(uv.x, uv.y)
    }

    /// Sampling density of every texel of the sampling grid, relative to a uniform density over the sphere
    pub fn density_map(&self) -> (Vec<glam::Vec3A>, glam::UVec2)
    {
        let (columns, rows): (u32, u32) = self.sampler.resolution();
        let uniform: f32 = 4.0 * std::f32::consts::PI;

        let density: Vec<glam::Vec3A> = (0..columns * rows)
            .into_par_iter()
            .map(|i: u32| {
                let uv: glam::Vec2 = glam::Vec2::new(((i % columns) as f32 + 0.5) / columns as f32, ((i / columns) as f32 + 0.5) / rows as f32);
                glam::Vec3A::splat(self.pdf(crate::utility::uv_to_direction(uv)) * uniform)
            })
            .collect();

        (density, glam::UVec2::new(columns, rows))
    }

    /// Uploads the radiance image and the sampling structure
    pub fn upload<D: Device>(&self, device: &D) -> Result<EnvironmentResources<D>>
    {
        let timer: std::time::Instant = std::time::Instant::now();

        let rgba: Vec<f32> = (0..self.pixels.height())
            .flat_map(|y| (0..self.pixels.width()).map(move |x| (x, y)))
            .flat_map(|(x, y)| {
                let rgb: glam::Vec3A = self.pixels.rgb(x, y);
                [rgb.x, rgb.y, rgb.z, 1.0]
            })
            .collect();

        let radiance: D::Image = device.create_image_with_levels(self.pixels.width(), self.pixels.height(), ImageFormat::Rgba32Float, &[rgba])?;

        let importance: ImportanceResource<D> = match &self.sampler
        {
            ImportanceSampler::Table(table) => ImportanceResource::Table {
                buffer: device.create_device_local_buffer(&table.device_layout(), BufferUsage::STORAGE_BUFFER | BufferUsage::SHADER_DEVICE_ADDRESS)?,
                width: table.width(),
                height: table.height(),
            },
            ImportanceSampler::Pyramid(pyramid) => ImportanceResource::Pyramid {
                image: device.create_image_with_levels(pyramid.side(), pyramid.side(), ImageFormat::R32Float, pyramid.levels())?,
            },
        };

        info!("Environment uploaded ({:?}): \t{:?}", self.sampler.kind(), timer.elapsed());

        Ok(EnvironmentResources { radiance, importance })
    }
}

/// Device side sampling structure
pub enum ImportanceResource<D: Device>
{
    /// Conditional CDFs followed by the marginal CDF
    Table
    {
        buffer: D::Buffer, width: u32, height: u32
    },
    /// Single channel image whose mip levels are the reduction chain
    Pyramid
    {
        image: D::Image
    },
}

pub struct EnvironmentResources<D: Device>
{
    pub radiance: D::Image,
    pub importance: ImportanceResource<D>,
}
