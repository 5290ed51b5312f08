//! Host-side preview of a published frame: primary rays through the top-level structure of the
//! [`CpuDevice`], instance emission on a hit, environment radiance on a miss.

use std::path::Path;
use std::time::Instant;

use bumpalo::Bump;
use log::info;
use nanorand::tls::TlsWyRand;
use nanorand::Rng;
use rayon::prelude::*;

use crate::camera::Camera;
use crate::context::Frame;
use crate::device::cpu::tlas::TraceHit;
use crate::device::cpu::CpuDevice;
use crate::error::Result;
use crate::image_helper::write_image;
use crate::ray::Ray;
use crate::sampling::SobolSampler;
use crate::scene::acceleration::{SceneSnapshot, INSTANCE_MASK};
use crate::utility::INFINITY;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PreviewSettings
{
    pub width: u32,
    pub height: u32,
    pub samples: u32,
}

fn radiance(frame: &Frame<CpuDevice>, bump: &Bump, ray: &Ray) -> glam::Vec3A
{
    let scene: &SceneSnapshot<CpuDevice> = &frame.scene;

    let Some(hit): Option<TraceHit> = scene.top_level().trace(bump, ray, INFINITY, INSTANCE_MASK)
    else
    {
        return if frame.properties.transparent_background != 0
        {
            glam::Vec3A::ZERO
        }
        else
        {
            frame.environment.environment.radiance(ray.direction)
        };
    };

    //Materials are indexed by the custom index of the instance
    scene
        .materials()
        .get(hit.instance_custom_index as usize)
        .map_or(glam::Vec3A::ZERO, |material| material.emission.into())
}

/// Renders `settings.width * settings.height` pixels, row 0 at the top
pub fn render(frame: &Frame<CpuDevice>, settings: PreviewSettings) -> Vec<glam::Vec3A>
{
    let timer: Instant = Instant::now();

    let camera: Camera = Camera::from_frame(&frame.properties);
    let samples: u32 = settings.samples.max(1);
    let sobol: SobolSampler = SobolSampler::new(samples as usize);
    let jittering: bool = frame.properties.jittering != 0;

    let (width, height): (u32, u32) = (settings.width, settings.height);
    let pixels: Vec<glam::Vec3A> = (0..width * height)
        .into_par_iter()
        .map(|i: u32| {
            let x: u32 = i % width;
            let y: u32 = i / width;

            let mut rng: TlsWyRand = nanorand::tls_rng();
            let seed: u32 = rng.generate();
            let mut bump: Bump = Bump::new();

            let mut accumulated: glam::Vec3A = glam::Vec3A::ZERO;
            for index in 0..samples
            {
                let offset: glam::Vec2 = if jittering
                {
                    sobol.get(index, seed)
                }
                else
                {
                    glam::Vec2::splat(0.5)
                };

                let ray: Ray = camera.create_ray((x as f32 + offset.x) / width as f32, (y as f32 + offset.y) / height as f32);

                accumulated += radiance(frame, &bump, &ray);
                bump.reset();
            }

            accumulated / samples as f32
        })
        .collect();

    info!("Preview {}x{}, {} spp: \t{:?}", width, height, samples, timer.elapsed());
    pixels
}

/// Renders and saves a preview, plus the sampling density of the environment when `density` is set
pub fn write_preview<P, Q>(frame: &Frame<CpuDevice>, settings: PreviewSettings, output: P, density: Option<Q>) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let pixels: Vec<glam::Vec3A> = render(frame, settings);
    write_image(output, &pixels, glam::UVec2::new(settings.width, settings.height))?;

    if let Some(path) = density
    {
        let (map, size): (Vec<glam::Vec3A>, glam::UVec2) = frame.environment.environment.density_map();
        write_image(path, &map, size)?;
    }

    Ok(())
}
