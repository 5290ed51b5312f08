use std::f32::consts::PI;

use float_cmp::assert_approx_eq;

use hwpt::device::cpu::CpuDevice;
use hwpt::environment::sampler::{EnvironmentSample, SamplerKind};
use hwpt::environment::{Environment, ImportanceResource};
use hwpt::image_helper::PixelBuffer;
use hwpt::sampling::SobolSampler;
use hwpt::Error;

fn gray(width: u32, height: u32) -> PixelBuffer { PixelBuffer::new(width, height, 3, vec![0.25; (width * height * 3) as usize]).unwrap() }

#[test]
fn gray_environment_is_uniform_on_the_sphere()
{
    //Landscape, square and portrait panoramas
    for (width, height) in [(32, 16), (16, 16), (8, 16)]
    {
        for kind in [SamplerKind::Table, SamplerKind::Pyramid]
        {
            let environment: Environment = Environment::new(gray(width, height), kind).unwrap();
            let sobol: SobolSampler = SobolSampler::new(256);

            for index in 0..256
            {
                let sample: EnvironmentSample = environment.sample(sobol.get(index, 11));

                assert_approx_eq!(f32, sample.direction.length(), 1.0, epsilon = 1e-4);
                assert_approx_eq!(f32, sample.pdf, 1.0 / (4.0 * PI), epsilon = 1e-4);
                assert_approx_eq!(f32, environment.pdf(sample.direction), sample.pdf, epsilon = sample.pdf * 1e-2);
            }
        }
    }
}

#[test]
fn bright_spot_attracts_samples()
{
    let (width, height): (u32, u32) = (32, 16);
    let mut data: Vec<f32> = vec![0.01; (width * height * 3) as usize];
    let spot: usize = ((4 * width + 20) * 3) as usize;
    data[spot..spot + 3].copy_from_slice(&[1000.0; 3]);

    let environment: Environment = Environment::new(PixelBuffer::new(width, height, 3, data).unwrap(), SamplerKind::Table).unwrap();
    let sobol: SobolSampler = SobolSampler::new(1024);

    let inside: usize = (0..1024)
        .filter(|&index| {
            let uv: glam::Vec2 = hwpt::utility::direction_to_uv(environment.sample(sobol.get(index, 5)).direction);
            (uv.x * width as f32) as u32 == 20 && (uv.y * height as f32) as u32 == 4
        })
        .count();

    assert!(inside > 900, "{inside} samples hit the bright texel");
}

#[test]
fn black_environment_never_produces_nan()
{
    let environment: Environment = Environment::new(PixelBuffer::new(8, 4, 1, vec![0.0; 32]).unwrap(), SamplerKind::Table).unwrap();
    let sample: EnvironmentSample = environment.sample(glam::Vec2::new(0.3, 0.7));

    assert_eq!(sample.pdf, 0.0);
    assert!(sample.direction.is_finite());
    assert_approx_eq!(f32, sample.direction.length(), 1.0, epsilon = 1e-5);
}

#[test]
fn pyramid_rejects_non_multiple_dimensions()
{
    assert!(matches!(
        Environment::new(gray(12, 8), SamplerKind::Pyramid),
        Err(Error::NonMultipleDimensions { width: 12, height: 8, side: 8 })
    ));
    assert!(Environment::new(gray(12, 8), SamplerKind::Table).is_ok());
}

#[test]
fn upload_matches_sampler_kind()
{
    let device: CpuDevice = CpuDevice::new();

    let table = Environment::new(gray(8, 4), SamplerKind::Table).unwrap().upload(&device).unwrap();
    assert!(matches!(table.importance, ImportanceResource::Table { width: 8, height: 4, .. }));

    let pyramid = Environment::new(gray(8, 4), SamplerKind::Pyramid).unwrap().upload(&device).unwrap();
    match pyramid.importance
    {
        ImportanceResource::Pyramid { image } => assert_eq!(image.mip_levels(), 3),
        ImportanceResource::Table { .. } => panic!("expected a pyramid"),
    }
}
