use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use hwpt::config::Options;
use hwpt::device::cpu::CpuDevice;
use hwpt::environment::Environment;
use hwpt::frame::FrameProperties;
use hwpt::loader::load_obj;
use hwpt::preview::{write_preview, PreviewSettings};
use hwpt::scene::{GeometryRecord, Material, Mesh, Transform};
use hwpt::{Result, TracingContext};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Ground plane and a box floating above it, used when no mesh is given
fn default_scene() -> Vec<(Mesh, Transform, Material)>
{
    let ground: Mesh = Mesh::new(
        vec![
            glam::Vec3::new(-20.0, 0.0, -20.0),
            glam::Vec3::new(-20.0, 0.0, 20.0),
            glam::Vec3::new(20.0, 0.0, 20.0),
            glam::Vec3::new(20.0, 0.0, -20.0),
        ],
        vec![glam::Vec3::Y; 4],
        vec![0, 1, 2, 0, 2, 3],
    );

    //Cube of side 2, one vertex per face corner so normals stay flat
    let faces: [(glam::Vec3, glam::Vec3, glam::Vec3); 6] = [
        (glam::Vec3::X, glam::Vec3::Y, glam::Vec3::Z),
        (glam::Vec3::NEG_X, glam::Vec3::Z, glam::Vec3::Y),
        (glam::Vec3::Y, glam::Vec3::Z, glam::Vec3::X),
        (glam::Vec3::NEG_Y, glam::Vec3::X, glam::Vec3::Z),
        (glam::Vec3::Z, glam::Vec3::X, glam::Vec3::Y),
        (glam::Vec3::NEG_Z, glam::Vec3::Y, glam::Vec3::X),
    ];
    let mut cube: Mesh = Mesh::default();
    for (normal, s, t) in faces
    {
        let base: u32 = cube.vertices.len() as u32;
        for (a, b) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
        {
            cube.vertices.push(normal + s * a + t * b);
            cube.normals.push(normal);
        }
        cube.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    let mut cube_transform: Transform = Transform::new(glam::Vec3::new(0.0, 1.5, 0.0));
    cube_transform.rotate(0.6, Transform::UP);

    vec![
        (ground, Transform::default(), Material::diffuse(glam::Vec3::splat(0.7))),
        (cube, cube_transform, Material::emissive(glam::Vec3::new(4.0, 2.4, 1.2))),
    ]
}

fn run(options: &Options) -> Result<()>
{
    let device: Arc<CpuDevice> = Arc::new(match options.memory_budget_bytes()
    {
        Some(budget) => CpuDevice::with_memory_budget(budget),
        None => CpuDevice::new(),
    });

    info!("Loading environment...");
    let environment: Environment = match &options.environment
    {
        Some(path) => Environment::from_file(path, options.sampler)?,
        None => Environment::sky(options.sky_width, options.sky_height, options.sampler)?,
    };

    let mut camera: Transform = Transform::new(glam::Vec3::new(0.0, 3.0, 8.0));
    camera.look_at(glam::Vec3::new(0.0, 1.0, 0.0));

    let properties: FrameProperties = FrameProperties::new(&camera, 45.0, options.width as f32 / options.height.max(1) as f32);
    let mut context: TracingContext<CpuDevice> = TracingContext::new(device.clone(), environment, properties)?;

    info!("Loading models, building BVHs...");
    let objects: Vec<(Mesh, Transform, Material)> = if options.meshes.is_empty()
    {
        default_scene()
    }
    else
    {
        options
            .meshes
            .iter()
            .map(|path: &PathBuf| Ok((load_obj(path)?, Transform::default(), Material::default())))
            .collect::<Result<_>>()?
    };

    for (mesh, transform, material) in objects
    {
        let geometry: Arc<GeometryRecord<CpuDevice>> = Arc::new(GeometryRecord::new(device.as_ref(), &mesh)?);
        context.scene_mut().add(geometry, transform, material);
    }
    context.update_scene()?;

    info!("Tracing preview...");
    let settings: PreviewSettings = PreviewSettings {
        width: options.width,
        height: options.height,
        samples: options.samples,
    };
    write_preview(&context.frame(), settings, &options.output, options.density.as_ref())?;

    info!("Device memory in use: {} bytes", device.allocated_bytes());
    Ok(())
}

fn main() -> ExitCode
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options: Options = Options::parse();

    if let Err(error) = rayon::ThreadPoolBuilder::new().num_threads(options.threads()).build_global()
    {
        error!("Failed to configure the thread pool: {error}");
        return ExitCode::FAILURE;
    }

    match run(&options)
    {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) =>
        {
            error!("{error}");
            ExitCode::FAILURE
        }
    }
}
