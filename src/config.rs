//! Command line options of the preview binary.

use std::path::PathBuf;

use clap::Parser;
use log::warn;

use crate::environment::sampler::SamplerKind;
use crate::environment::{DEFAULT_SKY_HEIGHT, DEFAULT_SKY_WIDTH};

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Traces a preview of a scene lit by an importance sampled environment", long_about = None)]
pub struct Options
{
    /// Equirectangular environment image (Radiance HDR, PNG or JPEG). A procedural sky is used when absent
    #[arg(long, short = 'e', value_name = "FILE")]
    pub environment: Option<PathBuf>,

    /// Importance sampling structure built for the environment
    #[arg(long, value_enum, default_value_t = SamplerKind::Table)]
    pub sampler: SamplerKind,

    /// Resolution of the procedural sky
    #[arg(long, value_name = "PIXELS", default_value_t = DEFAULT_SKY_WIDTH)]
    pub sky_width: u32,

    #[arg(long, value_name = "PIXELS", default_value_t = DEFAULT_SKY_HEIGHT)]
    pub sky_height: u32,

    /// Wavefront OBJ meshes placed in the scene. A built-in scene is used when empty
    #[arg(value_name = "MESH")]
    pub meshes: Vec<PathBuf>,

    #[arg(long = "nthreads", short = 't', value_name = "NUM", default_value_t = num_cpus::get())]
    n_threads: usize,

    /// Preview image
    #[arg(long, short = 'o', value_name = "FILE", default_value = "preview.png")]
    pub output: PathBuf,

    /// Sampling density of the environment, written next to the preview when set
    #[arg(long, value_name = "FILE")]
    pub density: Option<PathBuf>,

    #[arg(long, value_name = "PIXELS", default_value_t = 640)]
    pub width: u32,

    #[arg(long, value_name = "PIXELS", default_value_t = 360)]
    pub height: u32,

    /// Environment samples per pixel for direct lighting
    #[arg(long, short = 's', value_name = "NUM", default_value_t = 16)]
    pub samples: u32,

    /// Device memory budget in MiB, unlimited when absent
    #[arg(long, value_name = "MIB")]
    pub memory_budget: Option<u64>,
}

impl Options
{
    /// Number of rayon worker threads, clamped to `1..=logical CPUs`
    pub fn threads(&self) -> usize
    {
        let max_threads: usize = num_cpus::get();
        match self.n_threads
        {
            0 =>
            {
                warn!("Invalid nthreads, using 1");
                1
            }
            n if n > max_threads =>
            {
                warn!("Num threads > max logical CPUs {}", max_threads);
                max_threads
            }
            n => n,
        }
    }

    pub fn memory_budget_bytes(&self) -> Option<u64> { self.memory_budget.map(|mib| mib.saturating_mul(1 << 20)) }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults()
    {
        let options: Options = Options::parse_from(["hwpt"]);

        assert!(options.environment.is_none());
        assert_eq!(options.sampler, SamplerKind::Table);
        assert_eq!((options.sky_width, options.sky_height), (1024, 512));
        assert!(options.meshes.is_empty());
        assert_eq!(options.threads(), num_cpus::get());
        assert_eq!(options.memory_budget_bytes(), None);
    }

    #[test]
    fn parses_scene_arguments()
    {
        let options: Options = Options::parse_from([
            "hwpt",
            "--environment",
            "sky.hdr",
            "--sampler",
            "pyramid",
            "-t",
            "0",
            "--memory-budget",
            "64",
            "a.obj",
            "b.obj",
        ]);

        assert_eq!(options.environment, Some(PathBuf::from("sky.hdr")));
        assert_eq!(options.sampler, SamplerKind::Pyramid);
        assert_eq!(options.meshes.len(), 2);
        assert_eq!(options.threads(), 1);
        assert_eq!(options.memory_budget_bytes(), Some(64 << 20));
    }
}
