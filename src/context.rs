//! Entry point of a consumer: owns the device, the scene index and the active environment, and hands out
//! matching snapshots of both once per frame.

use std::sync::Arc;

use arc_swap::ArcSwap;
use log::{info, warn};

use crate::device::Device;
use crate::environment::{Environment, EnvironmentResources};
use crate::error::Result;
use crate::frame::FrameProperties;
use crate::scene::acceleration::{SceneAccelerationIndex, SceneSnapshot};

/// Environment together with its uploaded device resources
pub struct EnvironmentState<D: Device>
{
    pub environment: Environment,
    pub resources: EnvironmentResources<D>,
}

/// Everything one traced frame reads
pub struct Frame<D: Device>
{
    pub scene: Arc<SceneSnapshot<D>>,
    pub environment: Arc<EnvironmentState<D>>,
    pub properties: FrameProperties,
}

pub struct TracingContext<D: Device>
{
    device: Arc<D>,
    scene: SceneAccelerationIndex<D>,
    environment: ArcSwap<EnvironmentState<D>>,
    properties: FrameProperties,
}

impl<D: Device> TracingContext<D>
{
    pub fn new(device: Arc<D>, environment: Environment, properties: FrameProperties) -> Result<Self>
    {
        let resources: EnvironmentResources<D> = environment.upload(device.as_ref())?;
        let scene: SceneAccelerationIndex<D> = SceneAccelerationIndex::new(device.clone())?;

        info!("Tracing context ready");
        Ok(Self {
            device,
            scene,
            environment: ArcSwap::from_pointee(EnvironmentState { environment, resources }),
            properties,
        })
    }

    pub fn device(&self) -> &Arc<D> { &self.device }

    pub fn scene(&self) -> &SceneAccelerationIndex<D> { &self.scene }

    pub fn scene_mut(&mut self) -> &mut SceneAccelerationIndex<D> { &mut self.scene }

    pub fn properties(&self) -> &FrameProperties { &self.properties }

    pub fn properties_mut(&mut self) -> &mut FrameProperties { &mut self.properties }

    /// Rebuilds the scene index and restarts accumulation
    pub fn update_scene(&mut self) -> Result<()>
    {
        self.scene.update()?;
        self.properties.reset_accumulation();
        Ok(())
    }

    /// Uploads `environment` and makes it current. The previous environment stays active if the upload fails
    pub fn set_environment(&mut self, environment: Environment) -> Result<()>
    {
        let resources: EnvironmentResources<D> = environment
            .upload(self.device.as_ref())
            .inspect_err(|error| warn!("Environment upload failed, keeping previous environment: {error}"))?;

        self.environment.store(Arc::new(EnvironmentState { environment, resources }));
        self.properties.reset_accumulation();
        Ok(())
    }

    pub fn environment(&self) -> Arc<EnvironmentState<D>> { self.environment.load_full() }

    pub fn frame(&self) -> Frame<D>
    {
        Frame {
            scene: self.scene.snapshot(),
            environment: self.environment.load_full(),
            properties: self.properties,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::device::cpu::CpuDevice;
    use crate::environment::sampler::SamplerKind;
    use crate::scene::geometry::tests::triangle;
    use crate::scene::{GeometryRecord, Material, SceneState, Transform};

    #[test]
    fn frame_sees_published_scene()
    {
        let device: Arc<CpuDevice> = Arc::new(CpuDevice::new());
        let environment: Environment = Environment::sky(16, 8, SamplerKind::Table).unwrap();
        let mut context: TracingContext<CpuDevice> = TracingContext::new(device.clone(), environment, FrameProperties::default()).unwrap();

        let geometry: Arc<GeometryRecord<CpuDevice>> = Arc::new(GeometryRecord::new(device.as_ref(), &triangle()).unwrap());
        context.scene_mut().add(geometry, Transform::default(), Material::default());
        assert_eq!(context.frame().scene.state(), SceneState::Empty);

        context.properties_mut().advance();
        context.update_scene().unwrap();

        let frame: Frame<CpuDevice> = context.frame();
        assert_eq!(frame.scene.state(), SceneState::Populated);
        assert_eq!(frame.properties.sample_id, 0);
    }

    #[test]
    fn failed_environment_upload_keeps_previous()
    {
        let device: Arc<CpuDevice> = Arc::new(CpuDevice::with_memory_budget(1 << 20));
        let environment: Environment = Environment::sky(16, 8, SamplerKind::Table).unwrap();
        let mut context: TracingContext<CpuDevice> = TracingContext::new(device, environment, FrameProperties::default()).unwrap();

        //1024x512 RGBA32F alone exceeds the budget
        let large: Environment = Environment::sky(1024, 512, SamplerKind::Pyramid).unwrap();
        assert!(context.set_environment(large).is_err());
        assert_eq!(context.environment().environment.pixels().width(), 16);
    }
}
