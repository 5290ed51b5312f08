use bytemuck::{Pod, Zeroable};

use crate::scene::transform::Transform;

pub const DEFAULT_FOV_Y: f32 = 45.0;
pub const DEFAULT_BOUNCES: u32 = 4;
pub const DEFAULT_MAX_SAMPLE: u32 = 1024;

const Z_NEAR: f32 = 0.01;
const Z_FAR: f32 = 1000.0;

/// Per-frame record the traversal step reads, laid out for a uniform buffer
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameProperties
{
    /// Camera-to-world
    pub view: glam::Mat4,
    /// Camera-to-clip
    pub projection: glam::Mat4,

    pub sample_id: u32,
    pub max_sample: u32,
    pub transparent_background: u32,
    pub jittering: u32,

    pub bounces: u32,
    _pad: [u32; 3],
}

impl Default for FrameProperties
{
    fn default() -> Self { Self::new(&Transform::default(), DEFAULT_FOV_Y, 1.0) }
}

impl FrameProperties
{
    /// `fov_y` in degrees
    pub fn new(camera: &Transform, fov_y: f32, aspect_ratio: f32) -> Self
    {
        Self {
            view: camera.matrix(),
            projection: glam::Mat4::perspective_rh(fov_y.to_radians(), aspect_ratio, Z_NEAR, Z_FAR),
            sample_id: 0,
            max_sample: DEFAULT_MAX_SAMPLE,
            transparent_background: 0,
            jittering: 1,
            bounces: DEFAULT_BOUNCES,
            _pad: [0; 3],
        }
    }

    pub fn with_max_sample(self, max_sample: u32) -> Self { Self { max_sample, ..self } }

    pub fn with_bounces(self, bounces: u32) -> Self { Self { bounces, ..self } }

    pub fn with_transparent_background(self, enabled: bool) -> Self
    {
        Self {
            transparent_background: enabled as u32,
            ..self
        }
    }

    pub fn with_jittering(self, enabled: bool) -> Self
    {
        Self {
            jittering: enabled as u32,
            ..self
        }
    }

    pub fn set_camera(&mut self, camera: &Transform)
    {
        self.view = camera.matrix();
        self.reset_accumulation();
    }

    pub fn reset_accumulation(&mut self) { self.sample_id = 0; }

    pub fn is_converged(&self) -> bool { self.sample_id >= self.max_sample }

    /// Moves to the next accumulation sample. Returns false once converged
    pub fn advance(&mut self) -> bool
    {
        if self.is_converged()
        {
            return false;
        }

        self.sample_id += 1;
        true
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn layout_is_uniform_compatible()
    {
        assert_eq!(std::mem::size_of::<FrameProperties>(), 160);
        assert_eq!(std::mem::size_of::<FrameProperties>() % 16, 0);
    }

    #[test]
    fn accumulation_stops_at_max_sample()
    {
        let mut frame: FrameProperties = FrameProperties::default().with_max_sample(2);

        assert!(frame.advance());
        assert!(frame.advance());
        assert!(!frame.advance());
        assert!(frame.is_converged());

        frame.set_camera(&Transform::new(glam::Vec3::ONE));
        assert_eq!(frame.sample_id, 0);
        assert_eq!(frame.view.w_axis.truncate(), glam::Vec3::ONE);
    }
}
