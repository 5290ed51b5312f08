use crate::frame::FrameProperties;
use crate::ray::Ray;

/// Primary ray generator reconstructed from the per-frame matrices
pub struct Camera
{
    pub origin: glam::Vec3A,
    pub clip_to_camera: glam::Mat4,
    pub camera_to_world: glam::Affine3A,
}

impl Camera
{
    pub fn from_frame(frame: &FrameProperties) -> Self
    {
        let camera_to_world: glam::Affine3A = glam::Affine3A::from_mat4(frame.view);

        Self {
            origin: camera_to_world.translation,
            clip_to_camera: frame.projection.inverse(),
            camera_to_world,
        }
    }

    /// `(s, t)` in `[0, 1]^2`, `t == 0` at the top of the image
    pub fn create_ray(&self, s: f32, t: f32) -> Ray
    {
        let point: glam::Vec4 = self.clip_to_camera * glam::Vec4::new(s * 2.0 - 1.0, 1.0 - t * 2.0, 1.0, 1.0);
        let target: glam::Vec3A = glam::Vec3A::from(point.truncate() / point.w);

        let dir: glam::Vec3A = self.camera_to_world.transform_vector3a(target).normalize();
        Ray::new(self.origin, dir)
    }
}
