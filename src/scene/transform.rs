/// Rigid placement of an object or of the camera
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform
{
    pub position: glam::Vec3,
    pub rotation: glam::Quat,
}

impl Default for Transform
{
    fn default() -> Self { Self::new(glam::Vec3::ZERO) }
}

impl Transform
{
    pub const UP: glam::Vec3 = glam::Vec3::Y;
    pub const FRONT: glam::Vec3 = glam::Vec3::NEG_Z;
    pub const RIGHT: glam::Vec3 = glam::Vec3::X;

    pub fn new(position: glam::Vec3) -> Self
    {
        Self {
            position,
            rotation: glam::Quat::IDENTITY,
        }
    }

    pub fn from_position_rotation(position: glam::Vec3, rotation: glam::Quat) -> Self { Self { position, rotation } }

    /// Object-to-world matrix
    pub fn matrix(&self) -> glam::Mat4 { glam::Mat4::from_rotation_translation(self.rotation, self.position) }

    /// Upper 3x4 block of [`Transform::matrix`] in row-major order, as instance records store it
    pub fn row_major_3x4(&self) -> [f32; 12]
    {
        let rows: [f32; 16] = self.matrix().transpose().to_cols_array();

        let mut out: [f32; 12] = [0.0; 12];
        out.copy_from_slice(&rows[..12]);
        out
    }

    pub fn front(&self) -> glam::Vec3 { self.rotation * Self::FRONT }

    pub fn right(&self) -> glam::Vec3 { self.rotation * Self::RIGHT }

    pub fn up(&self) -> glam::Vec3 { self.rotation * Self::UP }

    /// Rotates by `angle` radians around a local `axis`
    pub fn rotate(&mut self, angle: f32, axis: glam::Vec3)
    {
        if let Some(axis) = axis.try_normalize()
        {
            self.rotation = (self.rotation * glam::Quat::from_axis_angle(axis, angle)).normalize();
        }
    }

    /// Applies local rotations around the right, up and front axes, in radians
    pub fn rotate_euler(&mut self, angles: glam::Vec3)
    {
        let local: glam::Quat = glam::Quat::from_axis_angle(Self::RIGHT, angles.x)
            * glam::Quat::from_axis_angle(Self::UP, angles.y)
            * glam::Quat::from_axis_angle(-Self::FRONT, angles.z);

        self.rotation = (self.rotation * local).normalize();
    }

    pub fn translate(&mut self, translation: glam::Vec3) { self.position += translation; }

    /// Turns the front axis towards `target`. Falls back to the identity rotation when the target is
    /// (almost) at the position
    pub fn look_at(&mut self, target: glam::Vec3)
    {
        let direction: glam::Vec3 = target - self.position;
        let length: f32 = direction.length();

        //Also rejects NaN
        if !(length > 1e-4)
        {
            self.rotation = glam::Quat::IDENTITY;
            return;
        }

        let direction: glam::Vec3 = direction / length;
        let up: glam::Vec3 = if direction.dot(Self::UP).abs() > 0.9999 { Self::RIGHT } else { Self::UP };

        let back: glam::Vec3 = -direction;
        let right: glam::Vec3 = up.cross(back).normalize();
        let true_up: glam::Vec3 = back.cross(right);

        self.rotation = glam::Quat::from_mat3(&glam::Mat3::from_cols(right, true_up, back)).normalize();
    }
}
