#[derive(Copy, Clone, Debug)]
pub struct Ray
{
    pub origin: glam::Vec3A,
    pub direction: glam::Vec3A,
    pub inv_direction: glam::Vec3A,
}

impl Ray
{
    pub fn new(o: glam::Vec3A, d: glam::Vec3A) -> Self
    {
        Self {
            origin: o,
            direction: d,
            inv_direction: d.recip(),
        }
    }

    pub fn at(&self, t: f32) -> glam::Vec3A { self.direction.mul_add(glam::Vec3A::splat(t), self.origin) }

    /// Same ray expressed in another space, the parameter `t` is preserved
    pub fn transform(&self, matrix: &glam::Affine3A) -> Self
    {
        Self::new(matrix.transform_point3a(self.origin), matrix.transform_vector3a(self.direction))
    }
}
