use crate::device::cpu::blas::blas_bvh::boundingbox::AABB;
use crate::ray::Ray;

/// Distance and barycentric coordinates of a ray/triangle intersection
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HitInfo
{
    pub local: glam::Vec2,
    pub t: f32,
}

#[derive(Copy, Clone, Debug)]
pub struct Triangle
{
    positions: glam::Mat3A,
    a: glam::Vec3A,
    b: glam::Vec3A,
}

impl Triangle
{
    pub fn new(v: [glam::Vec3A; 3]) -> Self
    {
        Self {
            positions: glam::Mat3A::from_cols(v[0], v[1], v[2]),
            a: v[1] - v[0],
            b: v[2] - v[0],
        }
    }

    /// Möller-Trumbore intersection, rejects hits closer than `t_min`
    pub fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<HitInfo>
    {
        let p_vec: glam::Vec3A = glam::Vec3A::cross(ray.direction, self.b);
        let determinant: f32 = glam::Vec3A::dot(self.a, p_vec);

        if determinant.abs() < f32::EPSILON
        {
            return None;
        }

        let inv_determinant: f32 = 1.0 / determinant;

        let t_vec: glam::Vec3A = ray.origin - self.positions.col(0);
        let u: f32 = glam::Vec3A::dot(t_vec, p_vec) * inv_determinant;

        if !(0.0..=1.0).contains(&u)
        {
            return None;
        }

        let q_vec: glam::Vec3A = glam::Vec3A::cross(t_vec, self.a);
        let v: f32 = glam::Vec3A::dot(ray.direction, q_vec) * inv_determinant;

        if v < 0.0 || u + v > 1.0
        {
            return None;
        }

        let t: f32 = glam::Vec3A::dot(self.b, q_vec) * inv_determinant;
        if t < t_min || t > t_max
        {
            return None;
        }

        Some(HitInfo {
            local: glam::Vec2::new(u, v),
            t,
        })
    }

    pub fn create_bounding_box(&self) -> AABB
    {
        let minimum: glam::Vec3A = self.positions.col(0).min(self.positions.col(1)).min(self.positions.col(2));
        let maximum: glam::Vec3A = self.positions.col(0).max(self.positions.col(1)).max(self.positions.col(2));

        AABB::new(minimum, maximum)
    }

    pub fn get_position(&self, u: f32, v: f32) -> glam::Vec3A
    {
        let w: f32 = 1.0 - u - v;
        self.positions * glam::Vec3A::new(w, u, v)
    }

    pub fn area(&self) -> f32 { 0.5 * glam::Vec3A::length(glam::Vec3A::cross(self.a, self.b)) }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn unit_triangle() -> Triangle { Triangle::new([glam::Vec3A::ZERO, glam::Vec3A::X, glam::Vec3A::Y]) }

    #[test]
    fn hit_reports_distance_and_barycentrics()
    {
        let ray: Ray = Ray::new(glam::Vec3A::new(0.25, 0.25, 1.0), -glam::Vec3A::Z);
        let hit: HitInfo = unit_triangle().intersect(&ray, 0.0, f32::INFINITY).unwrap();

        assert!((hit.t - 1.0).abs() < 1e-6);
        assert!((unit_triangle().get_position(hit.local.x, hit.local.y) - glam::Vec3A::new(0.25, 0.25, 0.0)).length() < 1e-6);
    }

    #[test]
    fn misses_outside_and_behind()
    {
        let outside: Ray = Ray::new(glam::Vec3A::new(0.75, 0.75, 1.0), -glam::Vec3A::Z);
        let behind: Ray = Ray::new(glam::Vec3A::new(0.25, 0.25, 1.0), glam::Vec3A::Z);

        assert!(unit_triangle().intersect(&outside, 0.0, f32::INFINITY).is_none());
        assert!(unit_triangle().intersect(&behind, 0.0, f32::INFINITY).is_none());
    }

    #[test]
    fn area_and_bounds()
    {
        assert!((unit_triangle().area() - 0.5).abs() < 1e-6);
        assert_eq!(unit_triangle().create_bounding_box().maximum(), glam::Vec3A::new(1.0, 1.0, 0.0));
    }
}
