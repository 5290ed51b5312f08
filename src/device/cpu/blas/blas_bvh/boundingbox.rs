use ambassador::delegatable_trait;
use glam::swizzles::Vec3Swizzles;

use crate::ray::Ray;
use crate::utility::{EPSILON, INFINITY};

#[delegatable_trait]
pub trait HasBox
{
    fn get_box(&self) -> &AABB;
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AABB
{
    minimum: glam::Vec3A,
    maximum: glam::Vec3A,
}

impl Default for AABB
{
    fn default() -> Self
    {
        Self {
            minimum: glam::Vec3A::ZERO,
            maximum: glam::Vec3A::ZERO,
        }
    }
}

impl HasBox for AABB
{
    fn get_box(&self) -> &AABB { self }
}

impl AABB
{
    pub fn new(minimum: glam::Vec3A, maximum: glam::Vec3A) -> Self
    {
        debug_assert!(minimum.cmple(maximum).all());

        Self { minimum, maximum }
    }

    /// Bounds of the box after an affine transform, every corner is transformed
    pub fn transform(&self, matrix: &glam::Affine3A) -> Self
    {
        (0..8).fold(Self::identity(), |bounds: AABB, corner: usize| {
            let point: glam::Vec3A = glam::Vec3A::select(
                glam::BVec3A::new(corner & 1 != 0, corner & 2 != 0, corner & 4 != 0),
                self.maximum,
                self.minimum,
            );
            let p: glam::Vec3A = matrix.transform_point3a(point);

            Self {
                minimum: bounds.minimum.min(p),
                maximum: bounds.maximum.max(p),
            }
        })
    }

    /// Empty box, the neutral element of [`surrounding_box`]
    pub fn identity() -> Self
    {
        Self {
            minimum: glam::Vec3A::splat(INFINITY),
            maximum: glam::Vec3A::splat(-INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool { self.minimum.cmpgt(self.maximum).any() }

    pub fn minimum(&self) -> glam::Vec3A { self.minimum }

    pub fn maximum(&self) -> glam::Vec3A { self.maximum }

    pub fn compare(&self, other: &AABB, axis: u8) -> std::cmp::Ordering { self.minimum[axis as usize].total_cmp(&other.minimum[axis as usize]) }

    pub fn length(&self) -> glam::Vec3A { self.maximum - self.minimum }

    pub fn longest_axis(&self) -> u8
    {
        let box_length: glam::Vec3A = self.length();
        let max_length: f32 = box_length.max_element();

        if box_length.x == max_length
        {
            0u8
        }
        else if box_length.y == max_length
        {
            1u8
        }
        else
        {
            2u8
        }
    }

    pub fn surface_area(&self) -> f32
    {
        let v: glam::Vec3A = self.maximum - self.minimum;

        2.0 * glam::Vec3A::dot(v, v.zxy())
    }

    pub fn intersect_t(&self, ray: &Ray, t_max: f32) -> Option<f32>
    {
        let t0: glam::Vec3A = (self.minimum - ray.origin) * ray.inv_direction;
        let t1: glam::Vec3A = (self.maximum - ray.origin) * ray.inv_direction;

        let t_min_v: glam::Vec3A = glam::Vec3A::splat(EPSILON);
        let t_max_v: glam::Vec3A = glam::Vec3A::splat(t_max);

        let t_smaller: glam::Vec3A = glam::Vec3A::max(glam::Vec3A::min(t0, t1), t_min_v);
        let t_bigger: glam::Vec3A = glam::Vec3A::min(glam::Vec3A::max(t0, t1), t_max_v);

        let t: f32 = t_smaller.max_element();
        (t <= t_bigger.min_element()).then_some(t)
    }
}

pub fn surrounding_box(a: &AABB, b: &AABB) -> AABB
{
    AABB {
        minimum: glam::Vec3A::min(a.minimum, b.minimum),
        maximum: glam::Vec3A::max(a.maximum, b.maximum),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn rotated_box_contains_every_corner()
    {
        let unit: AABB = AABB::new(glam::Vec3A::ZERO, glam::Vec3A::ONE);
        let rotation: glam::Affine3A = glam::Affine3A::from_rotation_y(std::f32::consts::FRAC_PI_4);

        let rotated: AABB = unit.transform(&rotation);
        let diagonal: f32 = std::f32::consts::SQRT_2;

        assert!((rotated.length().x - diagonal).abs() < 1e-5);
        assert!((rotated.length().y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn identity_is_neutral()
    {
        let b: AABB = AABB::new(glam::Vec3A::splat(-1.0), glam::Vec3A::splat(2.0));

        assert!(AABB::identity().is_empty());
        assert_eq!(surrounding_box(&AABB::identity(), &b), b);
    }

    #[test]
    fn ray_hits_box_in_front()
    {
        let b: AABB = AABB::new(glam::Vec3A::splat(-1.0), glam::Vec3A::splat(1.0));
        let ray: Ray = Ray::new(glam::Vec3A::new(0.0, 0.0, -5.0), glam::Vec3A::Z);

        let t: f32 = b.intersect_t(&ray, INFINITY).unwrap();
        assert!((t - 4.0).abs() < 1e-5);
        assert!(b.intersect_t(&ray, 3.0).is_none());
        assert!(b.intersect_t(&Ray::new(glam::Vec3A::new(0.0, 0.0, -5.0), -glam::Vec3A::Z), INFINITY).is_none());
    }
}
