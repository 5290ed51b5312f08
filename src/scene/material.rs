use bytemuck::{Pod, Zeroable};

/// Reflectance parameters of one instance, laid out for a storage buffer (80 bytes, std430 compatible)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Material
{
    pub base_color: glam::Vec3,
    pub roughness: f32,

    pub metallic: f32,
    pub ior: f32,
    pub specular_transmission: f32,
    pub specular_tint: f32,

    pub transmittance: glam::Vec3,
    pub at_distance: f32,

    pub emission: glam::Vec3,
    pub clearcoat: f32,

    pub clearcoat_gloss: f32,
    _pad: [f32; 3],
}

impl Default for Material
{
    fn default() -> Self
    {
        Self {
            base_color: glam::Vec3::new(0.6, 0.55, 0.55),
            roughness: 0.5,
            metallic: 0.0,
            //Plastic
            ior: 1.46,
            specular_transmission: 0.0,
            specular_tint: 0.0,
            transmittance: glam::Vec3::ONE,
            at_distance: 1.0,
            emission: glam::Vec3::ZERO,
            clearcoat: 0.0,
            clearcoat_gloss: 0.0,
            _pad: [0.0; 3],
        }
    }
}

impl Material
{
    pub fn diffuse(base_color: glam::Vec3) -> Self { Self { base_color, ..Default::default() } }

    pub fn metal(base_color: glam::Vec3, roughness: f32) -> Self
    {
        Self {
            base_color,
            roughness,
            metallic: 1.0,
            ..Default::default()
        }
    }

    pub fn emissive(emission: glam::Vec3) -> Self { Self { emission, ..Default::default() } }

    pub fn is_emissive(&self) -> bool { self.emission.max_element() > 0.0 }
}
