/// Narkowicz's fit of the ACES filmic curve for a scalar value
fn aces_tonemap(x: f32) -> f32
{
    const A: f32 = 2.51;
    const B: f32 = 0.03;
    const C: f32 = 2.43;
    const D: f32 = 0.59;
    const E: f32 = 0.14;

    let x: f32 = x.max(0.0);
    ((x * (A * x + B)) / (x * (C * x + D) + E)).clamp(0.0, 1.0)
}

/// Applies the ACES curve to an RGB value on a per-channel basis
pub fn aces_tonemap_vector(input: glam::Vec3A) -> glam::Vec3A
{
    glam::Vec3A::new(aces_tonemap(input.x), aces_tonemap(input.y), aces_tonemap(input.z))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn output_is_displayable()
    {
        for x in [0.0f32, 0.18, 1.0, 16.0, 1e6]
        {
            let y: f32 = aces_tonemap(x);
            assert!((0.0..=1.0).contains(&y));
        }
        assert!(aces_tonemap(-1.0) == 0.0);
        assert!(aces_tonemap(0.5) > aces_tonemap(0.25));
    }
}
